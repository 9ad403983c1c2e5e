//! End-to-end synthesizer tests: emit real templates, install copies,
//! and drive them as C functions.

#![cfg(all(unix, any(target_arch = "x86_64", target_arch = "aarch64")))]

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use assert_matches::assert_matches;
use jniscope::trampoline::index;
use jniscope::trampoline::{make_trampoline, template_count};
use jniscope::{set_ref_mask, Error};

type IntBinary = unsafe extern "C" fn(*mut c_void, *mut c_void, i32) -> i32;
type ObjUnary = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> *mut c_void;

const ENV: *mut c_void = 0x10 as *mut c_void;
const THIS: *mut c_void = 0x20 as *mut c_void;

// The template cache and codec mask are process-global; run these tests
// one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

unsafe extern "C" fn native_succ(_env: *mut c_void, _this: *mut c_void, x: i32) -> i32 {
    x + 1
}

unsafe extern "C" fn native_double(_env: *mut c_void, _this: *mut c_void, x: i32) -> i32 {
    x * 2
}

static ECHO_SAW: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn native_echo(
    _env: *mut c_void,
    _this: *mut c_void,
    arg: *mut c_void,
) -> *mut c_void {
    ECHO_SAW.store(arg as usize, Ordering::SeqCst);
    arg
}

#[test]
fn two_methods_share_one_template_and_demux_by_return_pc() {
    let _guard = SERIAL.lock().unwrap();
    let before = template_count();
    let succ = make_trampoline("succ", "(I)I", None, native_succ as usize).unwrap();
    let double = make_trampoline("double", "(I)I", None, native_double as usize).unwrap();

    // One signature shape, one template, two disjoint copies.
    assert_eq!(template_count(), before + 1);
    assert_ne!(succ, double);

    let as_succ: IntBinary = unsafe { std::mem::transmute(succ) };
    let as_double: IntBinary = unsafe { std::mem::transmute(double) };
    unsafe {
        assert_eq!(as_succ(ENV, THIS, 7), 8);
        assert_eq!(as_double(ENV, THIS, 7), 14);
        // Interleaved calls keep resolving to their own originals.
        assert_eq!(as_succ(ENV, THIS, 100), 101);
        assert_eq!(as_double(ENV, THIS, 100), 200);
    }
}

#[test]
fn installed_intervals_are_disjoint_and_resolve_to_their_binding() {
    let _guard = SERIAL.lock().unwrap();
    let first = make_trampoline("a", "(J)J", None, 0x1000).unwrap();
    let second = make_trampoline("b", "(J)J", None, 0x2000).unwrap();

    let mut intervals = index::interval_snapshot();
    intervals.sort_unstable();
    for pair in intervals.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlapping intervals {pair:?}");
    }

    let hit = index::resolve_pc(first + 1).expect("interior PC resolves");
    assert_eq!(hit.original_entry, 0x1000);
    let hit = index::resolve_pc(second + 1).expect("interior PC resolves");
    assert_eq!(hit.original_entry, 0x2000);

    let stack_local = 0u8;
    assert!(index::resolve_pc(&stack_local as *const u8 as usize).is_none());
}

#[test]
fn reference_arguments_are_wrapped_and_results_unwrapped() {
    let _guard = SERIAL.lock().unwrap();
    let mask = 0xA5A5_A5A5_A5A5_A5A5u64 as usize;
    let entry = make_trampoline(
        "echo",
        "(Ljava/lang/String;)Ljava/lang/String;",
        Some("LEcho;".into()),
        native_echo as usize,
    )
    .unwrap();
    let echo: ObjUnary = unsafe { std::mem::transmute(entry) };

    let p = 0x7f00_5000 as *mut c_void;
    set_ref_mask(mask);
    let out = unsafe { echo(ENV, THIS, p) };
    set_ref_mask(0);

    // The original saw the wrapped token and returned it; the trampoline
    // unwrapped it back on the way out.
    assert_eq!(ECHO_SAW.load(Ordering::SeqCst), p as usize ^ mask);
    assert_eq!(out, p);
}

#[test]
fn unparseable_descriptors_leave_no_trampoline() {
    let _guard = SERIAL.lock().unwrap();
    assert_matches!(
        make_trampoline("bad", "(X)V", None, 0x1234),
        Err(Error::BadDescriptor { .. })
    );
    assert_matches!(
        make_trampoline("bad", "no-parens", None, 0x1234),
        Err(Error::BadDescriptor { .. })
    );
}

#[test]
fn void_and_float_shapes_compile_and_run() {
    let _guard = SERIAL.lock().unwrap();
    unsafe extern "C" fn native_fma(
        _env: *mut c_void,
        _this: *mut c_void,
        x: f32,
        y: f64,
    ) -> f64 {
        x as f64 * y
    }
    let entry = make_trampoline("fma", "(FD)D", None, native_fma as usize).unwrap();
    let fma: unsafe extern "C" fn(*mut c_void, *mut c_void, f32, f64) -> f64 =
        unsafe { std::mem::transmute(entry) };
    unsafe {
        assert_eq!(fma(ENV, THIS, 3.0, 0.5), 1.5);
    }

    static RAN: AtomicUsize = AtomicUsize::new(0);
    unsafe extern "C" fn native_void(_env: *mut c_void, _this: *mut c_void) {
        RAN.fetch_add(1, Ordering::SeqCst);
    }
    let entry = make_trampoline("run", "()V", None, native_void as usize).unwrap();
    let run: unsafe extern "C" fn(*mut c_void, *mut c_void) = unsafe { std::mem::transmute(entry) };
    unsafe {
        run(ENV, THIS);
    }
    assert_eq!(RAN.load(Ordering::SeqCst), 1);
}
