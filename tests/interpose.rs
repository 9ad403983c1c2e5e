//! End-to-end agent tests against a fake VM: attach through the exported
//! entry point, capture the installed overlay and the bind callback, then
//! drive JNI calls and native-method binds the way a real VM would.

#![cfg(all(unix, target_arch = "x86_64"))]
#![allow(non_snake_case)]

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use jni_sys::{
    jclass, jint, jmethodID, jobject, jvalue, va_list, JNIEnv, JNIInvokeInterface_,
    JNINativeInterface_, JavaVM, JNI_OK,
};
use jniscope::sys::jvmti::*;
use jniscope::{set_ref_mask, Agent_OnAttach, Config};

const MASK: usize = 0x5A5A_0000_0F0F_F0F0;

const MID_INT: usize = 0x7654; // (I)I
const MID_OBJ: usize = 0x7655; // (Ljava/lang/Object;)Ljava/lang/Object;
const MID_BIND: usize = 0x7777; // (I)I, used for the bind event
const FAKE_CLASS: usize = 0x1c1a55;

static HOST_SAW_OBJ: AtomicUsize = AtomicUsize::new(0);
static HOST_SAW_INT: AtomicI64 = AtomicI64::new(0);
static HOST_SAW_MID: AtomicUsize = AtomicUsize::new(0);
static HOST_OBJ_ARG: AtomicUsize = AtomicUsize::new(0);
static OBJ_RESULT: AtomicUsize = AtomicUsize::new(0xBEEF_0000);

static CAPTURED_BIND: AtomicUsize = AtomicUsize::new(0);
static ENABLED_EVENT: AtomicI64 = AtomicI64::new(0);
static INSTALLED_TABLE: AtomicUsize = AtomicUsize::new(0);
static TI_ENV_PTR: AtomicUsize = AtomicUsize::new(0);
static HOST_TABLE_PTR: AtomicUsize = AtomicUsize::new(0);

// ---- fake host JNI table ----------------------------------------------

unsafe extern "system" fn host_get_version(_env: *mut JNIEnv) -> jint {
    0x0001_0008
}

unsafe extern "system" fn host_delete_local_ref(_env: *mut JNIEnv, _obj: jobject) {}

unsafe extern "system" fn host_call_int_method_a(
    _env: *mut JNIEnv,
    obj: jobject,
    method: jmethodID,
    args: *const jvalue,
) -> jint {
    HOST_SAW_OBJ.store(obj as usize, Ordering::SeqCst);
    HOST_SAW_MID.store(method as usize, Ordering::SeqCst);
    HOST_SAW_INT.store((*args).i as i64, Ordering::SeqCst);
    55
}

unsafe extern "system" fn host_call_object_method_a(
    _env: *mut JNIEnv,
    obj: jobject,
    method: jmethodID,
    args: *const jvalue,
) -> jobject {
    HOST_SAW_OBJ.store(obj as usize, Ordering::SeqCst);
    HOST_SAW_MID.store(method as usize, Ordering::SeqCst);
    HOST_OBJ_ARG.store((*args).l as usize, Ordering::SeqCst);
    OBJ_RESULT.load(Ordering::SeqCst) as jobject
}

// ---- fake JVMTI --------------------------------------------------------

unsafe extern "system" fn ti_add_capabilities(
    _env: *mut jvmtiEnv,
    _caps: *const jvmtiCapabilities,
) -> jvmtiError {
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_set_event_callbacks(
    _env: *mut jvmtiEnv,
    callbacks: *const jvmtiEventCallbacks,
    _size: jint,
) -> jvmtiError {
    let bind = (*callbacks)
        .NativeMethodBind
        .map(|f| f as usize)
        .unwrap_or(0);
    CAPTURED_BIND.store(bind, Ordering::SeqCst);
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_set_event_notification_mode(
    _env: *mut jvmtiEnv,
    _mode: jint,
    event: jint,
    _thread: jthread,
) -> jvmtiError {
    ENABLED_EVENT.store(event as i64, Ordering::SeqCst);
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_get_jni_function_table(
    _env: *mut jvmtiEnv,
    out: *mut *mut JNINativeInterface_,
) -> jvmtiError {
    *out = HOST_TABLE_PTR.load(Ordering::SeqCst) as *mut JNINativeInterface_;
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_set_jni_function_table(
    _env: *mut jvmtiEnv,
    table: *const JNINativeInterface_,
) -> jvmtiError {
    INSTALLED_TABLE.store(table as usize, Ordering::SeqCst);
    JVMTI_ERROR_NONE
}

fn descriptor_for(method: usize) -> &'static str {
    match method {
        MID_OBJ => "(Ljava/lang/Object;)Ljava/lang/Object;",
        _ => "(I)I",
    }
}

unsafe extern "system" fn ti_get_method_name(
    _env: *mut jvmtiEnv,
    method: jmethodID,
    name_ptr: *mut *mut c_char,
    signature_ptr: *mut *mut c_char,
    _generic: *mut *mut c_char,
) -> jvmtiError {
    *name_ptr = CString::new("f").unwrap().into_raw();
    *signature_ptr = CString::new(descriptor_for(method as usize))
        .unwrap()
        .into_raw();
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_get_method_declaring_class(
    _env: *mut jvmtiEnv,
    _method: jmethodID,
    out: *mut jclass,
) -> jvmtiError {
    *out = FAKE_CLASS as jclass;
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_get_class_signature(
    _env: *mut jvmtiEnv,
    _class: jclass,
    signature_ptr: *mut *mut c_char,
    _generic: *mut *mut c_char,
) -> jvmtiError {
    *signature_ptr = CString::new("LFake;").unwrap().into_raw();
    JVMTI_ERROR_NONE
}

unsafe extern "system" fn ti_deallocate(_env: *mut jvmtiEnv, mem: *mut u8) -> jvmtiError {
    if !mem.is_null() {
        drop(CString::from_raw(mem as *mut c_char));
    }
    JVMTI_ERROR_NONE
}

// ---- fake invocation interface ----------------------------------------

unsafe extern "system" fn vm_get_env(
    _vm: *mut JavaVM,
    penv: *mut *mut c_void,
    _version: jint,
) -> jint {
    *penv = TI_ENV_PTR.load(Ordering::SeqCst) as *mut c_void;
    JNI_OK
}

// ---- fixture -----------------------------------------------------------

struct Fixture {
    env: usize,
    overlay: usize,
}

static FIXTURE: OnceLock<Fixture> = OnceLock::new();
static MASK_LOCK: Mutex<()> = Mutex::new(());

fn fixture() -> &'static Fixture {
    FIXTURE.get_or_init(|| unsafe {
        jniscope::agent::set_config(Config {
            instrument_all: true,
            ..Config::default()
        });

        // Host table: every slot non-null so the copy step is total, with
        // real stubs where the tests actually land.
        let mut host: JNINativeInterface_ = std::mem::zeroed();
        let slots =
            std::mem::size_of::<JNINativeInterface_>() / std::mem::size_of::<*mut c_void>();
        let base = &mut host as *mut JNINativeInterface_ as *mut *mut c_void;
        for slot in 0..slots {
            *base.add(slot) = (0xdead_0000 + slot * 8) as *mut c_void;
        }
        host.GetVersion = Some(host_get_version);
        host.DeleteLocalRef = Some(host_delete_local_ref);
        host.CallIntMethodA = Some(host_call_int_method_a);
        host.CallObjectMethodA = Some(host_call_object_method_a);
        let host: &'static mut JNINativeInterface_ = Box::leak(Box::new(host));
        HOST_TABLE_PTR.store(host as *mut JNINativeInterface_ as usize, Ordering::SeqCst);

        let mut ti: jvmtiInterface_1_ = std::mem::zeroed();
        ti.AddCapabilities = Some(ti_add_capabilities);
        ti.SetEventCallbacks = Some(ti_set_event_callbacks);
        ti.SetEventNotificationMode = Some(std::mem::transmute::<
            unsafe extern "system" fn(*mut jvmtiEnv, jint, jint, jthread) -> jvmtiError,
            SetEventNotificationModeFn,
        >(ti_set_event_notification_mode));
        ti.GetJNIFunctionTable = Some(ti_get_jni_function_table);
        ti.SetJNIFunctionTable = Some(ti_set_jni_function_table);
        ti.GetMethodName = Some(ti_get_method_name);
        ti.GetMethodDeclaringClass = Some(ti_get_method_declaring_class);
        ti.GetClassSignature = Some(ti_get_class_signature);
        ti.Deallocate = Some(ti_deallocate);
        let ti: &'static mut jvmtiInterface_1_ = Box::leak(Box::new(ti));
        let ti_env: &'static mut jvmtiEnv = Box::leak(Box::new(ti as *const jvmtiInterface_1_));
        TI_ENV_PTR.store(ti_env as *mut jvmtiEnv as usize, Ordering::SeqCst);

        let mut invoke: JNIInvokeInterface_ = std::mem::zeroed();
        invoke.GetEnv = Some(vm_get_env);
        let invoke: &'static mut JNIInvokeInterface_ = Box::leak(Box::new(invoke));
        let vm: &'static mut JavaVM = Box::leak(Box::new(invoke as *const JNIInvokeInterface_));

        let rc = Agent_OnAttach(vm, ptr::null_mut(), ptr::null_mut());
        assert_eq!(rc, JNI_OK, "attach must succeed against the fake VM");

        let overlay = INSTALLED_TABLE.load(Ordering::SeqCst);
        assert_ne!(overlay, 0, "overlay was not installed");

        // A JNIEnv pointing at the installed overlay, as the VM would hand
        // to native code.
        let env: &'static mut JNIEnv =
            Box::leak(Box::new(overlay as *const JNINativeInterface_));
        Fixture {
            env: env as *mut JNIEnv as usize,
            overlay,
        }
    })
}

fn overlay() -> &'static JNINativeInterface_ {
    unsafe { &*(fixture().overlay as *const JNINativeInterface_) }
}

fn env() -> *mut JNIEnv {
    fixture().env as *mut JNIEnv
}

// ---- tests -------------------------------------------------------------

#[test]
fn attach_wires_events_and_tables() {
    fixture();
    assert_eq!(ENABLED_EVENT.load(Ordering::SeqCst), 67);
    assert_ne!(CAPTURED_BIND.load(Ordering::SeqCst), 0);
}

#[test]
fn overlay_is_complete() {
    let overlay = overlay();
    let slots = std::mem::size_of::<JNINativeInterface_>() / std::mem::size_of::<*mut c_void>();
    let base = overlay as *const JNINativeInterface_ as *const *mut c_void;
    for slot in 0..slots {
        assert!(!unsafe { *base.add(slot) }.is_null(), "slot {slot} is null");
    }
}

#[test]
fn untranslated_primitives_behave_identically() {
    let get_version = overlay().GetVersion.unwrap();
    assert_eq!(unsafe { get_version(env()) }, 0x0001_0008);
}

#[test]
fn packed_call_unwraps_arguments_and_wraps_results() {
    let _guard = MASK_LOCK.lock().unwrap();
    fixture();
    set_ref_mask(MASK);

    let raw_recv = 0x9000usize;
    let raw_arg = 0xA000usize;
    let args = [jvalue {
        l: (raw_arg ^ MASK) as jobject,
    }];
    let call = overlay().CallObjectMethodA.unwrap();
    let result = unsafe {
        call(
            env(),
            (raw_recv ^ MASK) as jobject,
            MID_OBJ as jmethodID,
            args.as_ptr(),
        )
    };
    set_ref_mask(0);

    assert_eq!(HOST_SAW_OBJ.load(Ordering::SeqCst), raw_recv);
    assert_eq!(HOST_OBJ_ARG.load(Ordering::SeqCst), raw_arg);
    assert_eq!(HOST_SAW_MID.load(Ordering::SeqCst), MID_OBJ);
    assert_eq!(
        result as usize,
        OBJ_RESULT.load(Ordering::SeqCst) ^ MASK,
        "reference result must come back wrapped"
    );
}

#[test]
fn variadic_call_packs_arguments_for_the_host() {
    let _guard = MASK_LOCK.lock().unwrap();
    fixture();
    set_ref_mask(MASK);

    let raw_recv = 0x9100usize;
    let call = overlay().CallIntMethod.unwrap();
    let result = unsafe {
        call(
            env(),
            (raw_recv ^ MASK) as jobject,
            MID_INT as jmethodID,
            42 as jint,
        )
    };
    set_ref_mask(0);

    assert_eq!(result, 55);
    assert_eq!(HOST_SAW_OBJ.load(Ordering::SeqCst), raw_recv);
    assert_eq!(HOST_SAW_INT.load(Ordering::SeqCst), 42);
    assert_eq!(HOST_SAW_MID.load(Ordering::SeqCst), MID_INT);
}

#[test]
fn va_list_call_is_walked_and_forwarded_packed() {
    let _guard = MASK_LOCK.lock().unwrap();
    fixture();

    // A System V __va_list_tag with the single int argument already in
    // the overflow area, as a caller that exhausted its registers would
    // produce it.
    #[repr(C)]
    struct VaTag {
        gp_offset: u32,
        fp_offset: u32,
        overflow_arg_area: *mut u8,
        reg_save_area: *mut u8,
    }
    let overflow = [77u64];
    let mut tag = VaTag {
        gp_offset: 48,
        fp_offset: 176,
        overflow_arg_area: overflow.as_ptr() as *mut u8,
        reg_save_area: ptr::null_mut(),
    };

    let call = overlay().CallIntMethodV.unwrap();
    let result = unsafe {
        call(
            env(),
            0x9200usize as jobject,
            MID_INT as jmethodID,
            &mut tag as *mut VaTag as va_list,
        )
    };
    assert_eq!(result, 55);
    assert_eq!(HOST_SAW_INT.load(Ordering::SeqCst), 77);
}

#[test]
fn bind_event_installs_a_working_trampoline() {
    fixture();
    let bind: jvmtiEventNativeMethodBind =
        unsafe { std::mem::transmute(CAPTURED_BIND.load(Ordering::SeqCst)) };

    unsafe extern "C" fn native_add_one(_env: *mut c_void, _this: *mut c_void, x: i32) -> i32 {
        x + 1
    }

    let mut replacement: *mut c_void = ptr::null_mut();
    unsafe {
        bind(
            ptr::null_mut(),
            env(),
            ptr::null_mut(),
            MID_BIND as jmethodID,
            native_add_one as *mut c_void,
            &mut replacement,
        );
    }
    assert!(
        !replacement.is_null(),
        "instrument_all bind must produce a trampoline"
    );

    let trampoline: unsafe extern "C" fn(*mut c_void, *mut c_void, i32) -> i32 =
        unsafe { std::mem::transmute(replacement) };
    assert_eq!(unsafe { trampoline(env() as *mut c_void, ptr::null_mut(), 76) }, 77);
}
