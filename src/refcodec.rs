//! The reference codec: the single policy hook through which every
//! reference token crosses the Java/native boundary.
//!
//! Trampolines wrap references on the way into user native code; the JNI
//! table overlay unwraps them on the way back into the VM. The default
//! transformation is an XOR with a process-wide mask (zero unless a policy
//! turns it on), which keeps both directions the same total, null-preserving
//! function. Both entry points are `extern "C"` so emitted code can call
//! them through absolute addresses, and neither allocates or takes locks.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

static REF_MASK: AtomicUsize = AtomicUsize::new(0);

/// Install a new codec mask. Zero restores the identity codec.
///
/// The mask applies to every reference wrapped from this point on, so this
/// is only safe to change while no wrapped references are live — in
/// practice at attach time, or from tests.
pub fn set_ref_mask(mask: usize) {
    REF_MASK.store(mask, Ordering::Relaxed);
}

pub fn ref_mask() -> usize {
    REF_MASK.load(Ordering::Relaxed)
}

/// Encode a reference for user native code. Null stays null.
#[no_mangle]
pub extern "C" fn wrap_ref(p: *mut c_void) -> *mut c_void {
    if p.is_null() {
        return p;
    }
    (p as usize ^ REF_MASK.load(Ordering::Relaxed)) as *mut c_void
}

/// Decode a reference coming back from user native code. Null stays null.
#[no_mangle]
pub extern "C" fn unwrap_ref(p: *mut c_void) -> *mut c_void {
    if p.is_null() {
        return p;
    }
    (p as usize ^ REF_MASK.load(Ordering::Relaxed)) as *mut c_void
}

/// Called by every trampoline before the original native entry runs.
/// Interposition point only; intentionally empty.
#[no_mangle]
pub extern "C" fn enter_user_native_code(_env: *mut c_void) {}

/// Called by every trampoline after the original native entry returns.
/// Interposition point only; intentionally empty.
#[no_mangle]
pub extern "C" fn leave_user_native_code(_env: *mut c_void) {}
