//! Thin checked wrapper around a raw `jvmtiEnv`.
//!
//! Every table access goes through [`jvmti_method!`] so a null slot turns
//! into an error instead of a jump through null. Strings returned by the
//! VM are modified UTF-8 and are deallocated with the VM's own
//! deallocator before the call returns.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

use jni_sys::{jclass, jint, jmethodID, JNINativeInterface_};

use crate::errors::*;
use crate::sys::jvmti::*;

const JVMTI_ERROR_NULL_POINTER: jvmtiError = 100;

macro_rules! jvmti_method {
    ( $env:expr, $name:ident ) => {{
        match (**$env.raw).$name {
            Some(method) => method,
            None => {
                return Err(Error::jvmti(stringify!($name), JVMTI_ERROR_NULL_POINTER));
            }
        }
    }};
}

macro_rules! jvmti_check {
    ( $name:ident, $call:expr ) => {{
        let code = $call;
        if code != JVMTI_ERROR_NONE {
            return Err(Error::jvmti(stringify!($name), code));
        }
    }};
}

/// A process-wide JVMTI environment handle.
#[derive(Copy, Clone, Debug)]
pub struct TiEnv {
    raw: *mut jvmtiEnv,
}

// The handle is valid for the VM's lifetime and the functions the agent
// uses are documented as callable from any thread.
unsafe impl Send for TiEnv {}
unsafe impl Sync for TiEnv {}

impl TiEnv {
    /// # Safety
    ///
    /// `raw` must be a live `jvmtiEnv*` obtained from `GetEnv`.
    pub unsafe fn from_raw(raw: *mut jvmtiEnv) -> Option<TiEnv> {
        if raw.is_null() || (*raw).is_null() {
            None
        } else {
            Some(TiEnv { raw })
        }
    }

    /// Short name and descriptor of a method.
    pub fn method_name(&self, method: jmethodID) -> Result<(String, String)> {
        unsafe {
            let get = jvmti_method!(self, GetMethodName);
            let mut name: *mut c_char = ptr::null_mut();
            let mut descriptor: *mut c_char = ptr::null_mut();
            jvmti_check!(
                GetMethodName,
                get(self.raw, method, &mut name, &mut descriptor, ptr::null_mut())
            );
            let result = (self.take_string(name), self.take_string(descriptor));
            Ok(result)
        }
    }

    pub fn method_declaring_class(&self, method: jmethodID) -> Result<jclass> {
        unsafe {
            let get = jvmti_method!(self, GetMethodDeclaringClass);
            let mut class: jclass = ptr::null_mut();
            jvmti_check!(GetMethodDeclaringClass, get(self.raw, method, &mut class));
            Ok(class)
        }
    }

    pub fn class_signature(&self, class: jclass) -> Result<String> {
        unsafe {
            let get = jvmti_method!(self, GetClassSignature);
            let mut signature: *mut c_char = ptr::null_mut();
            jvmti_check!(
                GetClassSignature,
                get(self.raw, class, &mut signature, ptr::null_mut())
            );
            Ok(self.take_string(signature))
        }
    }

    pub fn add_capabilities(&self, capabilities: &jvmtiCapabilities) -> Result<()> {
        unsafe {
            let add = jvmti_method!(self, AddCapabilities);
            jvmti_check!(AddCapabilities, add(self.raw, capabilities));
            Ok(())
        }
    }

    pub fn set_event_callbacks(&self, callbacks: &jvmtiEventCallbacks) -> Result<()> {
        unsafe {
            let set = jvmti_method!(self, SetEventCallbacks);
            jvmti_check!(
                SetEventCallbacks,
                set(
                    self.raw,
                    callbacks,
                    std::mem::size_of::<jvmtiEventCallbacks>() as jint,
                )
            );
            Ok(())
        }
    }

    pub fn enable_event(&self, event: jint) -> Result<()> {
        unsafe {
            let set = jvmti_method!(self, SetEventNotificationMode);
            jvmti_check!(
                SetEventNotificationMode,
                set(self.raw, JVMTI_ENABLE, event, ptr::null_mut())
            );
            Ok(())
        }
    }

    pub fn jni_function_table(&self) -> Result<*mut JNINativeInterface_> {
        unsafe {
            let get = jvmti_method!(self, GetJNIFunctionTable);
            let mut table: *mut JNINativeInterface_ = ptr::null_mut();
            jvmti_check!(GetJNIFunctionTable, get(self.raw, &mut table));
            Ok(table)
        }
    }

    pub fn set_jni_function_table(&self, table: *const JNINativeInterface_) -> Result<()> {
        unsafe {
            let set = jvmti_method!(self, SetJNIFunctionTable);
            let code = set(self.raw, table);
            if code != JVMTI_ERROR_NONE {
                return Err(Error::TableReplace { code });
            }
            Ok(())
        }
    }

    /// Copy out a VM-allocated modified-UTF-8 string and free it.
    unsafe fn take_string(&self, ptr: *mut c_char) -> String {
        if ptr.is_null() {
            return String::new();
        }
        let bytes = CStr::from_ptr(ptr).to_bytes();
        let decoded = match cesu8::from_java_cesu8(bytes) {
            Ok(text) => text.into_owned(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        };
        if let Some(deallocate) = (**self.raw).Deallocate {
            let code = deallocate(self.raw, ptr as *mut u8);
            if code != JVMTI_ERROR_NONE {
                log::warn!("Deallocate failed with error {code}");
            }
        }
        decoded
    }
}
