//! Agent lifecycle: the exported attach entry points, the
//! native-method-bind handler, and the process-wide configuration.

use std::ffi::c_void;
use std::os::raw::c_char;

use jni_sys::{jmethodID, JavaVM, JNIEnv, JNI_ERR, JNI_OK};
use once_cell::sync::OnceCell;

use crate::errors::*;
use crate::sys::jvmti::*;
use crate::tienv::TiEnv;
use crate::{interpose, modules, trampoline};

/// Agent policy knobs. Set with [`set_config`] before attach; afterwards
/// the defaults are locked in. The attach options string is ignored.
#[derive(Debug, Clone)]
pub struct Config {
    /// Module path prefixes treated as system code.
    pub system_path_prefixes: Vec<String>,
    /// File-name fragments that mark a module as system wherever it lives.
    pub system_name_fragments: Vec<String>,
    /// Trampoline every binding, ignoring the system classification.
    pub instrument_all: bool,
    /// Also synthesize trampolines for natives registered through
    /// `RegisterNatives`.
    pub intercept_register_natives: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            system_path_prefixes: vec![
                "/usr/lib".into(),
                "/lib".into(),
                "/system/".into(),
                "/apex/".into(),
            ],
            system_name_fragments: vec![
                "libjvm".into(),
                "libjava".into(),
                "libart".into(),
                "libc.".into(),
                "ld-linux".into(),
            ],
            instrument_all: false,
            intercept_register_natives: false,
        }
    }
}

static CONFIG: OnceCell<Config> = OnceCell::new();
static TI: OnceCell<TiEnv> = OnceCell::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

/// Install a non-default configuration. Returns false if the
/// configuration was already read or set.
pub fn set_config(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

pub(crate) fn ti() -> Option<TiEnv> {
    TI.get().copied()
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "system" fn Agent_OnLoad(
    vm: *mut JavaVM,
    options: *mut c_char,
    reserved: *mut c_void,
) -> jni_sys::jint {
    Agent_OnAttach(vm, options, reserved)
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "system" fn Agent_OnAttach(
    vm: *mut JavaVM,
    _options: *mut c_char,
    _reserved: *mut c_void,
) -> jni_sys::jint {
    let _ = env_logger::try_init();
    match attach(vm) {
        Ok(()) => {
            log::info!("agent attached");
            JNI_OK
        }
        Err(err) => {
            log::error!("attach failed: {err}");
            JNI_ERR
        }
    }
}

unsafe fn attach(vm: *mut JavaVM) -> Result<()> {
    if TI.get().is_some() {
        return Ok(());
    }
    let ti = jvmti_env(vm)?;
    let _ = TI.set(ti);

    let mut capabilities = jvmtiCapabilities::default();
    capabilities.set_can_generate_native_method_bind_events();
    ti.add_capabilities(&capabilities)?;

    let mut callbacks = jvmtiEventCallbacks::empty();
    callbacks.NativeMethodBind = Some(on_native_method_bind);
    ti.set_event_callbacks(&callbacks)?;

    interpose::install(&ti)?;

    if let Err(err) = ti.enable_event(JVMTI_EVENT_NATIVE_METHOD_BIND) {
        // Back out the table so a failed attach leaves nothing installed.
        if let Err(restore) = interpose::restore_host(&ti) {
            log::error!("could not restore host JNI table: {restore}");
        }
        return Err(err);
    }
    Ok(())
}

unsafe fn jvmti_env(vm: *mut JavaVM) -> Result<TiEnv> {
    if vm.is_null() || (*vm).is_null() {
        return Err(Error::NoJvmti {
            version: JVMTI_VERSION_1_2,
            code: JNI_ERR,
        });
    }
    let get_env = (**vm).GetEnv.ok_or(Error::NoJvmti {
        version: JVMTI_VERSION_1_2,
        code: JNI_ERR,
    })?;
    let mut env: *mut c_void = std::ptr::null_mut();
    let code = get_env(vm, &mut env, JVMTI_VERSION_1_2);
    if code != JNI_OK {
        return Err(Error::NoJvmti {
            version: JVMTI_VERSION_1_2,
            code,
        });
    }
    TiEnv::from_raw(env as *mut jvmtiEnv).ok_or(Error::NoJvmti {
        version: JVMTI_VERSION_1_2,
        code: JNI_ERR,
    })
}

/// `NativeMethodBind` handler: decide whether this binding gets a
/// trampoline, and if synthesis succeeds, point the VM at it.
unsafe extern "system" fn on_native_method_bind(
    _ti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    _thread: jthread,
    method: jmethodID,
    address: *mut c_void,
    new_address_ptr: *mut *mut c_void,
) {
    if method.is_null() || address.is_null() || new_address_ptr.is_null() {
        return;
    }
    let Some(ti) = ti() else { return };

    let entry = address as usize;
    if !config().instrument_all && modules::is_system_address(entry) {
        return;
    }

    let (name, descriptor) = match ti.method_name(method) {
        Ok(parts) => parts,
        Err(err) => {
            log::debug!("bind event without method metadata: {err}");
            return;
        }
    };
    let class_descriptor = class_descriptor_of(&ti, jni_env, method);

    match trampoline::make_trampoline(&name, &descriptor, class_descriptor, entry) {
        Ok(trampoline_entry) => {
            *new_address_ptr = trampoline_entry as *mut c_void;
        }
        Err(err) => trampoline::report_failure(&name, &descriptor, &err),
    }
}

unsafe fn class_descriptor_of(
    ti: &TiEnv,
    jni_env: *mut JNIEnv,
    method: jmethodID,
) -> Option<String> {
    let class = ti.method_declaring_class(method).ok()?;
    let descriptor = ti.class_signature(class).ok();
    if !class.is_null() && !jni_env.is_null() {
        // Release through the host table when it is already stashed; the
        // overlay would put the reference through the codec.
        let delete = interpose::try_host()
            .and_then(|host| host.DeleteLocalRef)
            .or_else(|| (**jni_env).DeleteLocalRef);
        if let Some(delete) = delete {
            delete(jni_env, class);
        }
    }
    descriptor
}
