//! The JNI function-table overlay.
//!
//! At attach time the agent stashes the VM's own table, builds a parallel
//! table that starts as a copy of every host slot and then overrides the
//! intercepted entries, and installs it process-wide. Wrappers always
//! forward to the stashed original table, never back through `env`, so a
//! wrapper can never re-enter itself.

pub mod args;
mod arrays;
mod calls;
mod fields;
pub mod method_cache;
mod singles;
#[cfg(target_arch = "x86_64")]
mod varargs;

use jni_sys::{jmethodID, jobject, JNINativeInterface_};
use once_cell::sync::OnceCell;
use paste::paste;

use crate::errors::*;
use crate::tienv::TiEnv;

struct JniTable(JNINativeInterface_);

// Function-pointer tables; immutable once published.
unsafe impl Send for JniTable {}
unsafe impl Sync for JniTable {}

static HOST: OnceCell<JniTable> = OnceCell::new();
static OVERLAY: OnceCell<JniTable> = OnceCell::new();

/// The stashed original table. Wrappers cannot exist before install, so a
/// miss here is corrupted state.
pub(crate) fn host() -> &'static JNINativeInterface_ {
    match HOST.get() {
        Some(table) => &table.0,
        None => {
            log::error!("JNI wrapper invoked before the host table was stashed");
            std::process::abort();
        }
    }
}

/// Non-aborting host access, for paths that may run before install.
pub(crate) fn try_host() -> Option<&'static JNINativeInterface_> {
    HOST.get().map(|table| &table.0)
}

/// Restore the VM's own table, undoing [`install`].
pub fn restore_host(ti: &TiEnv) -> Result<()> {
    match HOST.get() {
        Some(table) => ti.set_jni_function_table(&table.0),
        None => Ok(()),
    }
}

/// A host slot the VM is required to populate turned out null.
pub(crate) fn missing_host_slot(name: &str) -> ! {
    log::error!("host JNI table has no {name} entry");
    std::process::abort();
}

/// Metadata the VM is required to hold for a live methodID is gone; the
/// wrapper is mid-call and cannot back out.
pub(crate) fn missing_metadata(what: &str) -> ! {
    log::error!("missing method metadata: {what}");
    std::process::abort();
}

macro_rules! host_call {
    ( $name:ident, $( $arg:expr ),* $(,)? ) => {{
        match crate::interpose::host().$name {
            Some(host_fn) => host_fn($( $arg ),*),
            None => crate::interpose::missing_host_slot(stringify!($name)),
        }
    }};
}
pub(crate) use host_call;

macro_rules! jni_trace {
    ( $name:ident ) => {{
        static CALLS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let count = CALLS.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        if log::log_enabled!(log::Level::Trace) {
            crate::interpose::trace_call(stringify!($name), count, None);
        }
    }};
    ( $name:ident, $method:expr ) => {{
        static CALLS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let count = CALLS.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        if log::log_enabled!(log::Level::Trace) {
            crate::interpose::trace_call(stringify!($name), count, Some($method));
        }
    }};
}
pub(crate) use jni_trace;

pub(crate) fn trace_call(name: &str, count: u64, method: Option<jmethodID>) {
    match method.and_then(method_cache::peek) {
        Some(info) => log::trace!(
            "{name},{count},{}.{}{}",
            info.class_descriptor,
            info.name,
            info.descriptor
        ),
        None => log::trace!("{name},{count}"),
    }
}

#[inline]
pub(crate) fn unwrap_obj(obj: jobject) -> jobject {
    crate::refcodec::unwrap_ref(obj.cast()).cast()
}

#[inline]
pub(crate) fn wrap_obj(obj: jobject) -> jobject {
    crate::refcodec::wrap_ref(obj.cast()).cast()
}

#[inline]
pub(crate) fn pass<T>(value: T) -> T {
    value
}

/// Stash the VM's table and install the overlay. Called once from attach;
/// failure leaves the VM's table untouched.
pub fn install(ti: &TiEnv) -> Result<()> {
    let host_ptr = ti.jni_function_table()?;
    if host_ptr.is_null() {
        return Err(Error::NullHostTable);
    }
    let host_table = unsafe { *host_ptr };
    let _ = HOST.set(JniTable(host_table));

    let overlay = OVERLAY.get_or_init(|| JniTable(unsafe { build_overlay(host()) }));
    ti.set_jni_function_table(&overlay.0)?;
    log::debug!("JNI function table overlay installed");
    Ok(())
}

macro_rules! assign_call_slots {
    ( $table:ident, $( $Name:ident ),* $(,)? ) => { paste! { $(
        $table.[<Call $Name MethodA>] = Some(calls::[<W_Call $Name MethodA>]);
        $table.[<Call $Name MethodV>] = Some(calls::[<W_Call $Name MethodV>]);
        $table.[<CallNonvirtual $Name MethodA>] = Some(calls::[<W_CallNonvirtual $Name MethodA>]);
        $table.[<CallNonvirtual $Name MethodV>] = Some(calls::[<W_CallNonvirtual $Name MethodV>]);
        $table.[<CallStatic $Name MethodA>] = Some(calls::[<W_CallStatic $Name MethodA>]);
        $table.[<CallStatic $Name MethodV>] = Some(calls::[<W_CallStatic $Name MethodV>]);
        #[cfg(target_arch = "x86_64")]
        {
            $table.[<Call $Name Method>] =
                Some(std::mem::transmute(calls::[<W_Call $Name MethodDots>] as usize));
            $table.[<CallNonvirtual $Name Method>] =
                Some(std::mem::transmute(calls::[<W_CallNonvirtual $Name MethodDots>] as usize));
            $table.[<CallStatic $Name Method>] =
                Some(std::mem::transmute(calls::[<W_CallStatic $Name MethodDots>] as usize));
        }
    )* } };
}

macro_rules! assign_field_slots {
    ( $table:ident, $( $Name:ident ),* $(,)? ) => { paste! { $(
        $table.[<Get $Name Field>] = Some(fields::[<W_Get $Name Field>]);
        $table.[<Set $Name Field>] = Some(fields::[<W_Set $Name Field>]);
        $table.[<GetStatic $Name Field>] = Some(fields::[<W_GetStatic $Name Field>]);
        $table.[<SetStatic $Name Field>] = Some(fields::[<W_SetStatic $Name Field>]);
    )* } };
}

macro_rules! assign_array_slots {
    ( $table:ident, $( $Name:ident ),* $(,)? ) => { paste! { $(
        $table.[<New $Name Array>] = Some(arrays::[<W_New $Name Array>]);
        $table.[<Get $Name ArrayElements>] = Some(arrays::[<W_Get $Name ArrayElements>]);
        $table.[<Release $Name ArrayElements>] = Some(arrays::[<W_Release $Name ArrayElements>]);
        $table.[<Get $Name ArrayRegion>] = Some(arrays::[<W_Get $Name ArrayRegion>]);
        $table.[<Set $Name ArrayRegion>] = Some(arrays::[<W_Set $Name ArrayRegion>]);
    )* } };
}

/// Build the replacement table: copy every host slot first, then override
/// what the agent intercepts. Anything not named here keeps the host's
/// pointer, which is what keeps the identity contract honest for slots
/// this agent doesn't know about.
///
/// # Safety
///
/// `host` must be a fully populated JNI function table.
pub(crate) unsafe fn build_overlay(host: &JNINativeInterface_) -> JNINativeInterface_ {
    let mut table = *host;

    assign_call_slots!(
        table, Object, Boolean, Byte, Char, Short, Int, Long, Float, Double
    );
    assign_field_slots!(
        table, Object, Boolean, Byte, Char, Short, Int, Long, Float, Double
    );
    assign_array_slots!(table, Boolean, Byte, Char, Short, Int, Long, Float, Double);

    // Void calls.
    table.CallVoidMethodA = Some(calls::W_CallVoidMethodA);
    table.CallVoidMethodV = Some(calls::W_CallVoidMethodV);
    table.CallNonvirtualVoidMethodA = Some(calls::W_CallNonvirtualVoidMethodA);
    table.CallNonvirtualVoidMethodV = Some(calls::W_CallNonvirtualVoidMethodV);
    table.CallStaticVoidMethodA = Some(calls::W_CallStaticVoidMethodA);
    table.CallStaticVoidMethodV = Some(calls::W_CallStaticVoidMethodV);
    #[cfg(target_arch = "x86_64")]
    {
        table.CallVoidMethod = Some(std::mem::transmute(calls::W_CallVoidMethodDots as usize));
        table.CallNonvirtualVoidMethod = Some(std::mem::transmute(
            calls::W_CallNonvirtualVoidMethodDots as usize,
        ));
        table.CallStaticVoidMethod = Some(std::mem::transmute(
            calls::W_CallStaticVoidMethodDots as usize,
        ));
    }

    // Object construction.
    table.NewObjectA = Some(calls::W_NewObjectA);
    table.NewObjectV = Some(calls::W_NewObjectV);
    #[cfg(target_arch = "x86_64")]
    {
        table.NewObject = Some(std::mem::transmute(calls::W_NewObjectDots as usize));
    }

    // Everything else.
    table.GetVersion = Some(singles::W_GetVersion);
    table.DefineClass = Some(singles::W_DefineClass);
    table.FindClass = Some(singles::W_FindClass);
    table.FromReflectedMethod = Some(singles::W_FromReflectedMethod);
    table.FromReflectedField = Some(singles::W_FromReflectedField);
    table.ToReflectedMethod = Some(singles::W_ToReflectedMethod);
    table.GetSuperclass = Some(singles::W_GetSuperclass);
    table.IsAssignableFrom = Some(singles::W_IsAssignableFrom);
    table.ToReflectedField = Some(singles::W_ToReflectedField);
    table.Throw = Some(singles::W_Throw);
    table.ThrowNew = Some(singles::W_ThrowNew);
    table.ExceptionOccurred = Some(singles::W_ExceptionOccurred);
    table.ExceptionDescribe = Some(singles::W_ExceptionDescribe);
    table.ExceptionClear = Some(singles::W_ExceptionClear);
    table.FatalError = Some(singles::W_FatalError);
    table.PushLocalFrame = Some(singles::W_PushLocalFrame);
    table.PopLocalFrame = Some(singles::W_PopLocalFrame);
    table.NewGlobalRef = Some(singles::W_NewGlobalRef);
    table.DeleteGlobalRef = Some(singles::W_DeleteGlobalRef);
    table.DeleteLocalRef = Some(singles::W_DeleteLocalRef);
    table.IsSameObject = Some(singles::W_IsSameObject);
    table.NewLocalRef = Some(singles::W_NewLocalRef);
    table.EnsureLocalCapacity = Some(singles::W_EnsureLocalCapacity);
    table.AllocObject = Some(singles::W_AllocObject);
    table.GetObjectClass = Some(singles::W_GetObjectClass);
    table.IsInstanceOf = Some(singles::W_IsInstanceOf);
    table.GetMethodID = Some(singles::W_GetMethodID);
    table.GetFieldID = Some(singles::W_GetFieldID);
    table.GetStaticMethodID = Some(singles::W_GetStaticMethodID);
    table.GetStaticFieldID = Some(singles::W_GetStaticFieldID);
    table.NewString = Some(singles::W_NewString);
    table.GetStringLength = Some(singles::W_GetStringLength);
    table.GetStringChars = Some(singles::W_GetStringChars);
    table.ReleaseStringChars = Some(singles::W_ReleaseStringChars);
    table.NewStringUTF = Some(singles::W_NewStringUTF);
    table.GetStringUTFLength = Some(singles::W_GetStringUTFLength);
    table.GetStringUTFChars = Some(singles::W_GetStringUTFChars);
    table.ReleaseStringUTFChars = Some(singles::W_ReleaseStringUTFChars);
    table.GetArrayLength = Some(singles::W_GetArrayLength);
    table.NewObjectArray = Some(singles::W_NewObjectArray);
    table.GetObjectArrayElement = Some(singles::W_GetObjectArrayElement);
    table.SetObjectArrayElement = Some(singles::W_SetObjectArrayElement);
    table.RegisterNatives = Some(singles::W_RegisterNatives);
    table.UnregisterNatives = Some(singles::W_UnregisterNatives);
    table.MonitorEnter = Some(singles::W_MonitorEnter);
    table.MonitorExit = Some(singles::W_MonitorExit);
    table.GetJavaVM = Some(singles::W_GetJavaVM);
    table.GetStringRegion = Some(singles::W_GetStringRegion);
    table.GetStringUTFRegion = Some(singles::W_GetStringUTFRegion);
    table.GetPrimitiveArrayCritical = Some(singles::W_GetPrimitiveArrayCritical);
    table.ReleasePrimitiveArrayCritical = Some(singles::W_ReleasePrimitiveArrayCritical);
    table.GetStringCritical = Some(singles::W_GetStringCritical);
    table.ReleaseStringCritical = Some(singles::W_ReleaseStringCritical);
    table.NewWeakGlobalRef = Some(singles::W_NewWeakGlobalRef);
    table.DeleteWeakGlobalRef = Some(singles::W_DeleteWeakGlobalRef);
    table.ExceptionCheck = Some(singles::W_ExceptionCheck);
    table.NewDirectByteBuffer = Some(singles::W_NewDirectByteBuffer);
    table.GetDirectBufferAddress = Some(singles::W_GetDirectBufferAddress);
    table.GetDirectBufferCapacity = Some(singles::W_GetDirectBufferCapacity);
    table.GetObjectRefType = Some(singles::W_GetObjectRefType);

    table
}
