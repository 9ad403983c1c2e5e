//! The `Call*Method` wrapper families: virtual, non-virtual and static
//! shapes, for each of the nine value return slots plus void, in all three
//! variadic forms.
//!
//! Every form funnels into the host's `…A` entry with a freshly packed,
//! reference-unwrapped `jvalue[]`. On targets without the naked-asm
//! prologue the `va_list` form falls back to forwarding the caller's list
//! to the host's own `V` slot (receiver still unwrapped), and the `…` form
//! keeps the host's original pointer.

#![allow(non_snake_case)]

use jni_sys::{
    jboolean, jbyte, jchar, jclass, jdouble, jfloat, jint, jlong, jmethodID, jobject, jshort,
    jvalue, va_list, JNIEnv,
};
use paste::paste;

use crate::interpose::args::unwrap_packed;
use crate::interpose::{host_call, jni_trace, pass, unwrap_obj, wrap_obj};

#[cfg(target_arch = "x86_64")]
use crate::interpose::args::unwrap_va_list;
#[cfg(target_arch = "x86_64")]
use crate::interpose::varargs::varargs_entry;

macro_rules! define_call_family {
    ($( ($Name:ident, $Ret:ty, $wrap:path) ),* $(,)?) => { paste! { $(
        // ---- virtual ----

        pub(crate) unsafe extern "system" fn [<W_Call $Name MethodA>](
            env: *mut JNIEnv,
            obj: jobject,
            method: jmethodID,
            args: *const jvalue,
        ) -> $Ret {
            jni_trace!([<Call $Name MethodA>], method);
            let obj = unwrap_obj(obj);
            let packed = unwrap_packed(env, method, args);
            $wrap(host_call!([<Call $Name MethodA>], env, obj, method, packed.as_ptr()))
        }

        #[cfg(target_arch = "x86_64")]
        pub(crate) unsafe extern "system" fn [<W_Call $Name MethodV>](
            env: *mut JNIEnv,
            obj: jobject,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<Call $Name MethodV>], method);
            let obj = unwrap_obj(obj);
            let packed = unwrap_va_list(env, method, args);
            $wrap(host_call!([<Call $Name MethodA>], env, obj, method, packed.as_ptr()))
        }

        #[cfg(not(target_arch = "x86_64"))]
        pub(crate) unsafe extern "system" fn [<W_Call $Name MethodV>](
            env: *mut JNIEnv,
            obj: jobject,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<Call $Name MethodV>], method);
            let obj = unwrap_obj(obj);
            $wrap(host_call!([<Call $Name MethodV>], env, obj, method, args))
        }

        #[cfg(target_arch = "x86_64")]
        varargs_entry!([<W_Call $Name MethodDots>] -> [<W_Call $Name MethodV>], named_gprs = 3);

        // ---- non-virtual ----

        pub(crate) unsafe extern "system" fn [<W_CallNonvirtual $Name MethodA>](
            env: *mut JNIEnv,
            obj: jobject,
            class: jclass,
            method: jmethodID,
            args: *const jvalue,
        ) -> $Ret {
            jni_trace!([<CallNonvirtual $Name MethodA>], method);
            let obj = unwrap_obj(obj);
            let class = unwrap_obj(class);
            let packed = unwrap_packed(env, method, args);
            $wrap(host_call!([<CallNonvirtual $Name MethodA>], env, obj, class, method, packed.as_ptr()))
        }

        #[cfg(target_arch = "x86_64")]
        pub(crate) unsafe extern "system" fn [<W_CallNonvirtual $Name MethodV>](
            env: *mut JNIEnv,
            obj: jobject,
            class: jclass,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<CallNonvirtual $Name MethodV>], method);
            let obj = unwrap_obj(obj);
            let class = unwrap_obj(class);
            let packed = unwrap_va_list(env, method, args);
            $wrap(host_call!([<CallNonvirtual $Name MethodA>], env, obj, class, method, packed.as_ptr()))
        }

        #[cfg(not(target_arch = "x86_64"))]
        pub(crate) unsafe extern "system" fn [<W_CallNonvirtual $Name MethodV>](
            env: *mut JNIEnv,
            obj: jobject,
            class: jclass,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<CallNonvirtual $Name MethodV>], method);
            let obj = unwrap_obj(obj);
            let class = unwrap_obj(class);
            $wrap(host_call!([<CallNonvirtual $Name MethodV>], env, obj, class, method, args))
        }

        #[cfg(target_arch = "x86_64")]
        varargs_entry!([<W_CallNonvirtual $Name MethodDots>] -> [<W_CallNonvirtual $Name MethodV>], named_gprs = 4);

        // ---- static ----

        pub(crate) unsafe extern "system" fn [<W_CallStatic $Name MethodA>](
            env: *mut JNIEnv,
            class: jclass,
            method: jmethodID,
            args: *const jvalue,
        ) -> $Ret {
            jni_trace!([<CallStatic $Name MethodA>], method);
            let class = unwrap_obj(class);
            let packed = unwrap_packed(env, method, args);
            $wrap(host_call!([<CallStatic $Name MethodA>], env, class, method, packed.as_ptr()))
        }

        #[cfg(target_arch = "x86_64")]
        pub(crate) unsafe extern "system" fn [<W_CallStatic $Name MethodV>](
            env: *mut JNIEnv,
            class: jclass,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<CallStatic $Name MethodV>], method);
            let class = unwrap_obj(class);
            let packed = unwrap_va_list(env, method, args);
            $wrap(host_call!([<CallStatic $Name MethodA>], env, class, method, packed.as_ptr()))
        }

        #[cfg(not(target_arch = "x86_64"))]
        pub(crate) unsafe extern "system" fn [<W_CallStatic $Name MethodV>](
            env: *mut JNIEnv,
            class: jclass,
            method: jmethodID,
            args: va_list,
        ) -> $Ret {
            jni_trace!([<CallStatic $Name MethodV>], method);
            let class = unwrap_obj(class);
            $wrap(host_call!([<CallStatic $Name MethodV>], env, class, method, args))
        }

        #[cfg(target_arch = "x86_64")]
        varargs_entry!([<W_CallStatic $Name MethodDots>] -> [<W_CallStatic $Name MethodV>], named_gprs = 3);
    )* } };
}

define_call_family! {
    (Object, jobject, wrap_obj),
    (Boolean, jboolean, pass),
    (Byte, jbyte, pass),
    (Char, jchar, pass),
    (Short, jshort, pass),
    (Int, jint, pass),
    (Long, jlong, pass),
    (Float, jfloat, pass),
    (Double, jdouble, pass),
}

macro_rules! define_void_call_family {
    ($( ($Shape:ident, named_gprs = $gprs:tt, ($($recv:ident : $RecvTy:ty),*) ) ),* $(,)?) => { paste! { $(
        pub(crate) unsafe extern "system" fn [<W_ $Shape VoidMethodA>](
            env: *mut JNIEnv,
            $($recv: $RecvTy,)*
            method: jmethodID,
            args: *const jvalue,
        ) {
            jni_trace!([<$Shape VoidMethodA>], method);
            $(let $recv = unwrap_obj($recv);)*
            let packed = unwrap_packed(env, method, args);
            host_call!([<$Shape VoidMethodA>], env, $($recv,)* method, packed.as_ptr());
        }

        #[cfg(target_arch = "x86_64")]
        pub(crate) unsafe extern "system" fn [<W_ $Shape VoidMethodV>](
            env: *mut JNIEnv,
            $($recv: $RecvTy,)*
            method: jmethodID,
            args: va_list,
        ) {
            jni_trace!([<$Shape VoidMethodV>], method);
            $(let $recv = unwrap_obj($recv);)*
            let packed = unwrap_va_list(env, method, args);
            host_call!([<$Shape VoidMethodA>], env, $($recv,)* method, packed.as_ptr());
        }

        #[cfg(not(target_arch = "x86_64"))]
        pub(crate) unsafe extern "system" fn [<W_ $Shape VoidMethodV>](
            env: *mut JNIEnv,
            $($recv: $RecvTy,)*
            method: jmethodID,
            args: va_list,
        ) {
            jni_trace!([<$Shape VoidMethodV>], method);
            $(let $recv = unwrap_obj($recv);)*
            host_call!([<$Shape VoidMethodV>], env, $($recv,)* method, args);
        }

        #[cfg(target_arch = "x86_64")]
        varargs_entry!([<W_ $Shape VoidMethodDots>] -> [<W_ $Shape VoidMethodV>], named_gprs = $gprs);
    )* } };
}

define_void_call_family! {
    (Call, named_gprs = 3, (obj: jobject)),
    (CallNonvirtual, named_gprs = 4, (obj: jobject, class: jclass)),
    (CallStatic, named_gprs = 3, (class: jclass)),
}

// Object construction shares the static-call shape.

pub(crate) unsafe extern "system" fn W_NewObjectA(
    env: *mut JNIEnv,
    class: jclass,
    method: jmethodID,
    args: *const jvalue,
) -> jobject {
    jni_trace!(NewObjectA, method);
    let class = unwrap_obj(class);
    let packed = unwrap_packed(env, method, args);
    wrap_obj(host_call!(NewObjectA, env, class, method, packed.as_ptr()))
}

#[cfg(target_arch = "x86_64")]
pub(crate) unsafe extern "system" fn W_NewObjectV(
    env: *mut JNIEnv,
    class: jclass,
    method: jmethodID,
    args: va_list,
) -> jobject {
    jni_trace!(NewObjectV, method);
    let class = unwrap_obj(class);
    let packed = unwrap_va_list(env, method, args);
    wrap_obj(host_call!(NewObjectA, env, class, method, packed.as_ptr()))
}

#[cfg(not(target_arch = "x86_64"))]
pub(crate) unsafe extern "system" fn W_NewObjectV(
    env: *mut JNIEnv,
    class: jclass,
    method: jmethodID,
    args: va_list,
) -> jobject {
    jni_trace!(NewObjectV, method);
    let class = unwrap_obj(class);
    wrap_obj(host_call!(NewObjectV, env, class, method, args))
}

#[cfg(target_arch = "x86_64")]
varargs_entry!(W_NewObjectDots -> W_NewObjectV, named_gprs = 3);
