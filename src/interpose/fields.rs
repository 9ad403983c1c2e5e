//! Field access wrapper families: instance and static, get and set, for
//! the nine value types. Reference-typed values are wrapped on the way
//! out of a get and unwrapped on the way into a set; field IDs are opaque
//! and pass through untouched.

#![allow(non_snake_case)]

use jni_sys::{
    jboolean, jbyte, jchar, jclass, jdouble, jfieldID, jfloat, jint, jlong, jobject, jshort,
    JNIEnv,
};
use paste::paste;

use crate::interpose::{host_call, jni_trace, pass, unwrap_obj, wrap_obj};

macro_rules! define_field_family {
    ($( ($Name:ident, $Ty:ty, $wrap:path, $unwrap:path) ),* $(,)?) => { paste! { $(
        pub(crate) unsafe extern "system" fn [<W_Get $Name Field>](
            env: *mut JNIEnv,
            obj: jobject,
            field: jfieldID,
        ) -> $Ty {
            jni_trace!([<Get $Name Field>]);
            let obj = unwrap_obj(obj);
            $wrap(host_call!([<Get $Name Field>], env, obj, field))
        }

        pub(crate) unsafe extern "system" fn [<W_Set $Name Field>](
            env: *mut JNIEnv,
            obj: jobject,
            field: jfieldID,
            value: $Ty,
        ) {
            jni_trace!([<Set $Name Field>]);
            let obj = unwrap_obj(obj);
            host_call!([<Set $Name Field>], env, obj, field, $unwrap(value));
        }

        pub(crate) unsafe extern "system" fn [<W_GetStatic $Name Field>](
            env: *mut JNIEnv,
            class: jclass,
            field: jfieldID,
        ) -> $Ty {
            jni_trace!([<GetStatic $Name Field>]);
            let class = unwrap_obj(class);
            $wrap(host_call!([<GetStatic $Name Field>], env, class, field))
        }

        pub(crate) unsafe extern "system" fn [<W_SetStatic $Name Field>](
            env: *mut JNIEnv,
            class: jclass,
            field: jfieldID,
            value: $Ty,
        ) {
            jni_trace!([<SetStatic $Name Field>]);
            let class = unwrap_obj(class);
            host_call!([<SetStatic $Name Field>], env, class, field, $unwrap(value));
        }
    )* } };
}

define_field_family! {
    (Object, jobject, wrap_obj, unwrap_obj),
    (Boolean, jboolean, pass, pass),
    (Byte, jbyte, pass, pass),
    (Char, jchar, pass, pass),
    (Short, jshort, pass, pass),
    (Int, jint, pass, pass),
    (Long, jlong, pass, pass),
    (Float, jfloat, pass, pass),
    (Double, jdouble, pass, pass),
}
