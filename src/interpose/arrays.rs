//! Primitive-array wrapper families: construction, element pinning and
//! region copies for the eight primitive element types. The array handle
//! is the only reference in play: unwrapped as an argument, wrapped as a
//! result. Element buffers are raw memory and pass through untouched.

#![allow(non_snake_case)]

use jni_sys::{jboolean, jint, jsize, JNIEnv};
use paste::paste;

use crate::interpose::{host_call, jni_trace, unwrap_obj, wrap_obj};

macro_rules! define_array_family {
    ($( $Name:ident ),* $(,)?) => { paste! { $(
        pub(crate) unsafe extern "system" fn [<W_New $Name Array>](
            env: *mut JNIEnv,
            len: jsize,
        ) -> jni_sys::[<j $Name:lower Array>] {
            jni_trace!([<New $Name Array>]);
            wrap_obj(host_call!([<New $Name Array>], env, len))
        }

        pub(crate) unsafe extern "system" fn [<W_Get $Name ArrayElements>](
            env: *mut JNIEnv,
            array: jni_sys::[<j $Name:lower Array>],
            is_copy: *mut jboolean,
        ) -> *mut jni_sys::[<j $Name:lower>] {
            jni_trace!([<Get $Name ArrayElements>]);
            let array = unwrap_obj(array);
            host_call!([<Get $Name ArrayElements>], env, array, is_copy)
        }

        pub(crate) unsafe extern "system" fn [<W_Release $Name ArrayElements>](
            env: *mut JNIEnv,
            array: jni_sys::[<j $Name:lower Array>],
            elems: *mut jni_sys::[<j $Name:lower>],
            mode: jint,
        ) {
            jni_trace!([<Release $Name ArrayElements>]);
            let array = unwrap_obj(array);
            host_call!([<Release $Name ArrayElements>], env, array, elems, mode);
        }

        pub(crate) unsafe extern "system" fn [<W_Get $Name ArrayRegion>](
            env: *mut JNIEnv,
            array: jni_sys::[<j $Name:lower Array>],
            start: jsize,
            len: jsize,
            buf: *mut jni_sys::[<j $Name:lower>],
        ) {
            jni_trace!([<Get $Name ArrayRegion>]);
            let array = unwrap_obj(array);
            host_call!([<Get $Name ArrayRegion>], env, array, start, len, buf);
        }

        pub(crate) unsafe extern "system" fn [<W_Set $Name ArrayRegion>](
            env: *mut JNIEnv,
            array: jni_sys::[<j $Name:lower Array>],
            start: jsize,
            len: jsize,
            buf: *const jni_sys::[<j $Name:lower>],
        ) {
            jni_trace!([<Set $Name ArrayRegion>]);
            let array = unwrap_obj(array);
            host_call!([<Set $Name ArrayRegion>], env, array, start, len, buf);
        }
    )* } };
}

define_array_family! {
    Boolean, Byte, Char, Short, Int, Long, Float, Double,
}
