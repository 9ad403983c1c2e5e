//! The wrappers that don't fall into a type-indexed family: class and ID
//! lookup, strings, the reference lifecycle, exceptions, monitors,
//! reflection, direct buffers, critical accessors and native-method
//! registration.

#![allow(non_snake_case)]

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

use jni_sys::{
    jarray, jboolean, jbyte, jchar, jclass, jfieldID, jint, jlong, jmethodID, jobject,
    jobjectArray, jobjectRefType, jsize, jstring, jthrowable, jweak, JNINativeMethod, JavaVM,
    JNIEnv,
};

use crate::interpose::{host_call, jni_trace, unwrap_obj, wrap_obj};
use crate::{agent, modules, trampoline};

pub(crate) unsafe extern "system" fn W_GetVersion(env: *mut JNIEnv) -> jint {
    jni_trace!(GetVersion);
    host_call!(GetVersion, env)
}

pub(crate) unsafe extern "system" fn W_DefineClass(
    env: *mut JNIEnv,
    name: *const c_char,
    loader: jobject,
    buf: *const jbyte,
    len: jsize,
) -> jclass {
    jni_trace!(DefineClass);
    let loader = unwrap_obj(loader);
    wrap_obj(host_call!(DefineClass, env, name, loader, buf, len))
}

pub(crate) unsafe extern "system" fn W_FindClass(env: *mut JNIEnv, name: *const c_char) -> jclass {
    jni_trace!(FindClass);
    wrap_obj(host_call!(FindClass, env, name))
}

pub(crate) unsafe extern "system" fn W_FromReflectedMethod(
    env: *mut JNIEnv,
    method: jobject,
) -> jmethodID {
    jni_trace!(FromReflectedMethod);
    let method = unwrap_obj(method);
    host_call!(FromReflectedMethod, env, method)
}

pub(crate) unsafe extern "system" fn W_FromReflectedField(
    env: *mut JNIEnv,
    field: jobject,
) -> jfieldID {
    jni_trace!(FromReflectedField);
    let field = unwrap_obj(field);
    host_call!(FromReflectedField, env, field)
}

pub(crate) unsafe extern "system" fn W_ToReflectedMethod(
    env: *mut JNIEnv,
    class: jclass,
    method: jmethodID,
    is_static: jboolean,
) -> jobject {
    jni_trace!(ToReflectedMethod, method);
    let class = unwrap_obj(class);
    wrap_obj(host_call!(ToReflectedMethod, env, class, method, is_static))
}

pub(crate) unsafe extern "system" fn W_GetSuperclass(env: *mut JNIEnv, sub: jclass) -> jclass {
    jni_trace!(GetSuperclass);
    let sub = unwrap_obj(sub);
    wrap_obj(host_call!(GetSuperclass, env, sub))
}

pub(crate) unsafe extern "system" fn W_IsAssignableFrom(
    env: *mut JNIEnv,
    sub: jclass,
    sup: jclass,
) -> jboolean {
    jni_trace!(IsAssignableFrom);
    let sub = unwrap_obj(sub);
    let sup = unwrap_obj(sup);
    host_call!(IsAssignableFrom, env, sub, sup)
}

pub(crate) unsafe extern "system" fn W_ToReflectedField(
    env: *mut JNIEnv,
    class: jclass,
    field: jfieldID,
    is_static: jboolean,
) -> jobject {
    jni_trace!(ToReflectedField);
    let class = unwrap_obj(class);
    wrap_obj(host_call!(ToReflectedField, env, class, field, is_static))
}

pub(crate) unsafe extern "system" fn W_Throw(env: *mut JNIEnv, obj: jthrowable) -> jint {
    jni_trace!(Throw);
    let obj = unwrap_obj(obj);
    host_call!(Throw, env, obj)
}

pub(crate) unsafe extern "system" fn W_ThrowNew(
    env: *mut JNIEnv,
    class: jclass,
    msg: *const c_char,
) -> jint {
    jni_trace!(ThrowNew);
    let class = unwrap_obj(class);
    host_call!(ThrowNew, env, class, msg)
}

pub(crate) unsafe extern "system" fn W_ExceptionOccurred(env: *mut JNIEnv) -> jthrowable {
    jni_trace!(ExceptionOccurred);
    // The returned reference is already opaque to the caller; it crosses
    // untransformed.
    host_call!(ExceptionOccurred, env)
}

pub(crate) unsafe extern "system" fn W_ExceptionDescribe(env: *mut JNIEnv) {
    jni_trace!(ExceptionDescribe);
    host_call!(ExceptionDescribe, env);
}

pub(crate) unsafe extern "system" fn W_ExceptionClear(env: *mut JNIEnv) {
    jni_trace!(ExceptionClear);
    host_call!(ExceptionClear, env);
}

pub(crate) unsafe extern "system" fn W_FatalError(env: *mut JNIEnv, msg: *const c_char) -> ! {
    jni_trace!(FatalError);
    host_call!(FatalError, env, msg)
}

pub(crate) unsafe extern "system" fn W_PushLocalFrame(env: *mut JNIEnv, capacity: jint) -> jint {
    jni_trace!(PushLocalFrame);
    host_call!(PushLocalFrame, env, capacity)
}

pub(crate) unsafe extern "system" fn W_PopLocalFrame(env: *mut JNIEnv, result: jobject) -> jobject {
    jni_trace!(PopLocalFrame);
    let result = unwrap_obj(result);
    wrap_obj(host_call!(PopLocalFrame, env, result))
}

pub(crate) unsafe extern "system" fn W_NewGlobalRef(env: *mut JNIEnv, obj: jobject) -> jobject {
    jni_trace!(NewGlobalRef);
    let obj = unwrap_obj(obj);
    wrap_obj(host_call!(NewGlobalRef, env, obj))
}

pub(crate) unsafe extern "system" fn W_DeleteGlobalRef(env: *mut JNIEnv, gref: jobject) {
    jni_trace!(DeleteGlobalRef);
    let gref = unwrap_obj(gref);
    host_call!(DeleteGlobalRef, env, gref);
}

pub(crate) unsafe extern "system" fn W_DeleteLocalRef(env: *mut JNIEnv, obj: jobject) {
    jni_trace!(DeleteLocalRef);
    let obj = unwrap_obj(obj);
    host_call!(DeleteLocalRef, env, obj);
}

pub(crate) unsafe extern "system" fn W_IsSameObject(
    env: *mut JNIEnv,
    first: jobject,
    second: jobject,
) -> jboolean {
    jni_trace!(IsSameObject);
    let first = unwrap_obj(first);
    let second = unwrap_obj(second);
    host_call!(IsSameObject, env, first, second)
}

pub(crate) unsafe extern "system" fn W_NewLocalRef(env: *mut JNIEnv, reference: jobject) -> jobject {
    jni_trace!(NewLocalRef);
    let reference = unwrap_obj(reference);
    wrap_obj(host_call!(NewLocalRef, env, reference))
}

pub(crate) unsafe extern "system" fn W_EnsureLocalCapacity(
    env: *mut JNIEnv,
    capacity: jint,
) -> jint {
    jni_trace!(EnsureLocalCapacity);
    host_call!(EnsureLocalCapacity, env, capacity)
}

pub(crate) unsafe extern "system" fn W_AllocObject(env: *mut JNIEnv, class: jclass) -> jobject {
    jni_trace!(AllocObject);
    let class = unwrap_obj(class);
    wrap_obj(host_call!(AllocObject, env, class))
}

pub(crate) unsafe extern "system" fn W_GetObjectClass(env: *mut JNIEnv, obj: jobject) -> jclass {
    jni_trace!(GetObjectClass);
    let obj = unwrap_obj(obj);
    wrap_obj(host_call!(GetObjectClass, env, obj))
}

pub(crate) unsafe extern "system" fn W_IsInstanceOf(
    env: *mut JNIEnv,
    obj: jobject,
    class: jclass,
) -> jboolean {
    jni_trace!(IsInstanceOf);
    let obj = unwrap_obj(obj);
    let class = unwrap_obj(class);
    host_call!(IsInstanceOf, env, obj, class)
}

pub(crate) unsafe extern "system" fn W_GetMethodID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    jni_trace!(GetMethodID);
    let class = unwrap_obj(class);
    host_call!(GetMethodID, env, class, name, sig)
}

pub(crate) unsafe extern "system" fn W_GetFieldID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jfieldID {
    jni_trace!(GetFieldID);
    let class = unwrap_obj(class);
    host_call!(GetFieldID, env, class, name, sig)
}

pub(crate) unsafe extern "system" fn W_GetStaticMethodID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    jni_trace!(GetStaticMethodID);
    let class = unwrap_obj(class);
    host_call!(GetStaticMethodID, env, class, name, sig)
}

pub(crate) unsafe extern "system" fn W_GetStaticFieldID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jfieldID {
    jni_trace!(GetStaticFieldID);
    let class = unwrap_obj(class);
    host_call!(GetStaticFieldID, env, class, name, sig)
}

pub(crate) unsafe extern "system" fn W_NewString(
    env: *mut JNIEnv,
    unicode: *const jchar,
    len: jsize,
) -> jstring {
    jni_trace!(NewString);
    wrap_obj(host_call!(NewString, env, unicode, len))
}

pub(crate) unsafe extern "system" fn W_GetStringLength(env: *mut JNIEnv, s: jstring) -> jsize {
    jni_trace!(GetStringLength);
    let s = unwrap_obj(s);
    host_call!(GetStringLength, env, s)
}

pub(crate) unsafe extern "system" fn W_GetStringChars(
    env: *mut JNIEnv,
    s: jstring,
    is_copy: *mut jboolean,
) -> *const jchar {
    jni_trace!(GetStringChars);
    let s = unwrap_obj(s);
    host_call!(GetStringChars, env, s, is_copy)
}

pub(crate) unsafe extern "system" fn W_ReleaseStringChars(
    env: *mut JNIEnv,
    s: jstring,
    chars: *const jchar,
) {
    jni_trace!(ReleaseStringChars);
    let s = unwrap_obj(s);
    host_call!(ReleaseStringChars, env, s, chars);
}

pub(crate) unsafe extern "system" fn W_NewStringUTF(
    env: *mut JNIEnv,
    utf: *const c_char,
) -> jstring {
    jni_trace!(NewStringUTF);
    wrap_obj(host_call!(NewStringUTF, env, utf))
}

pub(crate) unsafe extern "system" fn W_GetStringUTFLength(env: *mut JNIEnv, s: jstring) -> jsize {
    jni_trace!(GetStringUTFLength);
    let s = unwrap_obj(s);
    host_call!(GetStringUTFLength, env, s)
}

pub(crate) unsafe extern "system" fn W_GetStringUTFChars(
    env: *mut JNIEnv,
    s: jstring,
    is_copy: *mut jboolean,
) -> *const c_char {
    jni_trace!(GetStringUTFChars);
    let s = unwrap_obj(s);
    host_call!(GetStringUTFChars, env, s, is_copy)
}

pub(crate) unsafe extern "system" fn W_ReleaseStringUTFChars(
    env: *mut JNIEnv,
    s: jstring,
    chars: *const c_char,
) {
    jni_trace!(ReleaseStringUTFChars);
    let s = unwrap_obj(s);
    host_call!(ReleaseStringUTFChars, env, s, chars);
}

pub(crate) unsafe extern "system" fn W_GetArrayLength(env: *mut JNIEnv, array: jarray) -> jsize {
    jni_trace!(GetArrayLength);
    let array = unwrap_obj(array);
    host_call!(GetArrayLength, env, array)
}

pub(crate) unsafe extern "system" fn W_NewObjectArray(
    env: *mut JNIEnv,
    len: jsize,
    class: jclass,
    init: jobject,
) -> jobjectArray {
    jni_trace!(NewObjectArray);
    let class = unwrap_obj(class);
    let init = unwrap_obj(init);
    wrap_obj(host_call!(NewObjectArray, env, len, class, init))
}

pub(crate) unsafe extern "system" fn W_GetObjectArrayElement(
    env: *mut JNIEnv,
    array: jobjectArray,
    index: jsize,
) -> jobject {
    jni_trace!(GetObjectArrayElement);
    let array = unwrap_obj(array);
    wrap_obj(host_call!(GetObjectArrayElement, env, array, index))
}

pub(crate) unsafe extern "system" fn W_SetObjectArrayElement(
    env: *mut JNIEnv,
    array: jobjectArray,
    index: jsize,
    value: jobject,
) {
    jni_trace!(SetObjectArrayElement);
    let array = unwrap_obj(array);
    let value = unwrap_obj(value);
    host_call!(SetObjectArrayElement, env, array, index, value);
}

/// Dynamically registered natives are bound by address, not by the bind
/// event alone; when interception is configured the registration table is
/// rewritten so user entries point at trampolines before the VM sees them.
pub(crate) unsafe extern "system" fn W_RegisterNatives(
    env: *mut JNIEnv,
    class: jclass,
    methods: *const JNINativeMethod,
    count: jint,
) -> jint {
    jni_trace!(RegisterNatives);
    let class = unwrap_obj(class);
    if !agent::config().intercept_register_natives || methods.is_null() || count <= 0 {
        return host_call!(RegisterNatives, env, class, methods, count);
    }

    let table = std::slice::from_raw_parts(methods, count as usize);
    let mut rewritten = table.to_vec();
    for entry in &mut rewritten {
        if entry.name.is_null() || entry.signature.is_null() || entry.fnPtr.is_null() {
            continue;
        }
        if modules::is_system_address(entry.fnPtr as usize) {
            continue;
        }
        let name = CStr::from_ptr(entry.name).to_string_lossy().into_owned();
        let descriptor = CStr::from_ptr(entry.signature).to_string_lossy().into_owned();
        match trampoline::make_trampoline(&name, &descriptor, None, entry.fnPtr as usize) {
            Ok(entry_point) => entry.fnPtr = entry_point as *mut c_void,
            Err(err) => trampoline::report_failure(&name, &descriptor, &err),
        }
    }
    host_call!(RegisterNatives, env, class, rewritten.as_ptr(), count)
}

pub(crate) unsafe extern "system" fn W_UnregisterNatives(env: *mut JNIEnv, class: jclass) -> jint {
    jni_trace!(UnregisterNatives);
    let class = unwrap_obj(class);
    host_call!(UnregisterNatives, env, class)
}

pub(crate) unsafe extern "system" fn W_MonitorEnter(env: *mut JNIEnv, obj: jobject) -> jint {
    jni_trace!(MonitorEnter);
    let obj = unwrap_obj(obj);
    host_call!(MonitorEnter, env, obj)
}

pub(crate) unsafe extern "system" fn W_MonitorExit(env: *mut JNIEnv, obj: jobject) -> jint {
    jni_trace!(MonitorExit);
    let obj = unwrap_obj(obj);
    host_call!(MonitorExit, env, obj)
}

pub(crate) unsafe extern "system" fn W_GetJavaVM(env: *mut JNIEnv, vm: *mut *mut JavaVM) -> jint {
    jni_trace!(GetJavaVM);
    host_call!(GetJavaVM, env, vm)
}

pub(crate) unsafe extern "system" fn W_GetStringRegion(
    env: *mut JNIEnv,
    s: jstring,
    start: jsize,
    len: jsize,
    buf: *mut jchar,
) {
    jni_trace!(GetStringRegion);
    let s = unwrap_obj(s);
    host_call!(GetStringRegion, env, s, start, len, buf);
}

pub(crate) unsafe extern "system" fn W_GetStringUTFRegion(
    env: *mut JNIEnv,
    s: jstring,
    start: jsize,
    len: jsize,
    buf: *mut c_char,
) {
    jni_trace!(GetStringUTFRegion);
    let s = unwrap_obj(s);
    host_call!(GetStringUTFRegion, env, s, start, len, buf);
}

// The two critical accessors pin VM memory: no tracing, no locks, just
// translate the handle and forward.

pub(crate) unsafe extern "system" fn W_GetPrimitiveArrayCritical(
    env: *mut JNIEnv,
    array: jarray,
    is_copy: *mut jboolean,
) -> *mut c_void {
    let array = unwrap_obj(array);
    host_call!(GetPrimitiveArrayCritical, env, array, is_copy)
}

pub(crate) unsafe extern "system" fn W_ReleasePrimitiveArrayCritical(
    env: *mut JNIEnv,
    array: jarray,
    carray: *mut c_void,
    mode: jint,
) {
    let array = unwrap_obj(array);
    host_call!(ReleasePrimitiveArrayCritical, env, array, carray, mode);
}

pub(crate) unsafe extern "system" fn W_GetStringCritical(
    env: *mut JNIEnv,
    s: jstring,
    is_copy: *mut jboolean,
) -> *const jchar {
    let s = unwrap_obj(s);
    host_call!(GetStringCritical, env, s, is_copy)
}

pub(crate) unsafe extern "system" fn W_ReleaseStringCritical(
    env: *mut JNIEnv,
    s: jstring,
    cstring: *const jchar,
) {
    let s = unwrap_obj(s);
    host_call!(ReleaseStringCritical, env, s, cstring);
}

pub(crate) unsafe extern "system" fn W_NewWeakGlobalRef(env: *mut JNIEnv, obj: jobject) -> jweak {
    jni_trace!(NewWeakGlobalRef);
    let obj = unwrap_obj(obj);
    wrap_obj(host_call!(NewWeakGlobalRef, env, obj))
}

pub(crate) unsafe extern "system" fn W_DeleteWeakGlobalRef(env: *mut JNIEnv, reference: jweak) {
    jni_trace!(DeleteWeakGlobalRef);
    let reference = unwrap_obj(reference);
    host_call!(DeleteWeakGlobalRef, env, reference);
}

pub(crate) unsafe extern "system" fn W_ExceptionCheck(env: *mut JNIEnv) -> jboolean {
    jni_trace!(ExceptionCheck);
    host_call!(ExceptionCheck, env)
}

pub(crate) unsafe extern "system" fn W_NewDirectByteBuffer(
    env: *mut JNIEnv,
    address: *mut c_void,
    capacity: jlong,
) -> jobject {
    jni_trace!(NewDirectByteBuffer);
    wrap_obj(host_call!(NewDirectByteBuffer, env, address, capacity))
}

pub(crate) unsafe extern "system" fn W_GetDirectBufferAddress(
    env: *mut JNIEnv,
    buf: jobject,
) -> *mut c_void {
    jni_trace!(GetDirectBufferAddress);
    let buf = unwrap_obj(buf);
    host_call!(GetDirectBufferAddress, env, buf)
}

pub(crate) unsafe extern "system" fn W_GetDirectBufferCapacity(
    env: *mut JNIEnv,
    buf: jobject,
) -> jlong {
    jni_trace!(GetDirectBufferCapacity);
    let buf = unwrap_obj(buf);
    host_call!(GetDirectBufferCapacity, env, buf)
}

pub(crate) unsafe extern "system" fn W_GetObjectRefType(
    env: *mut JNIEnv,
    obj: jobject,
) -> jobjectRefType {
    jni_trace!(GetObjectRefType);
    let obj = unwrap_obj(obj);
    host_call!(GetObjectRefType, env, obj)
}
