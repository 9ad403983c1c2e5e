//! Process-wide `jmethodID` → signature cache.
//!
//! Populated lazily the first time a wrapper has to walk an argument list
//! for a method. The VM never recycles a methodID while its class is
//! alive, and the agent never observes unloading, so entries are leaked
//! into `'static` and live forever.

use std::collections::HashMap;
use std::sync::Mutex;

use jni_sys::{jmethodID, JNIEnv};
use once_cell::sync::Lazy;

use crate::agent;
use crate::interpose::{host_call, missing_metadata};
use crate::signature::MethodSignature;

#[derive(Debug)]
pub struct MethodInfo {
    pub signature: MethodSignature,
    pub name: String,
    pub descriptor: String,
    pub class_descriptor: String,
}

static CACHE: Lazy<Mutex<HashMap<usize, &'static MethodInfo>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cache() -> std::sync::MutexGuard<'static, HashMap<usize, &'static MethodInfo>> {
    match CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Cached info only; never talks to the VM. Safe from any wrapper.
pub fn peek(method: jmethodID) -> Option<&'static MethodInfo> {
    cache().get(&(method as usize)).copied()
}

/// Info for a live methodID, resolving through JVMTI on first sight.
///
/// A live methodID whose metadata cannot be retrieved leaves the agent
/// with no way to size the argument list it is already committed to
/// walking; that is a fatal assertion, not an error return.
pub fn lookup(env: *mut JNIEnv, method: jmethodID) -> &'static MethodInfo {
    if method.is_null() {
        missing_metadata("argument walk with null methodID");
    }
    if let Some(info) = peek(method) {
        return info;
    }

    let Some(ti) = agent::ti() else {
        missing_metadata("argument walk before JVMTI attach");
    };
    let info = match resolve(env, &ti, method) {
        Ok(info) => info,
        Err(err) => {
            log::error!("cannot resolve methodID {:p}: {err}", method);
            missing_metadata("metadata query failed for live methodID");
        }
    };

    let info: &'static MethodInfo = Box::leak(Box::new(info));
    *cache().entry(method as usize).or_insert(info)
}

fn resolve(
    env: *mut JNIEnv,
    ti: &crate::tienv::TiEnv,
    method: jmethodID,
) -> crate::errors::Result<MethodInfo> {
    let (name, descriptor) = ti.method_name(method)?;
    let class = ti.method_declaring_class(method)?;
    let class_descriptor = ti.class_signature(class)?;
    if !class.is_null() && !env.is_null() {
        unsafe {
            host_call!(DeleteLocalRef, env, class);
        }
    }
    let signature = MethodSignature::parse(&descriptor, 0)?;
    Ok(MethodInfo {
        signature,
        name,
        descriptor,
        class_descriptor,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn peek_never_resolves_and_cached_entries_are_stable() {
        let method = 0xfeed_0001usize;
        assert!(peek(method as jmethodID).is_none());

        let signature = MethodSignature::parse("(IJ)V", 0).unwrap();
        cache().entry(method).or_insert_with(|| {
            Box::leak(Box::new(MethodInfo {
                signature,
                name: "tick".into(),
                descriptor: "(IJ)V".into(),
                class_descriptor: "LClock;".into(),
            }))
        });

        let first = peek(method as jmethodID).unwrap();
        let second = peek(method as jmethodID).unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.descriptor, "(IJ)V");
        assert_eq!(first.signature.args.len(), 2);
    }
}
