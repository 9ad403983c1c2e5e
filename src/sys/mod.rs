//! Raw FFI definitions.
//!
//! JNI types come from the `jni-sys` crate; JVMTI has no equivalent
//! published sys crate, so the agent carries its own in [`jvmti`].

pub mod jvmti;
