//! A JVMTI agent that transparently interposes the Java↔native boundary.
//!
//! Load it with `-agentpath:libjniscope.so` (or attach dynamically) and it
//! installs itself on both sides of every JNI crossing:
//!
//! - **Java→native**: for every native method the VM binds in user code,
//!   the agent synthesizes a trampoline with the method's exact C ABI.
//!   One code template is compiled per signature shape and bitwise-copied
//!   per method; at run time the copy recovers which method it stands in
//!   for from its own return address. The trampoline wraps reference
//!   arguments through the [`refcodec`] hook, calls the original native
//!   entry, and unwraps reference results.
//! - **native→VM**: the process-wide JNI function table is replaced with
//!   an overlay whose wrappers unwrap reference arguments, forward to the
//!   VM's original table, and wrap reference results. The variadic call
//!   forms are walked per the method's parsed descriptor and forwarded
//!   through the packed-array entry points.
//!
//! The reference transformation itself is policy, not mechanism: the
//! default codec is the identity (an XOR with a zero mask), and swapping
//! in tagging or tracking schemes means touching [`refcodec`] only.
//!
//! Set `RUST_LOG=jniscope=trace` to stream one line per intercepted JNI
//! call.

#![allow(clippy::missing_safety_doc)]

pub mod agent;
pub mod errors;
pub mod interpose;
pub mod modules;
pub mod refcodec;
pub mod signature;
pub mod sys;
pub mod tienv;
pub mod trampoline;

pub use agent::{Agent_OnAttach, Agent_OnLoad, Config};
pub use errors::{Error, Result};
pub use refcodec::{set_ref_mask, unwrap_ref, wrap_ref};
pub use signature::{JavaType, MethodSignature, SignatureKey};
