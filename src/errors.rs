use std::io;

use thiserror::Error;

use crate::sys::jvmti::jvmtiError;

/// Everything that can go wrong inside the agent.
///
/// None of these are fatal to the VM: a failed trampoline leaves the
/// original binding in place, a failed module-map read classifies the
/// address as system. The only errors that abort anything are the ones
/// surfaced during attach, which turn into a non-zero return from
/// `Agent_OnAttach`.
#[derive(Debug, Error)]
pub enum Error {
    /// The method descriptor did not match the JVM grammar.
    #[error("unparseable method descriptor: {descriptor}")]
    BadDescriptor { descriptor: String },

    /// The back end could not produce a usable function body.
    #[error("code generation failed for {name}{descriptor}: {reason}")]
    Codegen {
        name: String,
        descriptor: String,
        reason: String,
    },

    /// Emitted code carried relocations, which would be resolved against
    /// the original allocation and go stale in copies.
    #[error("emitted template for {key} is not position-independent")]
    TemplateNotCopyable { key: String },

    /// The VM would not hand out a JVMTI environment at all.
    #[error("cannot obtain JVMTI {version:#x} from the VM (GetEnv returned {code})")]
    NoJvmti { version: i32, code: i32 },

    /// A JVMTI call returned something other than `JVMTI_ERROR_NONE`.
    #[error("JVMTI call {call} failed with error {code}")]
    Jvmti { call: &'static str, code: jvmtiError },

    /// The VM refused to hand over or accept a JNI function table.
    #[error("JNI function table replacement failed with error {code}")]
    TableReplace { code: jvmtiError },

    /// `GetJNIFunctionTable` reported success but produced no table.
    #[error("the VM returned a null JNI function table")]
    NullHostTable,

    /// Executable memory could not be mapped or protected.
    #[error("executable memory: {0}")]
    CodeMemory(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn jvmti(call: &'static str, code: jvmtiError) -> Error {
        Error::Jvmti { call, code }
    }
}
