//! Trampoline synthesis.
//!
//! One code template is emitted per distinct signature shape, then every
//! bound method of that shape gets its own bitwise copy in a fresh
//! executable region. The copy's address range, registered in the
//! return-PC index, is what tells the shared code which original native
//! function to dispatch to.

mod codegen;
pub mod code_memory;
pub mod index;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::errors::*;
use crate::signature::{MethodSignature, SignatureKey};
use code_memory::CodeBlock;
use index::MethodBinding;

struct Template {
    block: CodeBlock,
}

static TEMPLATES: Lazy<Mutex<HashMap<SignatureKey, Arc<Template>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// Codegen failures are reported once per method, not once per retry.
static REPORTED_FAILURES: Lazy<Mutex<HashSet<(String, String)>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Synthesize (or reuse) a trampoline for one native method binding.
///
/// On success the returned address is callable with the same C ABI as
/// `original_entry` and is fully published: protections applied,
/// instruction cache invalidated, and the return-PC index updated. On
/// failure the caller leaves the VM's direct binding untouched.
pub fn make_trampoline(
    name: &str,
    descriptor: &str,
    class_descriptor: Option<String>,
    original_entry: usize,
) -> Result<usize> {
    if !index::HAVE_RETURN_PC_SHIM {
        return Err(Error::Codegen {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            reason: "no return-address shim for this target".into(),
        });
    }
    let signature = MethodSignature::parse(descriptor, 2)?;
    let template = template_for(&signature)?;

    let mut copy = code_memory::allocate(template.block.len())?;
    copy.copy_from(template.block.bytes());
    let block = copy.finalize()?;
    let entry = block.start();

    let binding = Arc::new(MethodBinding {
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
        class_descriptor,
        original_entry,
        trampoline: block,
    });
    index::register(binding);

    log::debug!(
        "trampoline for {}{} installed at {:#x} (original {:#x})",
        name,
        descriptor,
        entry,
        original_entry
    );
    Ok(entry)
}

/// Log a synthesis failure, once per (name, descriptor).
pub fn report_failure(name: &str, descriptor: &str, err: &Error) {
    let mut reported = lock(&REPORTED_FAILURES);
    if reported.insert((name.to_owned(), descriptor.to_owned())) {
        log::warn!("no trampoline for {name}{descriptor}: {err}");
    }
}

/// Number of distinct templates emitted so far.
pub fn template_count() -> usize {
    lock(&TEMPLATES).len()
}

fn template_for(signature: &MethodSignature) -> Result<Arc<Template>> {
    let key = signature.key();
    let mut templates = lock(&TEMPLATES);
    if let Some(template) = templates.get(&key) {
        return Ok(template.clone());
    }

    let code = codegen::emit_template(signature)?;
    let mut writable = code_memory::allocate(code.len())?;
    writable.copy_from(&code);
    let block = writable.finalize()?;

    log::debug!("emitted template {key}: {} bytes at {:#x}", block.len(), block.start());
    let template = Arc::new(Template { block });
    templates.insert(key, template.clone());
    Ok(template)
}
