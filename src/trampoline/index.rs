//! Return-PC demultiplexing.
//!
//! Every installed trampoline copy registers its code range here. When a
//! copy runs it calls [`lookup_native_func`], which reads its own return
//! address — an address inside the copy — and resolves it back to the
//! method binding the copy was installed for. An exact-PC cache fronts the
//! interval map because each copy always calls from the same instruction.

use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::trampoline::code_memory::CodeBlock;

/// Everything the agent remembers about one bound native method.
#[derive(Debug)]
pub struct MethodBinding {
    pub name: String,
    pub descriptor: String,
    pub class_descriptor: Option<String>,
    pub original_entry: usize,
    pub trampoline: CodeBlock,
}

#[derive(Default)]
struct ReturnPcIndex {
    // start -> (end, binding); ranges come from live CodeBlocks, which are
    // mutually disjoint, so the intervals are too.
    intervals: BTreeMap<usize, (usize, Arc<MethodBinding>)>,
    exact: HashMap<usize, Arc<MethodBinding>>,
}

impl ReturnPcIndex {
    fn insert(&mut self, binding: Arc<MethodBinding>) {
        let range = binding.trampoline.range();
        self.intervals.insert(range.start, (range.end, binding));
    }

    fn resolve(&mut self, pc: usize) -> Option<Arc<MethodBinding>> {
        if let Some(binding) = self.exact.get(&pc) {
            return Some(binding.clone());
        }
        let (_, (end, binding)) = self.intervals.range(..=pc).next_back()?;
        if pc >= *end {
            return None;
        }
        let binding = binding.clone();
        self.exact.insert(pc, binding.clone());
        Some(binding)
    }
}

static INDEX: Lazy<Mutex<ReturnPcIndex>> = Lazy::new(|| Mutex::new(ReturnPcIndex::default()));

fn index() -> std::sync::MutexGuard<'static, ReturnPcIndex> {
    match INDEX.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Publish a freshly installed trampoline copy. Must complete before the
/// copy's entry address is handed to the VM.
pub fn register(binding: Arc<MethodBinding>) {
    index().insert(binding);
}

/// Resolve a PC to the binding whose trampoline copy contains it.
pub fn resolve_pc(pc: usize) -> Option<Arc<MethodBinding>> {
    index().resolve(pc)
}

/// Snapshot of all registered `[start, end)` ranges, for verification.
pub fn interval_snapshot() -> Vec<(usize, usize)> {
    index()
        .intervals
        .iter()
        .map(|(start, (end, _))| (*start, *end))
        .collect()
}

/// Target of [`lookup_native_func`]. A miss here means a trampoline is
/// executing whose range was never registered; that is corrupted state, not
/// a recoverable error.
extern "C" fn resolve_native_target(pc: usize) -> *const c_void {
    match resolve_pc(pc) {
        Some(binding) => binding.original_entry as *const c_void,
        None => {
            log::error!("no trampoline registered for return PC {pc:#x}");
            std::process::abort();
        }
    }
}

/// Whether this target has a return-address shim at all. Synthesis
/// refuses to install trampolines without one.
pub(crate) const HAVE_RETURN_PC_SHIM: bool =
    cfg!(any(target_arch = "x86_64", target_arch = "aarch64"));

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// Returns the original native entry point for the trampoline copy
        /// that called it, recovered from the caller's return address.
        ///
        /// Emitted code calls this through an absolute address; the shim
        /// forwards its own return address (still on the stack) and tail
        /// calls the resolver, so the caller's frame is untouched.
        #[no_mangle]
        #[unsafe(naked)]
        pub extern "C" fn lookup_native_func() -> *const c_void {
            core::arch::naked_asm!(
                "mov rdi, qword ptr [rsp]",
                "jmp {resolve}",
                resolve = sym resolve_native_target,
            )
        }
    } else if #[cfg(target_arch = "aarch64")] {
        /// Returns the original native entry point for the trampoline copy
        /// that called it, recovered from the caller's return address.
        #[no_mangle]
        #[unsafe(naked)]
        pub extern "C" fn lookup_native_func() -> *const c_void {
            core::arch::naked_asm!(
                "mov x0, x30",
                "b {resolve}",
                resolve = sym resolve_native_target,
            )
        }
    } else {
        /// Unsupported target: resolution always misses, so no trampoline
        /// is ever installed (codegen refuses earlier anyway).
        #[no_mangle]
        pub extern "C" fn lookup_native_func() -> *const c_void {
            resolve_native_target(0)
        }
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use crate::trampoline::code_memory;

    fn block_with_len(len: usize) -> CodeBlock {
        let mut block = code_memory::allocate(len).unwrap();
        block.copy_from(&vec![0xc3u8; len]);
        block.finalize().unwrap()
    }

    fn binding(len: usize, entry: usize) -> Arc<MethodBinding> {
        Arc::new(MethodBinding {
            name: "m".into(),
            descriptor: "()V".into(),
            class_descriptor: None,
            original_entry: entry,
            trampoline: block_with_len(len),
        })
    }

    #[test]
    fn resolves_interior_pcs_and_rejects_outsiders() {
        let first = binding(16, 0x1111);
        let second = binding(16, 0x2222);
        register(first.clone());
        register(second.clone());

        let range = first.trampoline.range();
        for pc in [range.start, range.start + 7, range.end - 1] {
            let hit = resolve_pc(pc).expect("interior PC must resolve");
            assert_eq!(hit.original_entry, 0x1111);
        }
        assert!(resolve_pc(range.end).is_none() || resolve_pc(range.end).unwrap().original_entry != 0x1111);

        let other = second.trampoline.range();
        assert_eq!(resolve_pc(other.start + 1).unwrap().original_entry, 0x2222);
    }

    #[test]
    fn intervals_stay_disjoint() {
        for _ in 0..8 {
            register(binding(32, 0));
        }
        let mut snapshot = interval_snapshot();
        snapshot.sort_unstable();
        for pair in snapshot.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "{pair:?} overlap");
        }
    }

    #[test]
    fn exact_cache_matches_interval_lookup() {
        let entry = binding(16, 0x3333);
        register(entry.clone());
        let pc = entry.trampoline.range().start + 3;
        let via_interval = resolve_pc(pc).unwrap();
        let via_cache = resolve_pc(pc).unwrap();
        assert!(Arc::ptr_eq(&via_interval, &via_cache));
    }
}
