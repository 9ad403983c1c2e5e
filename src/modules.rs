//! Classifies code addresses as "system" or "user" by resolving them
//! against the process's loaded modules.
//!
//! The bind handler asks this question for every native entry point the VM
//! reports: system code keeps its direct binding, user code gets a
//! trampoline. The map is rebuilt lazily whenever a lookup misses, since
//! libraries load at arbitrary points in the VM's life. Anything that
//! cannot be resolved is reported as system — the safe direction is to
//! never transform.

use std::collections::BTreeMap;
#[cfg(unix)]
use std::ffi::c_void;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::agent;

#[derive(Debug, Clone)]
struct ModuleSpan {
    end: usize,
    system: bool,
    #[allow(dead_code)]
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawModule {
    start: usize,
    end: usize,
    path: String,
}

#[derive(Default)]
struct ModuleMap {
    // Keyed by (shrunken) start address; spans are disjoint and
    // non-adjacent because each reported range loses one byte per end.
    intervals: BTreeMap<usize, ModuleSpan>,
}

impl ModuleMap {
    fn lookup(&self, addr: usize) -> Option<bool> {
        let (_, span) = self.intervals.range(..=addr).next_back()?;
        if addr < span.end {
            Some(span.system)
        } else {
            None
        }
    }

    fn rebuild(&mut self, modules: Vec<RawModule>) {
        self.intervals.clear();
        let own = own_module_path();
        for module in modules {
            // Shrink one byte per end so that boundary addresses always
            // miss; this also guarantees disjoint, non-adjacent spans even
            // when the OS reports back-to-back mappings.
            let start = module.start + 1;
            let end = module.end - 1;
            if start >= end {
                continue;
            }
            let system = is_system_path(&module.path, own.as_deref());
            self.intervals.insert(
                start,
                ModuleSpan {
                    end,
                    system,
                    path: module.path,
                },
            );
        }
    }
}

static MODULES: Lazy<Mutex<ModuleMap>> = Lazy::new(|| Mutex::new(ModuleMap::default()));

/// Whether `addr` lies inside a system module. Unknown addresses are
/// system: a miss triggers one rebuild from the OS and one retry.
pub fn is_system_address(addr: usize) -> bool {
    let mut map = match MODULES.lock() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(system) = map.lookup(addr) {
        return system;
    }
    map.rebuild(read_loaded_modules());
    map.lookup(addr).unwrap_or(true)
}

fn is_system_path(path: &str, own: Option<&str>) -> bool {
    if let Some(own) = own {
        if path == own {
            return true;
        }
    }
    let config = agent::config();
    if config
        .system_path_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return true;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    config
        .system_name_fragments
        .iter()
        .any(|fragment| file_name.contains(fragment.as_str()))
}

/// Path of the shared object this agent was loaded from. The agent is
/// always system code, whatever directory it was dropped into.
fn own_module_path() -> Option<String> {
    static OWN: Lazy<Option<String>> = Lazy::new(read_own_module_path);
    OWN.clone()
}

#[cfg(unix)]
fn read_own_module_path() -> Option<String> {
    unsafe {
        let mut info: libc::Dl_info = std::mem::zeroed();
        if libc::dladdr(crate::refcodec::wrap_ref as *const c_void, &mut info) != 0
            && !info.dli_fname.is_null()
        {
            return std::ffi::CStr::from_ptr(info.dli_fname)
                .to_str()
                .ok()
                .map(str::to_owned);
        }
        None
    }
}

#[cfg(not(unix))]
fn read_own_module_path() -> Option<String> {
    None
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn read_loaded_modules() -> Vec<RawModule> {
            match std::fs::read_to_string("/proc/self/maps") {
                Ok(maps) => parse_maps(&maps),
                Err(err) => {
                    log::warn!("failed to read /proc/self/maps: {err}");
                    Vec::new()
                }
            }
        }
    } else {
        // No platform reader: every lookup misses and classifies as
        // system, which disables interception rather than corrupting it.
        fn read_loaded_modules() -> Vec<RawModule> {
            Vec::new()
        }
    }
}

/// Parse the `/proc/self/maps` format, keeping only executable mappings
/// that are backed by a file.
#[allow(dead_code)]
fn parse_maps(maps: &str) -> Vec<RawModule> {
    let mut modules = Vec::new();
    for line in maps.lines() {
        let mut fields = line.split_whitespace();
        let (Some(range), Some(perms)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !perms.contains('x') {
            continue;
        }
        // offset, dev, inode
        let path = match fields.nth(3) {
            Some(path) if path.starts_with('/') => path.to_owned(),
            _ => continue,
        };
        let Some((start, end)) = range.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (
            usize::from_str_radix(start, 16),
            usize::from_str_radix(end, 16),
        ) else {
            continue;
        };
        if start < end {
            modules.push(RawModule { start, end, path });
        }
    }
    modules
}
