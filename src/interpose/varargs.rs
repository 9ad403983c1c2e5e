//! Entry stubs for the `…`-variant JNI calls.
//!
//! A fixed-signature function cannot stand in for a C variadic callee:
//! the variadic register save area only exists if the prologue spills it.
//! These stubs are that prologue, written out by hand for the System V
//! AMD64 ABI. Each one saves the six argument GPRs and eight XMM registers,
//! materializes a `__va_list_tag` on the stack, and calls the matching
//! `V`-variant wrapper, which walks the list with the same reader used for
//! caller-supplied va_lists.
//!
//! Frame layout after `sub rsp, 200` (entry rsp ≡ 8 mod 16, so the frame
//! is 16-byte aligned at the call):
//!
//! ```text
//!   [rsp +   0 .. 176)   register save area (6 GPRs, then 8 XMM slots)
//!   [rsp + 176 .. 200)   __va_list_tag { gp, fp, overflow, save }
//!   [rsp + 208 ...   )   caller's stack arguments (overflow area)
//! ```
//!
//! The named arguments stay untouched in rdi/rsi/rdx(/rcx), which is
//! exactly where the V-variant wrapper expects them; only the va_list
//! pointer register is added. `gp_offset` starts past the named GPR
//! arguments so the walk begins at the first variadic slot.

#![cfg(target_arch = "x86_64")]

macro_rules! varargs_entry {
    ($stub:ident -> $target:path, named_gprs = 3) => {
        varargs_entry!(@emit $stub, $target, "24", "lea rcx, [rsp + 176]");
    };
    ($stub:ident -> $target:path, named_gprs = 4) => {
        varargs_entry!(@emit $stub, $target, "32", "lea r8, [rsp + 176]");
    };
    (@emit $stub:ident, $target:path, $gp_offset:literal, $load_va_ptr:literal) => {
        #[unsafe(naked)]
        pub(crate) extern "C" fn $stub() {
            core::arch::naked_asm!(
                "sub rsp, 200",
                "mov qword ptr [rsp], rdi",
                "mov qword ptr [rsp + 8], rsi",
                "mov qword ptr [rsp + 16], rdx",
                "mov qword ptr [rsp + 24], rcx",
                "mov qword ptr [rsp + 32], r8",
                "mov qword ptr [rsp + 40], r9",
                // al carries the number of vector registers the caller
                // used; skip the spill when there are none.
                "test al, al",
                "je 2f",
                "movaps xmmword ptr [rsp + 48], xmm0",
                "movaps xmmword ptr [rsp + 64], xmm1",
                "movaps xmmword ptr [rsp + 80], xmm2",
                "movaps xmmword ptr [rsp + 96], xmm3",
                "movaps xmmword ptr [rsp + 112], xmm4",
                "movaps xmmword ptr [rsp + 128], xmm5",
                "movaps xmmword ptr [rsp + 144], xmm6",
                "movaps xmmword ptr [rsp + 160], xmm7",
                "2:",
                concat!("mov dword ptr [rsp + 176], ", $gp_offset),
                "mov dword ptr [rsp + 180], 48",
                "lea rax, [rsp + 208]",
                "mov qword ptr [rsp + 184], rax",
                "mov rax, rsp",
                "mov qword ptr [rsp + 192], rax",
                $load_va_ptr,
                "call {target}",
                "add rsp, 200",
                "ret",
                target = sym $target,
            )
        }
    };
}

pub(crate) use varargs_entry;
