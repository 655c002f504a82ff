//! x86_64 context switching implementation
//!
//! Only the System V callee-saved state is switched: rsp, rbx, rbp,
//! r12-r15, the MXCSR control bits and the x87 control word. Everything
//! else is caller-saved and already spilled by the compiler around the call.
//!
//! Naked functions are stable since Rust 1.88.

use super::EntryFn;
use std::arch::naked_asm;

/// Default MXCSR: all exceptions masked, round to nearest
const MXCSR_DEFAULT: u32 = 0x1F80;
/// Default x87 control word: extended precision, all exceptions masked
const FPU_CW_DEFAULT: u16 = 0x037F;

/// Saved state of a suspended context
///
/// Layout is fixed; the offsets are used by the assembly below.
#[repr(C)]
#[derive(Debug, Default, Clone)]
pub struct SavedRegs {
    pub rsp: u64,    // 0x00
    pub rip: u64,    // 0x08
    pub rbx: u64,    // 0x10
    pub rbp: u64,    // 0x18
    pub r12: u64,    // 0x20
    pub r13: u64,    // 0x28
    pub r14: u64,    // 0x30
    pub r15: u64,    // 0x38
    pub mxcsr: u32,  // 0x40
    pub fpu_cw: u16, // 0x44
    _pad: u16,
}

impl SavedRegs {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

/// Initialize a fresh context
///
/// The first switch into `regs` lands in [`green_trampoline`], which calls
/// `entry(arg)` on the new stack.
///
/// # Safety
///
/// `stack_top` must be the (exclusive) top of a writable stack that stays
/// mapped for as long as the context can run.
#[inline]
pub unsafe fn init_context(regs: &mut SavedRegs, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    // rsp % 16 == 0 at the trampoline; its `call` then leaves the callee
    // with the ABI-mandated rsp % 16 == 8. The 16 bytes above rsp are a
    // zeroed fake frame so stack walkers stop at the trampoline.
    let sp = ((stack_top as usize) & !0xF) - 16;
    (sp as *mut [u64; 2]).write([0, 0]);

    *regs = SavedRegs {
        rsp: sp as u64,
        rip: green_trampoline as *const () as usize as u64,
        r12: entry as *const () as usize as u64,
        r13: arg as u64,
        mxcsr: MXCSR_DEFAULT,
        fpu_cw: FPU_CW_DEFAULT,
        ..SavedRegs::default()
    };
}

/// First code run by a fresh context: `r12(r13)`
#[unsafe(naked)]
pub unsafe extern "C" fn green_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        // entry never returns
        "ud2",
    );
}

/// Save the current context into `old` and resume `new`
///
/// Returns when some later switch resumes `old`.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save into old (rdi)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 2f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        "stmxcsr [rdi + 0x40]",
        "fnstcw [rdi + 0x44]",
        // Load from new (rsi)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "ldmxcsr [rsi + 0x40]",
        "fldcw [rsi + 0x44]",
        "jmp rax",
        // Resume point of a saved context
        "2:",
        "ret",
    );
}

/// Resume `new` without saving the current context
#[unsafe(naked)]
pub unsafe extern "C" fn context_jump(_new: *const SavedRegs) -> ! {
    naked_asm!(
        "mov rsp, [rdi + 0x00]",
        "mov rax, [rdi + 0x08]",
        "mov rbx, [rdi + 0x10]",
        "mov rbp, [rdi + 0x18]",
        "mov r12, [rdi + 0x20]",
        "mov r13, [rdi + 0x28]",
        "mov r14, [rdi + 0x30]",
        "mov r15, [rdi + 0x38]",
        "ldmxcsr [rdi + 0x40]",
        "fldcw [rdi + 0x44]",
        "jmp rax",
    );
}
