//! aarch64 context switching implementation
//!
//! AAPCS64 callee-saved state: sp, x19-x28, fp (x29), the return address
//! (x30) and the low halves of v8-v15 (d8-d15).

use super::EntryFn;
use std::arch::naked_asm;

/// Saved state of a suspended context
#[repr(C)]
#[derive(Debug, Default, Clone)]
pub struct SavedRegs {
    pub sp: u64,       // 0x00
    pub lr: u64,       // 0x08
    pub x19_x28: [u64; 10], // 0x10 .. 0x58
    pub fp: u64,       // 0x60
    pub d8_d15: [u64; 8], // 0x68 .. 0xa0
}

impl SavedRegs {
    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// Initialize a fresh context
///
/// # Safety
///
/// `stack_top` must be the (exclusive) top of a writable stack that stays
/// mapped for as long as the context can run.
#[inline]
pub unsafe fn init_context(regs: &mut SavedRegs, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    // Zeroed fake frame record above sp terminates frame-pointer walks
    let sp = ((stack_top as usize) & !0xF) - 16;
    (sp as *mut [u64; 2]).write([0, 0]);

    *regs = SavedRegs::default();
    regs.sp = sp as u64;
    regs.lr = green_trampoline as *const () as usize as u64;
    regs.x19_x28[0] = entry as *const () as usize as u64; // x19
    regs.x19_x28[1] = arg as u64; // x20
}

/// First code run by a fresh context: `x19(x20)`
#[unsafe(naked)]
pub unsafe extern "C" fn green_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        // entry never returns
        "brk #1",
    );
}

/// Save the current context into `old` and resume `new`
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save into old (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "str x30, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "str x29, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldr x30, [x1, #0x08]",
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldr x29, [x1, #0x60]",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "br x30",
    );
}

/// Resume `new` without saving the current context
#[unsafe(naked)]
pub unsafe extern "C" fn context_jump(_new: *const SavedRegs) -> ! {
    naked_asm!(
        "ldr x9, [x0, #0x00]",
        "mov sp, x9",
        "ldr x30, [x0, #0x08]",
        "ldp x19, x20, [x0, #0x10]",
        "ldp x21, x22, [x0, #0x20]",
        "ldp x23, x24, [x0, #0x30]",
        "ldp x25, x26, [x0, #0x40]",
        "ldp x27, x28, [x0, #0x50]",
        "ldr x29, [x0, #0x60]",
        "ldp d8, d9, [x0, #0x68]",
        "ldp d10, d11, [x0, #0x78]",
        "ldp d12, d13, [x0, #0x88]",
        "ldp d14, d15, [x0, #0x98]",
        "br x30",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout_matches_asm_offsets() {
        assert_eq!(offset_of!(SavedRegs, lr), 0x08);
        assert_eq!(offset_of!(SavedRegs, x19_x28), 0x10);
        assert_eq!(offset_of!(SavedRegs, fp), 0x60);
        assert_eq!(offset_of!(SavedRegs, d8_d15), 0x68);
        assert_eq!(size_of::<SavedRegs>(), 0xa8);
    }

    extern "C" fn parked(_arg: usize) -> ! {
        loop {
            std::hint::spin_loop();
        }
    }

    #[test]
    fn test_fresh_context_enters_trampoline() {
        let stack = crate::memory::Stack::new(64 * 1024).unwrap();
        let mut regs = SavedRegs::default();
        unsafe {
            init_context(&mut regs, stack.top(), parked, 7);
        }
        assert_eq!(regs.lr, green_trampoline as *const () as usize as u64);
        assert_eq!(regs.x19_x28[0], parked as *const () as usize as u64);
        assert_eq!(regs.x19_x28[1], 7);
    }
}
