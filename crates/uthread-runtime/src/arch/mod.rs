//! Architecture-specific context switching
//!
//! Each backend provides the same four items:
//!
//! - `SavedRegs` - callee-saved register block of a suspended context
//! - `init_context` - prepare a fresh context that starts in the trampoline
//! - `context_switch` - save the current context, resume another
//! - `context_jump` - resume another context, abandoning the current one
//!
//! A fresh context enters `green_trampoline`, which calls
//! `entry(arg)`; `entry` must never return.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::*;
    }
}

/// Signature of the function a fresh context starts in
pub type EntryFn = extern "C" fn(usize) -> !;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Stack;
    use std::cell::Cell;

    thread_local! {
        static HOME: Cell<*mut SavedRegs> = const { Cell::new(std::ptr::null_mut()) };
        static AWAY: Cell<*mut SavedRegs> = const { Cell::new(std::ptr::null_mut()) };
        static TRACE: Cell<u32> = const { Cell::new(0) };
    }

    extern "C" fn bounce(arg: usize) -> ! {
        TRACE.with(|t| t.set(t.get() * 10 + arg as u32));
        unsafe {
            context_switch(AWAY.with(Cell::get), HOME.with(Cell::get));
        }
        TRACE.with(|t| t.set(t.get() * 10 + 2));
        unsafe { context_jump(HOME.with(Cell::get)) }
    }

    #[test]
    fn test_switch_into_fresh_context_and_back() {
        let stack = Stack::new(64 * 1024).unwrap();
        let mut home = Box::new(SavedRegs::default());
        let mut away = Box::new(SavedRegs::default());
        HOME.with(|c| c.set(&mut *home));
        AWAY.with(|c| c.set(&mut *away));
        TRACE.with(|t| t.set(0));

        unsafe {
            init_context(&mut away, stack.top(), bounce, 1);
            context_switch(&mut *home, &*away);
        }
        assert_eq!(TRACE.with(Cell::get), 1);

        // Resume the suspended context; it finishes by jumping back here.
        unsafe {
            context_switch(&mut *home, &*away);
        }
        assert_eq!(TRACE.with(Cell::get), 12);
    }

    #[test]
    fn test_fresh_context_stack_alignment() {
        let stack = Stack::new(64 * 1024).unwrap();
        let mut regs = SavedRegs::default();
        unsafe {
            init_context(&mut regs, stack.top(), bounce, 0);
        }
        assert_eq!(regs.stack_pointer() % 16, 0);
        assert!(regs.stack_pointer() <= stack.top() as usize);
    }
}
