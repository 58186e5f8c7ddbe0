//! Stack discipline.
//!
//! The stack grows down from [`STACK_TOP`] using R7 as the stack pointer.
//! `push` pre-decrements, `pop` post-increments. The stack may use every cell
//! between the end of the loaded program and `STACK_TOP`; crossing either
//! bound faults instead of wrapping into program memory or the device region.

use crate::cpu::memory::STACK_TOP;
use crate::cpu::registers::{Flags, SP};
use crate::cpu::{Cpu, CpuError};

/// One slot of saved interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pc,
    Flags,
    Reg(u8),
}

/// Interrupt entry pushes these front to back, IRET pops them back to front.
const CONTEXT: [Slot; 10] = [
    Slot::Pc,
    Slot::Flags,
    Slot::Reg(0),
    Slot::Reg(1),
    Slot::Reg(2),
    Slot::Reg(3),
    Slot::Reg(4),
    Slot::Reg(5),
    Slot::Reg(6),
    Slot::Reg(SP),
];

/// Bytes pushed on interrupt entry.
pub const CONTEXT_SIZE: usize = CONTEXT.len();

impl Cpu {
    /// Free cells between the program and the stack pointer. Zero when SP
    /// points above [`STACK_TOP`] into the device region.
    pub fn stack_room(&self) -> usize {
        let sp = self.regs.sp();
        if sp > STACK_TOP {
            return 0;
        }
        (sp as usize).saturating_sub(self.program_end as usize)
    }

    /// Bytes currently on the stack.
    pub fn stack_depth(&self) -> usize {
        (STACK_TOP as usize).saturating_sub(self.regs.sp() as usize)
    }

    /// Push a byte.
    pub fn push(&mut self, value: u8) -> Result<(), CpuError> {
        if self.stack_room() == 0 {
            return Err(CpuError::StackOverflow { sp: self.regs.sp() });
        }
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        self.mem.write(sp, value);
        Ok(())
    }

    /// Pop a byte.
    pub fn pop(&mut self) -> Result<u8, CpuError> {
        if self.stack_depth() == 0 {
            return Err(CpuError::StackUnderflow { sp: self.regs.sp() });
        }
        let sp = self.regs.sp();
        let value = self.mem.read(sp);
        self.regs.set_sp(sp.wrapping_add(1));
        Ok(value)
    }

    /// Push PC, FL and R0-R7. Checks for room first so a fault leaves the
    /// machine untouched.
    pub(crate) fn save_context(&mut self) -> Result<(), CpuError> {
        if self.stack_room() < CONTEXT_SIZE {
            return Err(CpuError::StackOverflow { sp: self.regs.sp() });
        }
        for slot in CONTEXT {
            let value = match slot {
                Slot::Pc => self.regs.pc,
                Slot::Flags => self.regs.fl.bits(),
                Slot::Reg(r) => self.regs.get(r),
            };
            self.push(value)?;
        }
        Ok(())
    }

    /// Exact reverse of [`Cpu::save_context`].
    pub(crate) fn restore_context(&mut self) -> Result<(), CpuError> {
        if self.stack_depth() < CONTEXT_SIZE {
            return Err(CpuError::StackUnderflow { sp: self.regs.sp() });
        }
        for slot in CONTEXT.iter().rev() {
            let value = self.pop()?;
            match *slot {
                Slot::Pc => self.regs.pc = value,
                Slot::Flags => self.regs.fl = Flags::from_bits(value),
                // The saved SP equals the SP right after popping it, so
                // restoring R7 does not disturb the remaining pops.
                Slot::Reg(r) => self.regs.set(r, value),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::memory::{IVT_BASE, KEY_ADDR};
    use proptest::prelude::*;

    #[test]
    fn test_push_pop() {
        let mut cpu = Cpu::new();
        cpu.push(42).unwrap();
        assert_eq!(cpu.regs.sp(), 0xF2);
        assert_eq!(cpu.mem.read(0xF2), 42);
        assert_eq!(cpu.pop().unwrap(), 42);
        assert_eq!(cpu.regs.sp(), 0xF3);
    }

    #[test]
    fn test_underflow() {
        let mut cpu = Cpu::new();
        assert_eq!(cpu.pop(), Err(CpuError::StackUnderflow { sp: 0xF3 }));
        assert_eq!(cpu.regs.sp(), 0xF3);
    }

    #[test]
    fn test_overflow_into_program() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0u8; 0xF0]).unwrap();
        for i in 0..3 {
            cpu.push(i).unwrap();
        }
        assert_eq!(cpu.push(9), Err(CpuError::StackOverflow { sp: 0xF0 }));
        assert_eq!(cpu.mem.read(0xEF), 0);
    }

    #[test]
    fn test_push_above_stack_top_faults() {
        let mut cpu = Cpu::new();
        cpu.regs.set_sp(0xF5);
        assert_eq!(cpu.push(0x41), Err(CpuError::StackOverflow { sp: 0xF5 }));
        assert_eq!(cpu.mem.read(KEY_ADDR), 0);
        assert_eq!(cpu.regs.sp(), 0xF5);

        cpu.regs.set_sp(0xFA);
        assert_eq!(cpu.save_context(), Err(CpuError::StackOverflow { sp: 0xFA }));
        assert!((IVT_BASE..=0xFF).all(|addr| cpu.mem.read(addr) == 0));
    }

    #[test]
    fn test_context_round_trip() {
        let mut cpu = Cpu::new();
        cpu.regs.gpr = [1, 2, 3, 4, 5, 6, 7, 0xF3];
        cpu.regs.pc = 0x42;
        cpu.regs.fl = Flags::from_bits(Flags::GREATER);
        let before = cpu.regs.clone();

        cpu.save_context().unwrap();
        assert_eq!(cpu.stack_depth(), CONTEXT_SIZE);

        // Handler scribbles over everything except the stack pointer.
        cpu.regs.gpr[..7].copy_from_slice(&[0xAA; 7]);
        cpu.regs.pc = 0x99;
        cpu.regs.fl = Flags::from_bits(Flags::EQUAL);

        cpu.restore_context().unwrap();
        assert_eq!(cpu.regs.gpr, before.gpr);
        assert_eq!(cpu.regs.pc, before.pc);
        assert_eq!(cpu.regs.fl, before.fl);
    }

    #[test]
    fn test_context_needs_room() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0u8; 0xEA]).unwrap();
        let sp = cpu.regs.sp();
        assert_eq!(cpu.save_context(), Err(CpuError::StackOverflow { sp }));
        assert_eq!(cpu.regs.sp(), sp);
    }

    proptest! {
        #[test]
        fn push_then_pop_restores(values in proptest::collection::vec(any::<u8>(), 0..64), x: u8) {
            let mut cpu = Cpu::new();
            for v in &values {
                cpu.push(*v).unwrap();
            }
            let sp = cpu.regs.sp();
            cpu.push(x).unwrap();
            prop_assert_eq!(cpu.pop().unwrap(), x);
            prop_assert_eq!(cpu.regs.sp(), sp);
        }
    }
}
