//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - R0-R7: 8-bit general purpose registers
//! - PC: 8-bit program counter
//! - IR: the opcode byte currently executing
//! - FL: flags set by CMP, laid out as `0b00000LGE`
//!
//! By convention R5 holds the interrupt mask and R7 the stack pointer.

use crate::cpu::memory::STACK_TOP;
use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// Interrupt mask register index.
pub const IM: u8 = 5;

/// Stack pointer register index.
pub const SP: u8 = 7;

/// The flags register.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// Equal
    pub const EQUAL: u8 = 0b0000_0001;
    /// Greater than
    pub const GREATER: u8 = 0b0000_0010;
    /// Less than
    pub const LESS: u8 = 0b0000_0100;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Rebuild from a raw byte, e.g. one popped off the stack.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn equal(self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    pub fn greater(self) -> bool {
        self.0 & Self::GREATER != 0
    }

    pub fn less(self) -> bool {
        self.0 & Self::LESS != 0
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bit = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "FL={}{}{}",
            bit(self.less(), 'L'),
            bit(self.greater(), 'G'),
            bit(self.equal(), 'E')
        )
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub gpr: [u8; NUM_REGISTERS],

    /// Address of the next instruction to fetch
    pub pc: u8,

    /// Opcode of the instruction being executed
    pub ir: u8,

    /// Comparison flags
    pub fl: Flags,
}

impl Registers {
    /// Create a register file in its power-on state.
    pub fn new() -> Self {
        let mut gpr = [0; NUM_REGISTERS];
        gpr[SP as usize] = STACK_TOP;
        Self {
            gpr,
            pc: 0,
            ir: 0,
            fl: Flags::empty(),
        }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read general purpose register `r` (0-7).
    #[inline]
    pub fn get(&self, r: u8) -> u8 {
        self.gpr[r as usize]
    }

    /// Write general purpose register `r` (0-7).
    #[inline]
    pub fn set(&mut self, r: u8, value: u8) {
        self.gpr[r as usize] = value;
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.get(SP)
    }

    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.set(SP, value);
    }

    /// Current interrupt mask.
    #[inline]
    pub fn interrupt_mask(&self) -> u8 {
        self.get(IM)
    }

    /// Signed view of a register, as PRN prints it.
    pub fn signed(&self, r: u8) -> i8 {
        self.get(r) as i8
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();
        assert_eq!(regs.gpr, [0, 0, 0, 0, 0, 0, 0, 0xF3]);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.fl, Flags::empty());
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set(0, 9);
        regs.pc = 0x20;
        regs.fl = Flags::from_bits(Flags::LESS);
        regs.reset();
        assert_eq!(regs, Registers::new());
    }

    #[test]
    fn test_signed_view() {
        let mut regs = Registers::new();
        regs.set(0, 248);
        regs.set(1, 127);
        assert_eq!(regs.signed(0), -8);
        assert_eq!(regs.signed(1), 127);
    }

    #[test]
    fn test_flags_debug() {
        let fl = Flags::from_bits(Flags::LESS | Flags::EQUAL);
        assert_eq!(format!("{:?}", fl), "FL=L-E");
    }
}
