//! Arithmetic logic unit.
//!
//! All arithmetic is 8-bit unsigned with wraparound. Registers stay raw
//! bytes; signed interpretation only happens when a value is printed.

use crate::cpu::decode::opcode;
use crate::cpu::registers::Flags;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Inc,
    Dec,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Cmp,
}

impl AluOp {
    pub const ALL: [AluOp; 14] = [
        AluOp::Add,
        AluOp::Sub,
        AluOp::Mul,
        AluOp::Div,
        AluOp::Mod,
        AluOp::Inc,
        AluOp::Dec,
        AluOp::And,
        AluOp::Or,
        AluOp::Xor,
        AluOp::Not,
        AluOp::Shl,
        AluOp::Shr,
        AluOp::Cmp,
    ];

    pub fn opcode(self) -> u8 {
        match self {
            AluOp::Add => opcode::ADD,
            AluOp::Sub => opcode::SUB,
            AluOp::Mul => opcode::MUL,
            AluOp::Div => opcode::DIV,
            AluOp::Mod => opcode::MOD,
            AluOp::Inc => opcode::INC,
            AluOp::Dec => opcode::DEC,
            AluOp::And => opcode::AND,
            AluOp::Or => opcode::OR,
            AluOp::Xor => opcode::XOR,
            AluOp::Not => opcode::NOT,
            AluOp::Shl => opcode::SHL,
            AluOp::Shr => opcode::SHR,
            AluOp::Cmp => opcode::CMP,
        }
    }

    /// True for operations on a single register.
    pub fn is_unary(self) -> bool {
        matches!(self, AluOp::Inc | AluOp::Dec | AluOp::Not)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
            AluOp::Mod => "MOD",
            AluOp::Inc => "INC",
            AluOp::Dec => "DEC",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Not => "NOT",
            AluOp::Shl => "SHL",
            AluOp::Shr => "SHR",
            AluOp::Cmp => "CMP",
        }
    }
}

/// What an ALU operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOutput {
    /// New value for the destination register.
    Value(u8),
    /// New flags; registers are untouched.
    Flags(Flags),
}

/// Compute `op` on `a` (destination) and `b` (source).
///
/// Unary operations ignore `b`.
pub fn compute(op: AluOp, a: u8, b: u8) -> Result<AluOutput, AluError> {
    let value = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div => a.checked_div(b).ok_or(AluError::DivisionByZero)?,
        AluOp::Mod => a.checked_rem(b).ok_or(AluError::DivisionByZero)?,
        AluOp::Inc => a.wrapping_add(1),
        AluOp::Dec => a.wrapping_sub(1),
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
        // Shifting by 8 or more clears the register.
        AluOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        AluOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
        AluOp::Cmp => return Ok(AluOutput::Flags(compare(a, b))),
    };
    Ok(AluOutput::Value(value))
}

/// Unsigned comparison producing exactly one of L, G, E.
pub fn compare(a: u8, b: u8) -> Flags {
    use std::cmp::Ordering;

    Flags::from_bits(match a.cmp(&b) {
        Ordering::Less => Flags::LESS,
        Ordering::Greater => Flags::GREATER,
        Ordering::Equal => Flags::EQUAL,
    })
}

/// ALU faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("division by zero")]
    DivisionByZero,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value(op: AluOp, a: u8, b: u8) -> u8 {
        match compute(op, a, b).unwrap() {
            AluOutput::Value(v) => v,
            AluOutput::Flags(_) => panic!("{:?} produced flags", op),
        }
    }

    #[test]
    fn test_opcodes_are_alu_class() {
        for op in AluOp::ALL {
            assert_ne!(op.opcode() & 0b0010_0000, 0, "{}", op.mnemonic());
            let operands = if op.is_unary() { 1 } else { 2 };
            assert_eq!(opcode::operand_count(op.opcode()), operands);
        }
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(value(AluOp::Add, 200, 100), 44);
        assert_eq!(value(AluOp::Sub, 3, 5), 254);
        assert_eq!(value(AluOp::Mul, 16, 17), 16);
        assert_eq!(value(AluOp::Inc, 255, 0), 0);
        assert_eq!(value(AluOp::Dec, 0, 0), 255);
    }

    #[test]
    fn test_not_displays_negative() {
        let not7 = value(AluOp::Not, 7, 0);
        assert_eq!(not7, 248);
        assert_eq!(not7 as i8, -8);
        assert_eq!(value(AluOp::Not, not7, 0), 7);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(value(AluOp::Shl, 2, 2), 8);
        assert_eq!(value(AluOp::Shr, 8, 2), 2);
        assert_eq!(value(AluOp::Shl, 0x81, 1), 0x02);
        assert_eq!(value(AluOp::Shl, 0xFF, 8), 0);
        assert_eq!(value(AluOp::Shr, 0xFF, 200), 0);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(compute(AluOp::Div, 9, 0), Err(AluError::DivisionByZero));
        assert_eq!(compute(AluOp::Mod, 9, 0), Err(AluError::DivisionByZero));
        assert_eq!(value(AluOp::Div, 30, 5), 6);
        assert_eq!(value(AluOp::Mod, 6, 5), 1);
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(1, 2), Flags::from_bits(Flags::LESS));
        assert_eq!(compare(2, 1), Flags::from_bits(Flags::GREATER));
        assert_eq!(compare(2, 2), Flags::from_bits(Flags::EQUAL));
        // Unsigned: 0xFF is greater than 1 even though it prints as -1.
        assert!(compare(0xFF, 1).greater());
    }

    proptest! {
        #[test]
        fn add_is_mod_256(a: u8, b: u8) {
            prop_assert_eq!(value(AluOp::Add, a, b) as u32, (a as u32 + b as u32) % 256);
        }

        #[test]
        fn sub_is_mod_256(a: u8, b: u8) {
            prop_assert_eq!(value(AluOp::Sub, a, b) as i32, (a as i32 - b as i32).rem_euclid(256));
        }

        #[test]
        fn not_is_255_minus(a: u8) {
            prop_assert_eq!(value(AluOp::Not, a, 0), 255 - a);
        }

        #[test]
        fn cmp_sets_exactly_one_flag(a: u8, b: u8) {
            let fl = compare(a, b);
            prop_assert_eq!(fl.bits().count_ones(), 1);
        }
    }
}
