//! Instruction decoder for the LS-8.
//!
//! Every opcode byte has the layout `AABCDDDD`:
//! - `AA`: number of operand bytes that follow (0-2)
//! - `B`: set for ALU operations
//! - `C`: set when the instruction writes PC itself
//! - `DDDD`: instruction identifier
//!
//! PRM is the one exception: its `AA` bits say one operand, but it carries a
//! second register byte that the PC skips as well.
//!
//! Decoding is total over the fetched bytes: an instruction is fully decoded
//! and validated before the CPU mutates anything.

use crate::cpu::alu::AluOp;
use crate::cpu::registers::NUM_REGISTERS;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Raw opcode bytes.
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const HLT: u8 = 0x01;
    pub const RET: u8 = 0x11;
    pub const IRET: u8 = 0x13;
    pub const PUSH: u8 = 0x45;
    pub const POP: u8 = 0x46;
    pub const PRN: u8 = 0x47;
    pub const PRA: u8 = 0x48;
    pub const PRM: u8 = 0x49;
    pub const CALL: u8 = 0x50;
    pub const INT: u8 = 0x52;
    pub const JMP: u8 = 0x54;
    pub const JEQ: u8 = 0x55;
    pub const JNE: u8 = 0x56;
    pub const JGT: u8 = 0x57;
    pub const JLT: u8 = 0x58;
    pub const JLE: u8 = 0x59;
    pub const JGE: u8 = 0x5A;
    pub const INC: u8 = 0x65;
    pub const DEC: u8 = 0x66;
    pub const NOT: u8 = 0x69;
    pub const LDI: u8 = 0x82;
    pub const LD: u8 = 0x83;
    pub const ST: u8 = 0x84;
    pub const ADD: u8 = 0xA0;
    pub const SUB: u8 = 0xA1;
    pub const MUL: u8 = 0xA2;
    pub const DIV: u8 = 0xA3;
    pub const MOD: u8 = 0xA4;
    pub const ADDI: u8 = 0xA6;
    pub const CMP: u8 = 0xA7;
    pub const AND: u8 = 0xA8;
    pub const OR: u8 = 0xAA;
    pub const XOR: u8 = 0xAB;
    pub const SHL: u8 = 0xAC;
    pub const SHR: u8 = 0xAD;

    /// Operand count encoded in the top two bits.
    pub const fn operand_count(op: u8) -> u8 {
        op >> 6
    }

    /// Encoded length in bytes, opcode included.
    pub const fn instruction_len(op: u8) -> u8 {
        match op {
            PRM => 3,
            _ => 1 + operand_count(op),
        }
    }
}

/// Branch condition for the conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Equal,
    NotEqual,
    Greater,
    Less,
    LessOrEqual,
    GreaterOrEqual,
}

/// Decoded LS-8 instruction.
///
/// Register operands are already validated to be in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Machine ====================

    /// No operation
    Nop,

    /// Halt execution
    Hlt,

    // ==================== Data ====================

    /// R[reg] := imm
    Ldi { reg: u8, imm: u8 },

    /// R[dst] := mem[R[addr]]
    Ld { dst: u8, addr: u8 },

    /// mem[R[addr]] := R[src]
    St { addr: u8, src: u8 },

    // ==================== ALU ====================

    /// Arithmetic/logic on registers. `b` is zero for unary operations.
    Alu { op: AluOp, a: u8, b: u8 },

    /// R[reg] := R[reg] + imm
    Addi { reg: u8, imm: u8 },

    // ==================== Stack ====================

    Push { reg: u8 },
    Pop { reg: u8 },

    // ==================== Control Flow ====================

    /// Push return address, PC := R[reg]
    Call { reg: u8 },

    /// PC := pop
    Ret,

    /// PC := R[reg] when `cond` holds
    Jump { cond: Condition, reg: u8 },

    /// Raise the interrupt line held in R[reg]
    Int { reg: u8 },

    /// Return from interrupt handler
    Iret,

    // ==================== Output ====================

    /// Print R[reg] as a signed integer
    Prn { reg: u8 },

    /// Print R[reg] as an ASCII character
    Pra { reg: u8 },

    /// Print mem[R[start]..=R[end]] as ASCII
    Prm { start: u8, end: u8 },
}

impl Instruction {
    /// The opcode byte this instruction encodes to.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Nop => opcode::NOP,
            Instruction::Hlt => opcode::HLT,
            Instruction::Ldi { .. } => opcode::LDI,
            Instruction::Ld { .. } => opcode::LD,
            Instruction::St { .. } => opcode::ST,
            Instruction::Alu { op, .. } => op.opcode(),
            Instruction::Addi { .. } => opcode::ADDI,
            Instruction::Push { .. } => opcode::PUSH,
            Instruction::Pop { .. } => opcode::POP,
            Instruction::Call { .. } => opcode::CALL,
            Instruction::Ret => opcode::RET,
            Instruction::Jump { cond, .. } => match cond {
                Condition::Always => opcode::JMP,
                Condition::Equal => opcode::JEQ,
                Condition::NotEqual => opcode::JNE,
                Condition::Greater => opcode::JGT,
                Condition::Less => opcode::JLT,
                Condition::LessOrEqual => opcode::JLE,
                Condition::GreaterOrEqual => opcode::JGE,
            },
            Instruction::Int { .. } => opcode::INT,
            Instruction::Iret => opcode::IRET,
            Instruction::Prn { .. } => opcode::PRN,
            Instruction::Pra { .. } => opcode::PRA,
            Instruction::Prm { .. } => opcode::PRM,
        }
    }

    /// Encoded length in bytes, opcode included.
    pub fn len(&self) -> u8 {
        opcode::instruction_len(self.opcode())
    }
}

fn reg(byte: u8) -> Result<u8, DecodeError> {
    if (byte as usize) < NUM_REGISTERS {
        Ok(byte)
    } else {
        Err(DecodeError::InvalidRegister(byte))
    }
}

/// Decode the instruction starting at `bytes[0]`.
///
/// `bytes` holds the opcode followed by the next two memory cells; operands
/// beyond the opcode's declared count are ignored.
pub fn decode(bytes: [u8; 3]) -> Result<Instruction, DecodeError> {
    use opcode::*;

    let [op, a, b] = bytes;
    let alu = |op: AluOp, a: u8, b: u8| -> Result<Instruction, DecodeError> {
        Ok(Instruction::Alu { op, a: reg(a)?, b: reg(b)? })
    };
    let jump = |cond: Condition| -> Result<Instruction, DecodeError> {
        Ok(Instruction::Jump { cond, reg: reg(a)? })
    };

    match op {
        NOP => Ok(Instruction::Nop),
        HLT => Ok(Instruction::Hlt),
        RET => Ok(Instruction::Ret),
        IRET => Ok(Instruction::Iret),
        PUSH => Ok(Instruction::Push { reg: reg(a)? }),
        POP => Ok(Instruction::Pop { reg: reg(a)? }),
        PRN => Ok(Instruction::Prn { reg: reg(a)? }),
        PRA => Ok(Instruction::Pra { reg: reg(a)? }),
        PRM => Ok(Instruction::Prm { start: reg(a)?, end: reg(b)? }),
        CALL => Ok(Instruction::Call { reg: reg(a)? }),
        INT => Ok(Instruction::Int { reg: reg(a)? }),
        JMP => jump(Condition::Always),
        JEQ => jump(Condition::Equal),
        JNE => jump(Condition::NotEqual),
        JGT => jump(Condition::Greater),
        JLT => jump(Condition::Less),
        JLE => jump(Condition::LessOrEqual),
        JGE => jump(Condition::GreaterOrEqual),
        INC => alu(AluOp::Inc, a, 0),
        DEC => alu(AluOp::Dec, a, 0),
        NOT => alu(AluOp::Not, a, 0),
        LDI => Ok(Instruction::Ldi { reg: reg(a)?, imm: b }),
        LD => Ok(Instruction::Ld { dst: reg(a)?, addr: reg(b)? }),
        ST => Ok(Instruction::St { addr: reg(a)?, src: reg(b)? }),
        ADD => alu(AluOp::Add, a, b),
        SUB => alu(AluOp::Sub, a, b),
        MUL => alu(AluOp::Mul, a, b),
        DIV => alu(AluOp::Div, a, b),
        MOD => alu(AluOp::Mod, a, b),
        ADDI => Ok(Instruction::Addi { reg: reg(a)?, imm: b }),
        CMP => alu(AluOp::Cmp, a, b),
        AND => alu(AluOp::And, a, b),
        OR => alu(AluOp::Or, a, b),
        XOR => alu(AluOp::Xor, a, b),
        SHL => alu(AluOp::Shl, a, b),
        SHR => alu(AluOp::Shr, a, b),
        _ => Err(DecodeError::InvalidOpcode(op)),
    }
}

/// Encode an instruction back to bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let op = instr.opcode();
    let operands: [u8; 2] = match *instr {
        Instruction::Nop | Instruction::Hlt | Instruction::Ret | Instruction::Iret => [0, 0],
        Instruction::Ldi { reg, imm } => [reg, imm],
        Instruction::Ld { dst, addr } => [dst, addr],
        Instruction::St { addr, src } => [addr, src],
        Instruction::Alu { a, b, .. } => [a, b],
        Instruction::Addi { reg, imm } => [reg, imm],
        Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg }
        | Instruction::Jump { reg, .. }
        | Instruction::Int { reg }
        | Instruction::Prn { reg }
        | Instruction::Pra { reg } => [reg, 0],
        Instruction::Prm { start, end } => [start, end],
    };

    let mut bytes = vec![op];
    bytes.extend_from_slice(&operands[..opcode::instruction_len(op) as usize - 1]);
    bytes
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("invalid register operand: {0}")]
    InvalidRegister(u8),
}
