//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 byte cells of memory with a reserved high region
//! - 8 general purpose registers, PC, IR and FL
//! - an ALU over 8-bit wraparound arithmetic
//! - a downward growing hardware stack
//! - 8 interrupt lines dispatched through a vector table

pub mod memory;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod interrupts;
pub mod stack;
pub mod execute;

pub use memory::Memory;
pub use registers::{Flags, Registers};
pub use alu::AluOp;
pub use decode::{Instruction, Condition, DecodeError};
pub use interrupts::{InterruptController, InterruptState};
pub use execute::{Cpu, CpuError, CpuState};
