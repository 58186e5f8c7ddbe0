//! # LS-8 Emulator
//!
//! An emulator of the LS-8, a small 8-bit microcomputer: eight registers,
//! 256 bytes of memory, a hardware stack, an ALU and an interrupt controller
//! fed by a periodic timer and a memory-mapped keyboard.

pub mod cpu;
pub mod devices;
pub mod program;
pub mod config;
pub mod machine;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Instruction};
pub use devices::{Output, KeySource, Timer};
pub use program::{load_program, parse_ls8, disassemble, LoadError, ProgramImage};
pub use config::{EmulatorConfig, ConfigError};
pub use machine::{Machine, RunSummary};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
