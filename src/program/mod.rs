//! Program images and their disassembly.
//!
//! This module provides:
//! - loading of `.ls8` text and raw binary images
//! - a disassembler (bytes → readable text)

pub mod image;
pub mod disasm;

pub use image::{load_program, parse_ls8, LoadError, ProgramImage};
pub use disasm::{disassemble, disassemble_at, disassemble_instruction};
