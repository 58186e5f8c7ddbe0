//! LS-8 memory subsystem.
//!
//! 256 byte cells addressed by a single byte. The top of the address space is
//! reserved: the interrupt vector table lives at `0xF8..=0xFF`, the keyboard
//! device latches the last key pressed at `0xF4`, and the stack grows down
//! from `0xF3`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory cells in the LS-8.
pub const MEMORY_SIZE: usize = 256;

/// First entry of the interrupt vector table (`I0`).
pub const IVT_BASE: u8 = 0xF8;

/// Last key pressed, written by the keyboard device only.
pub const KEY_ADDR: u8 = 0xF4;

/// Initial stack pointer. An empty stack has `SP == STACK_TOP`.
pub const STACK_TOP: u8 = 0xF3;

/// Largest program image: everything below the stack's initial slot.
pub const MAX_IMAGE_SIZE: usize = STACK_TOP as usize;

/// LS-8 memory: 256 byte cells.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell. Addresses wrap modulo 256, which a `u8` does for free.
    #[inline]
    pub fn read(&self, addr: u8) -> u8 {
        self.cells[addr as usize]
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: u8, value: u8) {
        self.cells[addr as usize] = value;
    }

    /// Read with an arbitrary offset from `addr`, wrapping past `0xFF`.
    #[inline]
    pub fn read_offset(&self, addr: u8, offset: u8) -> u8 {
        self.read(addr.wrapping_add(offset))
    }

    /// Handler address for interrupt line `line` (0-7).
    pub fn vector(&self, line: u8) -> u8 {
        self.read(IVT_BASE.wrapping_add(line & 0b111))
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = 0);
    }

    /// Copy a program image into memory starting at address 0.
    ///
    /// The image must leave the stack's initial slot and everything above it
    /// untouched.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        if program.len() > MAX_IMAGE_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MAX_IMAGE_SIZE,
            });
        }

        self.cells[..program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: u8, count: usize) -> Vec<(u8, u8)> {
        let end = (start as usize + count).min(MEMORY_SIZE);
        (start as usize..end)
            .map(|i| (i as u8, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|cell| **cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program is too large to fit below the stack.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 42);
        assert_eq!(mem.read(10), 42);
    }

    #[test]
    fn test_memory_offset_wraps() {
        let mut mem = Memory::new();
        mem.write(0x01, 7);
        assert_eq!(mem.read_offset(0xFF, 2), 7);
    }

    #[test]
    fn test_vector_table() {
        let mut mem = Memory::new();
        mem.write(0xF8, 0x40);
        mem.write(0xFA, 0x60);
        assert_eq!(mem.vector(0), 0x40);
        assert_eq!(mem.vector(2), 0x60);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load_program(&[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0), 1);
        assert_eq!(mem.read(1), 2);
        assert_eq!(mem.read(2), 3);
        assert_eq!(mem.read(3), 0);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();
        let image = vec![0u8; MAX_IMAGE_SIZE + 1];
        assert_eq!(
            mem.load_program(&image),
            Err(MemoryError::ProgramTooLarge { size: 244, available: 243 })
        );
    }
}
