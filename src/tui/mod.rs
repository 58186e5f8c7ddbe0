//! TUI debugger for the LS-8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, flag and interrupt state
//! - Memory hex view with PC/SP highlighting
//! - Step/run/breakpoint controls
//! - Disassembly view and captured program output
//! - An input mode that types into the emulated keyboard

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
