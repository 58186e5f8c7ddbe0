//! Interrupt controller.
//!
//! Eight lines `I0..I7`. The status register (IS) holds one pending bit per
//! line; the mask (IM) lives in R5 and is written by the running program.
//! Pending is a bit, not a counter: raising an already pending line is a
//! no-op.

use serde::{Serialize, Deserialize};

/// Number of interrupt lines.
pub const NUM_LINES: u8 = 8;

/// Line raised by the periodic timer.
pub const TIMER_LINE: u8 = 0;

/// Line raised by the keyboard by default.
pub const KEYBOARD_LINE: u8 = 1;

/// Controller state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptState {
    /// Nothing pending, no handler running.
    Idle,
    /// At least one line pending, no handler running.
    Pending,
    /// A handler is running; pending lines wait for IRET.
    Servicing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptController {
    /// IS: one pending bit per line.
    status: u8,
    /// Set between dispatch and IRET.
    servicing: bool,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Mark `line` pending. Returns false if it already was.
    pub fn raise(&mut self, line: u8) -> bool {
        let bit = 1 << (line & 0b111);
        let fresh = self.status & bit == 0;
        self.status |= bit;
        fresh
    }

    /// Raw IS register.
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn is_pending(&self, line: u8) -> bool {
        self.status & (1 << (line & 0b111)) != 0
    }

    pub fn is_servicing(&self) -> bool {
        self.servicing
    }

    pub fn state(&self) -> InterruptState {
        if self.servicing {
            InterruptState::Servicing
        } else if self.status != 0 {
            InterruptState::Pending
        } else {
            InterruptState::Idle
        }
    }

    /// The line to service next under `mask`: the lowest numbered line that
    /// is both pending and unmasked, unless a handler is already running.
    pub fn next_line(&self, mask: u8) -> Option<u8> {
        if self.servicing {
            return None;
        }
        let active = self.status & mask;
        if active == 0 {
            None
        } else {
            Some(active.trailing_zeros() as u8)
        }
    }

    /// Enter the handler for `line`: clear its pending bit and block further
    /// dispatch.
    pub fn begin(&mut self, line: u8) {
        self.status &= !(1 << (line & 0b111));
        self.servicing = true;
    }

    /// Leave the current handler.
    pub fn finish(&mut self) {
        self.servicing = false;
    }
}
