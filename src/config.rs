//! Emulator configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default. Command line flags override whatever the file says.

use crate::cpu::interrupts::{KEYBOARD_LINE, NUM_LINES, TIMER_LINE};
use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    /// Timer period in milliseconds. Zero disables the timer.
    pub timer_period_ms: u64,
    /// Interrupt line raised by the keyboard.
    pub keyboard_line: u8,
    /// Pause after every instruction, in microseconds.
    pub cycle_delay_us: u64,
    /// Stop after this many instructions.
    pub max_cycles: Option<u64>,
    /// Print a trace line before every instruction.
    pub trace: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            timer_period_ms: 1000,
            keyboard_line: KEYBOARD_LINE,
            cycle_delay_us: 0,
            max_cycles: None,
            trace: false,
        }
    }
}

impl EmulatorConfig {
    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyboard_line >= NUM_LINES || self.keyboard_line == TIMER_LINE {
            return Err(ConfigError::InvalidKeyboardLine(self.keyboard_line));
        }
        Ok(())
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_micros(self.cycle_delay_us)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("keyboard line {0} must be 1-7 (line 0 belongs to the timer)")]
    InvalidKeyboardLine(u8),
}
