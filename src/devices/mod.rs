//! Devices wired to the CPU: the periodic timer, the keyboard and the output
//! sink used by the print instructions.

pub mod timer;
pub mod keyboard;
pub mod output;

pub use timer::Timer;
pub use keyboard::{KeySource, NoKeys, ScriptedKeys, StdinKeys};
pub use output::{CaptureOutput, Output, Printed, StdoutOutput};
