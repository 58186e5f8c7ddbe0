//! Output collaborator.
//!
//! The CPU hands printed values to an [`Output`] and knows nothing about how
//! they are rendered.

use std::io::Write;

/// Receives whatever the print instructions emit.
pub trait Output {
    /// PRN: a register interpreted as a signed byte.
    fn number(&mut self, value: i8);

    /// PRA: a register interpreted as an ASCII character.
    fn character(&mut self, c: char);

    /// PRM: a run of memory interpreted as ASCII.
    fn text(&mut self, s: &str);
}

/// Prints each emission on its own line of stdout.
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl StdoutOutput {
    pub fn new() -> Self {
        Self
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", args).and_then(|_| out.flush()) {
            tracing::warn!("failed to write program output: {}", e);
        }
    }
}

impl Output for StdoutOutput {
    fn number(&mut self, value: i8) {
        self.line(format_args!("{}", value));
    }

    fn character(&mut self, c: char) {
        self.line(format_args!("{}", c));
    }

    fn text(&mut self, s: &str) {
        self.line(format_args!("{}", s));
    }
}

/// One thing a print instruction emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Printed {
    Number(i8),
    Char(char),
    Text(String),
}

impl std::fmt::Display for Printed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Printed::Number(n) => write!(f, "{}", n),
            Printed::Char(c) => write!(f, "{}", c),
            Printed::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Keeps everything in memory, for tests and the debugger.
#[derive(Debug, Default, Clone)]
pub struct CaptureOutput {
    pub printed: Vec<Printed>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just the PRN values, in order.
    pub fn numbers(&self) -> Vec<i8> {
        self.printed
            .iter()
            .filter_map(|p| match p {
                Printed::Number(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Each emission rendered as a line.
    pub fn lines(&self) -> Vec<String> {
        self.printed.iter().map(|p| p.to_string()).collect()
    }

    pub fn clear(&mut self) {
        self.printed.clear();
    }
}

impl Output for CaptureOutput {
    fn number(&mut self, value: i8) {
        self.printed.push(Printed::Number(value));
    }

    fn character(&mut self, c: char) {
        self.printed.push(Printed::Char(c));
    }

    fn text(&mut self, s: &str) {
        self.printed.push(Printed::Text(s.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_numbers() {
        let mut out = CaptureOutput::new();
        out.number(8);
        out.character('A');
        out.number(-8);
        out.text("hi");

        assert_eq!(out.numbers(), vec![8, -8]);
        assert_eq!(out.lines(), vec!["8", "A", "-8", "hi"]);
    }
}
