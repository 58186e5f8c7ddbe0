//! Program images.
//!
//! Two formats are accepted:
//! - `.ls8` text: one byte per line as 8 binary digits. `#` starts a
//!   comment, blank lines are ignored, and anything after the eighth digit
//!   is ignored too, so `10000010 # LDI R0,8` is a valid line.
//! - anything else: a raw binary image, loaded verbatim.

use std::path::Path;
use thiserror::Error;

/// A loaded program. Whether it fits is decided when it is copied into
/// memory, see [`Memory::load_program`](crate::cpu::Memory::load_program).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Bytes to place at address 0.
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse `.ls8` text.
pub fn parse_ls8(text: &str) -> Result<ProgramImage, LoadError> {
    let mut image = ProgramImage::default();

    for (line_num, line) in text.lines().enumerate() {
        let code = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let code = code.trim();

        // Skip empty lines and comments
        if code.is_empty() {
            continue;
        }

        let digits: String = code.chars().take(8).collect();
        if digits.len() != 8 || !digits.chars().all(|c| c == '0' || c == '1') {
            return Err(LoadError::Parse {
                line: line_num + 1,
                message: format!("expected 8 binary digits, found {:?}", code),
            });
        }

        let byte = u8::from_str_radix(&digits, 2).map_err(|e| LoadError::Parse {
            line: line_num + 1,
            message: e.to_string(),
        })?;

        image.bytes.push(byte);
    }

    Ok(image)
}

/// Load a program file from disk, picking the format by extension.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<ProgramImage, LoadError> {
    let path = path.as_ref();
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ls8"));

    if is_text {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Io(e.to_string()))?;
        parse_ls8(&text)
    } else {
        let bytes = std::fs::read(path).map_err(|e| LoadError::Io(e.to_string()))?;
        Ok(ProgramImage::from_bytes(bytes))
    }
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINT8: &str = "\
# print8.ls8: Print the number 8 on the screen

10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0
00000000
00000001 # HLT
";

    #[test]
    fn test_parse_print8() {
        let image = parse_ls8(PRINT8).unwrap();
        assert_eq!(image.bytes, vec![0x82, 0x00, 0x08, 0x47, 0x00, 0x01]);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_ls8("00000001\n0000002\n").unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_trailing_text_after_digits() {
        let image = parse_ls8("00000001HLT\n").unwrap();
        assert_eq!(image.bytes, vec![0x01]);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir();
        let text_path = dir.join(format!("ls8-test-{}.ls8", std::process::id()));
        let bin_path = dir.join(format!("ls8-test-{}.bin", std::process::id()));
        std::fs::write(&text_path, PRINT8).unwrap();
        std::fs::write(&bin_path, [0x82, 0x00, 0x08, 0x47, 0x00, 0x01]).unwrap();

        let from_text = load_program(&text_path).unwrap();
        let from_bin = load_program(&bin_path).unwrap();

        assert_eq!(from_text.bytes, from_bin.bytes);

        let _ = std::fs::remove_file(text_path);
        let _ = std::fs::remove_file(bin_path);
    }
}
