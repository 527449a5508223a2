//! Line framing and grammar validation
//!
//! Lines are newline-terminated. Surrounding whitespace (including a trailing
//! `\r`) is trimmed before validation. A valid line is a command token followed
//! by zero or more `|`-separated data tokens, each made of ASCII word characters.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Maximum buffered line length before the partial line is discarded
const MAX_LINE_LEN: usize = 1024;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?-u:\w)+(\|(?-u:\w)+)*$").expect("line pattern is a valid regex")
});

/// Check whether a line matches the wire grammar (after trimming)
pub fn is_valid_line(line: &str) -> bool {
    LINE_PATTERN.is_match(line.trim())
}

/// Streaming newline codec
///
/// Bytes arrive in arbitrary chunks from the transport; the codec buffers
/// them and hands out one trimmed line at a time.
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(128),
        }
    }

    /// Push raw bytes into the codec buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // A controller spewing garbage without newlines must not grow us forever
        if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&b'\n') {
            trace!("Discarding {} bytes without a line terminator", self.buffer.len());
            self.buffer.clear();
        }
    }

    /// Extract the next complete line, trimmed of surrounding whitespace
    ///
    /// Empty lines are returned as empty strings so callers can count them.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Whether a partial line is buffered
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_lines() {
        assert!(is_valid_line("Sliders|4095|2048"));
        assert!(is_valid_line("GetCurrentOutputDevice"));
        assert!(is_valid_line("  MuteButtons|true|false\r\n"));
        assert!(is_valid_line("SwitchOutput|1"));
    }

    #[test]
    fn test_invalid_lines() {
        assert!(!is_valid_line(""));
        assert!(!is_valid_line("Sliders|"));
        assert!(!is_valid_line("|4095"));
        assert!(!is_valid_line("Sliders||4095"));
        assert!(!is_valid_line("Sliders|-5"));
        assert!(!is_valid_line("Sliders 4095"));
        assert!(!is_valid_line("Slïders|1"));
    }

    #[test]
    fn test_streaming_lines() {
        let mut codec = LineCodec::new();

        codec.push_bytes(b"Sliders|40");
        assert!(codec.next_line().is_none());
        assert!(codec.has_partial());

        codec.push_bytes(b"95\r\nGetCurrentOutputDevice\n");
        assert_eq!(codec.next_line().as_deref(), Some("Sliders|4095"));
        assert_eq!(codec.next_line().as_deref(), Some("GetCurrentOutputDevice"));
        assert!(codec.next_line().is_none());
        assert!(!codec.has_partial());
    }

    #[test]
    fn test_empty_line_yielded() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"\n  \nOK\n");

        assert_eq!(codec.next_line().as_deref(), Some(""));
        assert_eq!(codec.next_line().as_deref(), Some(""));
        assert_eq!(codec.next_line().as_deref(), Some("OK"));
    }

    #[test]
    fn test_overlong_garbage_discarded() {
        let mut codec = LineCodec::new();
        codec.push_bytes(&[b'x'; MAX_LINE_LEN + 1]);
        assert!(!codec.has_partial());

        codec.push_bytes(b"OK\n");
        assert_eq!(codec.next_line().as_deref(), Some("OK"));
    }
}
