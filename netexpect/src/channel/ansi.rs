//! ANSI escape sequence stripping built on the `vte` parser.
//!
//! The parser keeps its state between calls, so a sequence split across two
//! reads is still removed.

use vte::{Params, Parser, Perform};

/// Incremental ANSI stripper.
pub struct AnsiStripper {
    parser: Parser,
}

impl AnsiStripper {
    /// Create a stripper with a fresh parser.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Strip escape sequences from `data`, keeping printable text and line control.
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut collector = Collector { out: &mut out };
        self.parser.advance(&mut collector, data);
        out
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

struct Collector<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for Collector<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        // keep line control and backspace, drop bells and the like
        if matches!(byte, b'\n' | b'\r' | b'\t' | 0x08) {
            self.out.push(byte);
        }
    }

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, action: char) {
        // cursor next line
        if action == 'E' {
            self.out.push(b'\n');
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        // NEL
        if intermediates.is_empty() && byte == b'E' {
            self.out.push(b'\n');
        }
    }
}

/// Strip all ANSI escape sequences from a complete string.
pub fn strip_ansi_escape_codes(text: &str) -> String {
    let stripped = AnsiStripper::new().strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_colors() {
        assert_eq!(strip_ansi_escape_codes("\x1b[32mGreen text\x1b[0m"), "Green text");
    }

    #[test]
    fn test_keeps_line_control() {
        assert_eq!(strip_ansi_escape_codes("a\r\nb\tc"), "a\r\nb\tc");
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut stripper = AnsiStripper::new();
        let mut out = stripper.strip(b"user@host:~$ \x1b[");
        out.extend(stripper.strip(b"?2004hls\r\n"));
        assert_eq!(out, b"user@host:~$ ls\r\n");
    }

    #[test]
    fn test_next_line_becomes_newline() {
        assert_eq!(strip_ansi_escape_codes("one\x1b[1Etwo"), "one\ntwo");
    }

    #[test]
    fn test_erase_line_dropped() {
        assert_eq!(strip_ansi_escape_codes("--More--\x1b[K done"), "--More-- done");
    }
}
