//! Reply-line codec.
//!
//! Server bytes arrive in arbitrary chunks. [`LineBuffer`] re-assembles
//! them on `\r\n`, keeping any trailing partial line for the next chunk,
//! and [`ReplyLine::parse`] splits each line into code, continuation
//! flag and text.

use std::fmt;

use crate::types::{SmtpError, SmtpResult};

/// One parsed server line, e.g. `250-AUTH LOGIN` or `250 HELP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: u16,
    /// `true` when the code is followed by `-`: more lines of this reply follow.
    pub continuation: bool,
    pub message: String,
}

impl ReplyLine {
    /// Parse `NNN-text`, `NNN text` or a bare `NNN`.
    pub fn parse(line: &str) -> SmtpResult<Self> {
        let bytes = line.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpError::unexpected(format!(
                "Malformed reply line: '{}'",
                line
            )));
        }
        let code: u16 = line[..3]
            .parse()
            .map_err(|_| SmtpError::unexpected(format!("Invalid reply code in: '{}'", line)))?;
        let (continuation, message) = match bytes.get(3) {
            None => (false, String::new()),
            Some(b'-') => (true, line[4..].to_string()),
            Some(b' ') => (false, line[4..].to_string()),
            Some(_) => {
                return Err(SmtpError::unexpected(format!(
                    "Malformed reply separator in: '{}'",
                    line
                )))
            }
        };
        Ok(Self {
            code,
            continuation,
            message,
        })
    }

    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}

impl fmt::Display for ReplyLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.continuation { '-' } else { ' ' };
        write!(f, "{}{}{}", self.code, sep, self.message)
    }
}

/// Accumulates raw socket bytes and yields complete CRLF-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    /// Lines are returned without their `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = find_crlf(&self.pending[start..]) {
            let end = start + pos;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 2;
        }
        self.pending.drain(..start);
        lines
    }

    /// Bytes received after the last complete line.
    pub fn partial(&self) -> &[u8] {
        &self.pending
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_final_line() {
        let line = ReplyLine::parse("250 HELP").unwrap();
        assert_eq!(line.code, 250);
        assert!(!line.continuation);
        assert_eq!(line.message, "HELP");
    }

    #[test]
    fn parse_continuation_line() {
        let line = ReplyLine::parse("250-AUTH LOGIN PLAIN").unwrap();
        assert_eq!(line.code, 250);
        assert!(line.continuation);
        assert_eq!(line.message, "AUTH LOGIN PLAIN");
    }

    #[test]
    fn parse_bare_code() {
        let line = ReplyLine::parse("354").unwrap();
        assert_eq!(line.code, 354);
        assert!(!line.continuation);
        assert!(line.message.is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ReplyLine::parse("").is_err());
        assert!(ReplyLine::parse("OK").is_err());
        assert!(ReplyLine::parse("25x ok").is_err());
        assert!(ReplyLine::parse("250_weird").is_err());
    }

    #[test]
    fn display_round_trips_separator() {
        assert_eq!(ReplyLine::parse("250-SIZE 100").unwrap().to_string(), "250-SIZE 100");
        assert_eq!(ReplyLine::parse("221 Bye").unwrap().to_string(), "221 Bye");
    }

    #[test]
    fn buffer_single_chunk_many_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"250-one\r\n250-two\r\n250 three\r\n");
        assert_eq!(lines, vec!["250-one", "250-two", "250 three"]);
        assert!(buf.partial().is_empty());
    }

    #[test]
    fn buffer_keeps_partial_line() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"22").is_empty());
        assert_eq!(buf.partial(), b"22");
        let lines = buf.push(b"0 ready\r\n250-SI");
        assert_eq!(lines, vec!["220 ready"]);
        assert_eq!(buf.partial(), b"250-SI");
        let lines = buf.push(b"ZE 100\r\n");
        assert_eq!(lines, vec!["250-SIZE 100"]);
    }

    #[test]
    fn buffer_split_inside_crlf() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"221 Bye\r").is_empty());
        assert_eq!(buf.push(b"\n"), vec!["221 Bye"]);
    }

    #[test]
    fn buffer_empty_chunk() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"").is_empty());
    }
}
