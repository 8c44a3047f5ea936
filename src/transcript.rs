//! Captured device output.

use memchr::memmem;
use serde::Serialize;

/// Lines received from the device during one session, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Splits a growing byte buffer into transcript lines.
///
/// `advance` is handed the same buffer again and again, each time possibly
/// longer; only bytes past the previous call are scanned. Bytes are decoded
/// lossily so a corrupted byte never aborts capture.
#[derive(Debug)]
pub(crate) struct TranscriptBuilder {
    terminator: Vec<u8>,
    consumed: usize,
    transcript: Transcript,
}

impl TranscriptBuilder {
    pub(crate) fn new(terminator: &[u8]) -> Self {
        Self {
            terminator: terminator.to_vec(),
            consumed: 0,
            transcript: Transcript::new(),
        }
    }

    /// Emit every complete line in `visible` not emitted yet.
    pub(crate) fn advance(&mut self, visible: &[u8], on_line: &mut dyn FnMut(&str)) {
        if self.terminator.is_empty() {
            return;
        }
        while self.consumed < visible.len() {
            let rest = &visible[self.consumed..];
            let Some(pos) = memmem::find(rest, &self.terminator) else {
                break;
            };
            let line = String::from_utf8_lossy(&rest[..pos]).into_owned();
            self.consumed += pos + self.terminator.len();
            on_line(&line);
            self.transcript.push(line);
        }
    }

    /// Flush the trailing unterminated fragment (if any) and freeze.
    pub(crate) fn finish(mut self, full: &[u8], on_line: &mut dyn FnMut(&str)) -> Transcript {
        self.advance(full, on_line);
        if self.consumed < full.len() {
            let line = String::from_utf8_lossy(&full[self.consumed..]).into_owned();
            on_line(&line);
            self.transcript.push(line);
        }
        self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_emitted_as_they_complete() {
        let mut seen = Vec::new();
        let mut on_line = |l: &str| seen.push(l.to_string());
        let mut builder = TranscriptBuilder::new(b"\r\n");

        builder.advance(b"Failed te", &mut on_line);
        builder.advance(b"Failed tests: 0\r", &mut on_line);
        builder.advance(b"Failed tests: 0\r\nConsumed: 1", &mut on_line);
        let transcript = builder.finish(b"Failed tests: 0\r\nConsumed: 15\r\n", &mut on_line);

        assert_eq!(seen, vec!["Failed tests: 0", "Consumed: 15"]);
        assert_eq!(transcript.lines(), &["Failed tests: 0", "Consumed: 15"]);
    }

    #[test]
    fn test_finish_keeps_unterminated_tail() {
        let builder = TranscriptBuilder::new(b"\r\n");
        let transcript = builder.finish(b"a\r\nhalf a li", &mut |_| {});
        assert_eq!(transcript.lines(), &["a", "half a li"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let builder = TranscriptBuilder::new(b"\n");
        let transcript = builder.finish(b"ok\xff\n", &mut |_| {});
        assert_eq!(transcript.lines(), &["ok\u{fffd}"]);
    }
}
