//! Incremental line framing over raw byte chunks.
//!
//! The agent writes newline-delimited JSON, but pipe reads return arbitrary
//! chunk boundaries. The framer buffers the incomplete trailing fragment
//! between reads so that every emitted line is complete, regardless of how
//! the bytes were chunked.

/// Splits an unbounded sequence of byte chunks into complete lines.
///
/// Lines are split on `\n` with the delimiter stripped. Bytes that are not
/// valid UTF-8 are replaced lossily when a line is emitted.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                self.buf.clear();
            } else {
                self.buf.push(byte);
            }
        }
        lines
    }

    /// Flush the residual fragment at end of stream.
    ///
    /// Returns the buffered tail as one final line if it is non-empty after
    /// trimming whitespace, otherwise `None`. The framer is empty afterward.
    pub fn finish(&mut self) -> Option<String> {
        let tail = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        if tail.trim().is_empty() {
            None
        } else {
            Some(tail)
        }
    }

    /// Whether a partial line is currently buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}
