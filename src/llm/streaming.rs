//! Buffered Server-Sent Events decoding for the completion stream.
//!
//! The completion service delivers the response as SSE `data:` lines. Chunks
//! arrive at arbitrary byte boundaries, so payloads are buffered until a full
//! line is available. Handles events split across chunks, several events in
//! one chunk, and a final event without a trailing newline.

/// Extracts complete SSE `data:` payloads from an incoming byte stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes; returns the `data:` payloads completed by them.
    ///
    /// Incomplete trailing lines stay buffered for the next `push()` or
    /// `finish()`. Non-`data:` lines (comments, `event:` fields, blank
    /// separators) are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(payload) = line.trim().strip_prefix("data:") {
                payloads.push(payload.trim().to_string());
            }
        }
        payloads
    }

    /// Flush whatever is still buffered once the stream has ended.
    ///
    /// Needed for servers that omit the newline after the final event.
    pub fn finish(&mut self) -> Vec<String> {
        let payloads = self
            .buffer
            .lines()
            .filter_map(|line| line.trim().strip_prefix("data:"))
            .map(|payload| payload.trim().to_string())
            .collect();
        self.buffer.clear();
        payloads
    }
}
