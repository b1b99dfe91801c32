//! Server-sent-events decoding: bytes → lines → JSON events.
//!
//! [`SseDecoder`] is pull-based. Raw chunks are pushed in only when
//! [`SseDecoder::next_value`] reports that it needs more input, so at most
//! one chunk and one in-flight event are ever buffered.

pub mod events;
pub mod lines;

pub use events::{COMMENT_MARKER, DATA_FIELD, DATA_PREFIX_WIDTH, EventAssembler};
pub use lines::LineFramer;

#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineFramer,
    events: EventAssembler,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw chunk.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.lines.push(chunk);
    }

    /// Returns the next complete event, or `None` when more input is needed.
    pub fn next_value(&mut self) -> Option<serde_json::Value> {
        while let Some(line) = self.lines.next_line() {
            if let Some(value) = self.events.push_line(&line) {
                return Some(value);
            }
        }
        None
    }

    /// Drains whatever the end of input completes: a trailing unterminated
    /// line, then a trailing unterminated event.
    pub fn finish(&mut self) -> Option<serde_json::Value> {
        if let Some(line) = self.lines.finish()
            && let Some(value) = self.events.push_line(&line)
        {
            return Some(value);
        }
        self.events.finish()
    }
}

/// Decodes a complete in-memory body. Used by tests and buffered bodies.
pub fn decode_all(chunks: &[&[u8]]) -> Vec<serde_json::Value> {
    let mut decoder = SseDecoder::new();
    let mut out = Vec::new();
    for chunk in chunks {
        decoder.push_chunk(chunk);
        while let Some(value) = decoder.next_value() {
            out.push(value);
        }
    }
    out.extend(decoder.finish());
    out
}
