use tracing::debug;

/// Marker that introduces a data field.
pub const DATA_FIELD: &str = "data:";
/// Number of characters stripped from a data line before its payload.
///
/// This is the width of `"data: "`, field marker plus one space, and it is
/// stripped whether or not the space is present: `data:{"a":1}` loses its
/// opening brace and the event is then dropped as malformed. A payload that
/// starts with whitespace after `"data: "` keeps that whitespace until the
/// final trim of the assembled event.
pub const DATA_PREFIX_WIDTH: usize = 6;
/// Lines starting with this character are comments.
pub const COMMENT_MARKER: char = ':';

/// Groups lines into events and parses each event's data as JSON.
///
/// Only data fields are used; `event:`, `id:`, `retry:` and unknown fields
/// are ignored.
#[derive(Debug, Default)]
pub struct EventAssembler {
    fragments: Vec<String>,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line. Returns a value when the line completed an event
    /// whose data parsed as JSON.
    pub fn push_line(&mut self, line: &str) -> Option<serde_json::Value> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(COMMENT_MARKER) {
            return None;
        }
        if line.starts_with(DATA_FIELD) {
            self.fragments.push(strip_data_prefix(line).to_string());
        }
        None
    }

    /// Flushes an event left open when the input ended.
    pub fn finish(&mut self) -> Option<serde_json::Value> {
        self.flush()
    }

    /// True when data for an unfinished event is buffered.
    pub fn has_pending(&self) -> bool {
        !self.fragments.is_empty()
    }

    fn flush(&mut self) -> Option<serde_json::Value> {
        if self.fragments.is_empty() {
            return None;
        }
        let joined = self.fragments.concat();
        self.fragments.clear();
        let data = joined.trim();
        if data.is_empty() {
            return None;
        }
        match serde_json::from_str(data) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    event = "stream.event_dropped",
                    domain = "sse",
                    data_len = data.len() as u64,
                    error = %err,
                    "dropping event with malformed JSON data"
                );
                None
            }
        }
    }
}

fn strip_data_prefix(line: &str) -> &str {
    match line.char_indices().nth(DATA_PREFIX_WIDTH) {
        Some((idx, _)) => &line[idx..],
        None => "",
    }
}
