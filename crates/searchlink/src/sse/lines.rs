/// Splits an arbitrarily chunked byte stream into text lines.
///
/// Bytes are carried over between chunks and decoded only once a whole line
/// is buffered, so a UTF-8 sequence split across two chunks decodes intact.
/// `\n` never occurs inside a multi-byte UTF-8 sequence, which makes the
/// byte-level split safe.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    // Bytes of `buf` already scanned without finding a terminator.
    scanned: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw chunk. Nothing is decoded until a line is requested.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns the next complete line with its `\n` or `\r\n` stripped.
    pub fn next_line(&mut self) -> Option<String> {
        let offset = self.buf[self.scanned..].iter().position(|&b| b == b'\n');
        let Some(offset) = offset else {
            self.scanned = self.buf.len();
            return None;
        };
        let end = self.scanned + offset;
        let line = decode_line(&self.buf[..end]);
        self.buf.drain(..=end);
        self.scanned = 0;
        Some(line)
    }

    /// Flushes trailing text that never saw a terminator.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    /// Number of buffered, not yet emitted bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
