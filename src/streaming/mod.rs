//! SSE (Server-Sent Events) parsing utilities
//!
//! Splits upstream byte chunks into lines and classifies OpenAI-style
//! `data:` lines for the extraction relay mode.

use serde_json::Value;

/// Prefix carried by every SSE data line.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Sentinel payload marking the end of a completion stream.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// Upstream chunks do not align with line boundaries, and a multi-byte
/// UTF-8 character may be split between two chunks. Lines are therefore
/// returned as raw bytes; decoding is left to [`classify_line`], which
/// rejects payloads that are not valid UTF-8 instead of repairing them.
///
/// # Example
/// ```
/// use genrelay::streaming::SseLineBuffer;
///
/// let mut buffer = SseLineBuffer::new();
///
/// assert!(buffer.feed(b"data: {\"content\":\"hel").is_empty());
///
/// let lines = buffer.feed(b"lo\"}\n");
/// assert_eq!(lines, vec![b"data: {\"content\":\"hello\"}".to_vec()]);
/// ```
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the buffer and return any complete, non-blank lines.
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped. Trailing data without
    /// a newline is retained for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(line) = trim_line(&self.pending[start..end]) {
                lines.push(line.to_vec());
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        lines
    }

    /// Take whatever is left once the upstream has closed.
    ///
    /// Returns the unterminated final line, if it is not blank.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.pending);
        trim_line(&rest).map(<[u8]>::to_vec)
    }
}

fn trim_line(raw: &[u8]) -> Option<&[u8]> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(raw)
}

/// What a single upstream SSE line means to the extraction relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Blank line, comment, keep-alive or any non-`data:` field.
    Ignored,
    /// The `[DONE]` sentinel.
    Done,
    /// A non-empty `choices[0].delta.content` fragment.
    Delta(String),
    /// Valid JSON without a text delta (role announcements, finish reasons).
    Empty,
    /// Payload that is not valid UTF-8 JSON.
    Malformed(String),
}

/// Classify one line of an OpenAI-compatible completion stream.
pub fn classify_line(line: &[u8]) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };

    if payload.trim_ascii() == DONE_SENTINEL {
        return SseLine::Done;
    }

    // serde_json validates UTF-8 on slices, so undecodable bytes are malformed
    match serde_json::from_slice::<Value>(payload) {
        Ok(event) => match extract_delta(&event) {
            Some(text) => SseLine::Delta(text.to_string()),
            None => SseLine::Empty,
        },
        Err(e) => SseLine::Malformed(e.to_string()),
    }
}

/// `choices[0].delta.content`, if present and non-empty.
pub fn extract_delta(event: &Value) -> Option<&str> {
    event
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
