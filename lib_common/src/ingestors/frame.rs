//! # Stream Framing
//!
//! Turns the raw response body into classified frames in two steps:
//!
//! 1. `LineFramer` splits byte chunks on `\n`. Chunk boundaries fall anywhere,
//!    so the tail of each chunk is kept until its newline arrives.
//! 2. `FrameAssembler` classifies each line with `classify_line`. A line that is
//!    the beginning of a JSON object (a pretty-printed error body, for
//!    instance) is buffered and the following lines are appended until the
//!    text parses, stops being a prefix of valid JSON, or grows past the frame
//!    limit.
//!
//! Classification is a pure function returning a tagged `StreamFrame`; parse
//! errors are data here, not control flow.

use bytes::BytesMut;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Default upper bound for a single buffered frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// A successfully parsed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetEvent {
    /// The `data.id` field, when present.
    pub id: Option<String>,
    /// The `data.text` field, empty when absent.
    pub text: String,
}

/// An error object sent in-band by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamErrorObject {
    /// Short title, e.g. `Too Many Requests`.
    pub title: Option<String>,
    /// Human-readable detail.
    pub detail: String,
    /// Problem type URI.
    pub kind: Option<String>,
    /// Status code, 0 when the object carries none.
    pub status: i64,
}

impl StreamErrorObject {
    /// True for the statuses that end the connection (0, 401, 429) when a
    /// detail is present.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(self.status, 0 | 401 | 429) && !self.detail.trim().is_empty()
    }

    /// Converts the object into the session error it raises.
    pub fn into_error(self) -> crate::ingestors::error::StreamError {
        crate::ingestors::error::StreamError::Rejected {
            status: self.status,
            detail: self.detail,
        }
    }
}

/// # Stream Frame
///
/// The classification of one line (or one reassembled group of lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A success object carrying `data`.
    Tweet(TweetEvent),
    /// An error object.
    ErrorEvent(StreamErrorObject),
    /// A prefix of a JSON document; more lines are needed.
    Incomplete,
    /// A blank line, a liveness marker, or anything else without meaning.
    KeepAlive,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    data: Option<Value>,
    title: Option<String>,
    detail: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<i64>,
}

/// Classifies a single line of the stream.
pub fn classify_line(line: &str) -> StreamFrame {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StreamFrame::KeepAlive;
    }

    let raw: RawFrame = match serde_json::from_str(trimmed) {
        Ok(raw) => raw,
        Err(e) if e.is_eof() && trimmed.starts_with('{') => return StreamFrame::Incomplete,
        Err(_) => return StreamFrame::KeepAlive,
    };

    if let Some(Value::Object(data)) = raw.data {
        let field = |name: &str| data.get(name).and_then(Value::as_str).map(str::to_string);
        return StreamFrame::Tweet(TweetEvent {
            id: field("id"),
            text: field("text").unwrap_or_default(),
        });
    }

    if raw.title.is_some() || raw.detail.is_some() || raw.kind.is_some() || raw.status.is_some() {
        return StreamFrame::ErrorEvent(StreamErrorObject {
            title: raw.title,
            detail: raw.detail.unwrap_or_default(),
            kind: raw.kind,
            status: raw.status.unwrap_or(0),
        });
    }

    StreamFrame::KeepAlive
}

/// # Line Framer
///
/// Splits a byte stream into lines. `\r\n` and `\n` both terminate a line;
/// invalid UTF-8 is replaced rather than rejected.
///
/// An unterminated tail longer than the line limit is dropped, and so is the
/// rest of that line once its newline arrives.
#[derive(Debug)]
pub struct LineFramer {
    pending: BytesMut,
    scanned: usize,
    max_line_bytes: usize,
    skipping: bool,
    discarded: u64,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl LineFramer {
    /// Creates an empty framer with the default line limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty framer that keeps at most `max_line_bytes` of an
    /// unterminated line.
    pub fn with_limit(max_line_bytes: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            scanned: 0,
            max_line_bytes,
            skipping: false,
            discarded: 0,
        }
    }

    /// Appends `chunk` and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut chunk = chunk;

        if self.skipping {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(newline) => {
                    self.skipping = false;
                    chunk = &chunk[newline + 1..];
                }
                None => return lines,
            }
        }

        self.pending.extend_from_slice(chunk);
        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let mut line = self.pending.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
            self.scanned = 0;
        }
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_line_bytes {
            warn!(
                bytes = self.pending.len(),
                limit = self.max_line_bytes,
                "Unterminated line exceeded the size limit, discarding it."
            );
            self.pending.clear();
            self.scanned = 0;
            self.skipping = true;
            self.discarded += 1;
        }
        lines
    }

    /// Returns the unterminated tail, if any, and resets the framer.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        self.skipping = false;
        if self.pending.is_empty() {
            return None;
        }
        let rest = self.pending.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Bytes waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Oversized lines dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// # Frame Assembler
///
/// Holds the partial-frame buffer of one connection.
#[derive(Debug)]
pub struct FrameAssembler {
    partial: String,
    max_frame_bytes: usize,
    discarded: u64,
}

impl FrameAssembler {
    /// Creates an assembler that gives up on frames larger than `max_frame_bytes`.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            partial: String::new(),
            max_frame_bytes,
            discarded: 0,
        }
    }

    /// Feeds one line and returns what it (together with any buffered lines)
    /// amounts to. `Incomplete` means the line was buffered.
    pub fn push_line(&mut self, line: &str) -> StreamFrame {
        if self.partial.is_empty() {
            return self.start(line);
        }

        self.partial.push('\n');
        self.partial.push_str(line);
        if self.partial.len() > self.max_frame_bytes {
            let bytes = self.partial.len();
            self.partial.clear();
            return self.reject_oversized(bytes);
        }

        match classify_line(&self.partial) {
            StreamFrame::Incomplete => StreamFrame::Incomplete,
            StreamFrame::KeepAlive => {
                // The buffer can no longer become valid JSON; the new line may
                // still open a frame of its own.
                self.partial.clear();
                self.discarded += 1;
                self.start(line)
            }
            frame => {
                self.partial.clear();
                frame
            }
        }
    }

    fn start(&mut self, line: &str) -> StreamFrame {
        let frame = classify_line(line);
        if frame == StreamFrame::Incomplete {
            let opening = line.trim();
            if opening.len() > self.max_frame_bytes {
                return self.reject_oversized(opening.len());
            }
            self.partial.push_str(opening);
        }
        frame
    }

    fn reject_oversized(&mut self, bytes: usize) -> StreamFrame {
        warn!(
            bytes,
            limit = self.max_frame_bytes,
            "Partial frame exceeded the size limit, discarding it."
        );
        self.discarded += 1;
        StreamFrame::KeepAlive
    }

    /// Drops the buffer at the end of a connection and returns its size.
    pub fn abandon(&mut self) -> usize {
        let dropped = self.partial.len();
        if dropped > 0 {
            self.discarded += 1;
            self.partial.clear();
        }
        dropped
    }

    /// True while a partial frame is held.
    pub fn is_buffering(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Frames given up on so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_handles_split_chunks_and_crlf() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"{\"a\":").is_empty());
        assert_eq!(framer.buffered(), 5);
        assert_eq!(framer.push(b"1}\r\n\r\nnext"), vec!["{\"a\":1}".to_string(), String::new()]);
        assert_eq!(framer.push(b" line\n"), vec!["next line".to_string()]);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn framer_returns_unterminated_tail() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"one\ntwo"), vec!["one".to_string()]);
        assert_eq!(framer.finish(), Some("two".to_string()));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn framer_replaces_invalid_utf8() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"ok \xff\n");
        assert_eq!(lines, vec!["ok \u{fffd}".to_string()]);
    }

    #[test]
    fn framer_keeps_multibyte_char_split_across_chunks() {
        let mut framer = LineFramer::new();
        let bytes = "#東京\n".as_bytes();
        assert!(framer.push(&bytes[..2]).is_empty());
        assert_eq!(framer.push(&bytes[2..]), vec!["#東京".to_string()]);
    }

    #[test]
    fn classifies_tweet() {
        let frame = classify_line(r##"{"data":{"id":"42","text":"hello #rust","edit_history_tweet_ids":["42"]}}"##);
        assert_eq!(
            frame,
            StreamFrame::Tweet(TweetEvent { id: Some("42".into()), text: "hello #rust".into() })
        );
    }

    #[test]
    fn tweet_without_text_has_empty_text() {
        assert_eq!(
            classify_line(r#"{"data":{"id":"1"}}"#),
            StreamFrame::Tweet(TweetEvent { id: Some("1".into()), text: String::new() })
        );
    }

    #[test]
    fn classifies_error_object() {
        let frame = classify_line(
            r#"{"title":"Too Many Requests","detail":"Too Many Requests","type":"about:blank","status":429}"#,
        );
        let StreamFrame::ErrorEvent(err) = frame else {
            panic!("expected an error event, got {:?}", frame);
        };
        assert_eq!(err.status, 429);
        assert_eq!(err.detail, "Too Many Requests");
        assert_eq!(err.kind.as_deref(), Some("about:blank"));
        assert!(err.is_fatal_for_connection());
        assert_eq!(err.into_error().to_string(), "Status: 429 - Too Many Requests");
    }

    #[test]
    fn error_without_status_defaults_to_zero() {
        let StreamFrame::ErrorEvent(err) = classify_line(
            r#"{"title":"ConnectionException","detail":"This stream is currently at the maximum allowed connection limit."}"#,
        ) else {
            panic!("expected an error event");
        };
        assert_eq!(err.status, 0);
        assert!(err.is_fatal_for_connection());
    }

    #[test]
    fn non_fatal_error_objects() {
        let StreamFrame::ErrorEvent(err) = classify_line(r#"{"status":503,"detail":"Service Unavailable"}"#) else {
            panic!("expected an error event");
        };
        assert!(!err.is_fatal_for_connection());

        let StreamFrame::ErrorEvent(err) = classify_line(r#"{"status":429,"detail":"  "}"#) else {
            panic!("expected an error event");
        };
        assert!(!err.is_fatal_for_connection());
    }

    #[test]
    fn keep_alive_and_garbage() {
        assert_eq!(classify_line(""), StreamFrame::KeepAlive);
        assert_eq!(classify_line("\r"), StreamFrame::KeepAlive);
        assert_eq!(classify_line("not json"), StreamFrame::KeepAlive);
        assert_eq!(classify_line("{}"), StreamFrame::KeepAlive);
        assert_eq!(classify_line("[1, 2"), StreamFrame::KeepAlive);
        assert_eq!(classify_line(r#"{"a":1} trailing"#), StreamFrame::KeepAlive);
    }

    #[test]
    fn truncated_object_is_incomplete() {
        assert_eq!(classify_line("{"), StreamFrame::Incomplete);
        assert_eq!(classify_line(r#"{"data":{"text":"half"#), StreamFrame::Incomplete);
    }

    #[test]
    fn assembler_joins_pretty_printed_error() {
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_BYTES);
        let body = "{\n  \"title\": \"Unauthorized\",\n  \"type\": \"about:blank\",\n  \"status\": 401,\n  \"detail\": \"Unauthorized\"\n}";
        let mut frames: Vec<StreamFrame> = body.lines().map(|l| assembler.push_line(l)).collect();
        let last = frames.pop().unwrap();
        assert!(frames.iter().all(|f| *f == StreamFrame::Incomplete));
        let StreamFrame::ErrorEvent(err) = last else {
            panic!("expected an error event, got {:?}", last);
        };
        assert_eq!(err.into_error().to_string(), "Status: 401 - Unauthorized");
        assert!(!assembler.is_buffering());
    }

    #[test]
    fn assembler_recovers_when_buffer_goes_bad() {
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(assembler.push_line(r#"{"data":{"text":"cut off"#), StreamFrame::Incomplete);
        // A raw newline inside the buffered string makes the joined text invalid.
        let frame = assembler.push_line(r##"{"data":{"text":"#fresh"}}"##);
        assert_eq!(
            frame,
            StreamFrame::Tweet(TweetEvent { id: None, text: "#fresh".into() })
        );
        assert_eq!(assembler.discarded(), 1);
        assert!(!assembler.is_buffering());
    }

    #[test]
    fn assembler_enforces_frame_limit() {
        let mut assembler = FrameAssembler::new(16);
        assert_eq!(assembler.push_line("{\"title\":"), StreamFrame::Incomplete);
        assert_eq!(assembler.push_line("\"aaaaaaaaaaaaaaaaaaaa"), StreamFrame::KeepAlive);
        assert!(!assembler.is_buffering());
        assert_eq!(assembler.discarded(), 1);
    }

    #[test]
    fn assembler_rejects_oversized_opening_line() {
        let mut assembler = FrameAssembler::new(16);
        let opening = format!("{{\"data\":{{\"text\":\"{}", "x".repeat(1000));
        assert_eq!(assembler.push_line(&opening), StreamFrame::KeepAlive);
        assert!(!assembler.is_buffering());
        assert_eq!(assembler.discarded(), 1);

        assert_eq!(
            assembler.push_line(r#"{"data":{"text":"ok"}}"#),
            StreamFrame::Tweet(TweetEvent { id: None, text: "ok".into() })
        );
    }

    #[test]
    fn framer_drops_overlong_unterminated_line() {
        let mut framer = LineFramer::with_limit(8);
        assert!(framer.push(b"{\"data\":{\"text\"").is_empty());
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.discarded(), 1);

        // The rest of the dropped line is skipped up to its newline.
        assert!(framer.push(b"more junk").is_empty());
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.push(b" end\n{\"a\":1}\n"), vec!["{\"a\":1}".to_string()]);
        assert_eq!(framer.discarded(), 1);
    }

    #[test]
    fn framer_limit_only_applies_to_the_pending_tail() {
        let mut framer = LineFramer::with_limit(8);
        assert_eq!(framer.push(b"0123456789abc\nxy"), vec!["0123456789abc".to_string()]);
        assert_eq!(framer.buffered(), 2);
        assert_eq!(framer.discarded(), 0);
    }

    #[test]
    fn abandon_drops_partial() {
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(assembler.abandon(), 0);
        assembler.push_line("{\"data\":");
        assert_eq!(assembler.abandon(), 8);
        assert_eq!(assembler.discarded(), 1);
        assert!(!assembler.is_buffering());
    }
}
