//! Incremental server-sent-events parser for streaming chat completions
//!
//! Accumulates raw body bytes and extracts complete events with:
//! - Buffer: 1MB maximum for a single unterminated line
//! - Framing: `\n` or `\r\n` line endings, blank line dispatches an event
//! - Fields: multi-line `data:` joined with `\n`, comments and other fields ignored
//!
//! Lines are only split at `\n` bytes, so a multi-byte character is never cut
//! in half by the framing layer.

use crate::errors::{BakeError, Result};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Sentinel payload closing an OpenAI-style stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE parser
#[derive(Debug)]
pub struct SseParser {
    /// Bytes of the line currently being received
    buffer: Vec<u8>,

    /// `data:` lines of the event currently being assembled
    data_lines: Vec<String>,

    /// Maximum buffer size
    max_buffer_size: usize,
}

impl SseParser {
    /// Create new SSE parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer capacity
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            data_lines: Vec::new(),
            max_buffer_size,
        }
    }

    /// Add bytes and return the data payloads of every event completed by them
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_buffer_size {
            return Err(BakeError::Sse(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len(),
                self.max_buffer_size
            )));
        }

        Ok(events)
    }

    /// Flush at end of body: a trailing event without a blank line still counts
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let line = line.strip_suffix(b"\r").unwrap_or(&line[..]).to_vec();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    /// Get current buffer size
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.data_lines.is_empty()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line[0] == b':' {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (&line[..], ""),
        };

        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data_lines).join("\n"))
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// One streamed chat-completion frame
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorFrame {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// What a single SSE payload means for the text stream
#[derive(Debug, PartialEq)]
pub enum Frame {
    Content(String),
    Done,
    Empty,
}

/// Interpret one event payload of a chat-completions stream
pub fn parse_frame(payload: &str) -> Result<Frame> {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(Frame::Done);
    }
    if payload.is_empty() {
        return Ok(Frame::Empty);
    }

    if let Ok(frame) = serde_json::from_str::<ErrorFrame>(payload) {
        return Err(BakeError::Transport(frame.error.message));
    }

    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| BakeError::Sse(format!("Failed to parse completion chunk: {}", e)))?;

    let content: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if content.is_empty() {
        Ok(Frame::Empty)
    } else {
        Ok(Frame::Content(content))
    }
}

struct ContentState<S> {
    body: S,
    parser: SseParser,
    ready: VecDeque<Result<Bytes>>,
    finished: bool,
}

impl<S> ContentState<S> {
    fn enqueue(&mut self, payloads: Vec<String>) {
        for payload in payloads {
            if self.finished {
                return;
            }
            match parse_frame(&payload) {
                Ok(Frame::Content(text)) => self.ready.push_back(Ok(Bytes::from(text))),
                Ok(Frame::Empty) => {}
                Ok(Frame::Done) => self.finished = true,
                Err(e) => {
                    self.ready.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Turn an SSE response body into a stream of UTF-8 content fragments
///
/// Ends at `[DONE]` or when the body ends; a body error or an error frame is
/// yielded once and ends the stream.
pub fn content_stream<S>(body: S) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    let state = ContentState {
        body,
        parser: SseParser::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => match state.parser.add_bytes(&bytes) {
                    Ok(payloads) => state.enqueue(payloads),
                    Err(e) => {
                        state.ready.push_back(Err(e));
                        state.finished = true;
                    }
                },
                Some(Err(e)) => {
                    state.ready.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    if let Some(payload) = state.parser.finish() {
                        state.enqueue(vec![payload]);
                    }
                    state.finished = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.add_bytes(b"data: hello\n\n").unwrap();
        assert_eq!(events, vec!["hello".to_string()]);
        assert!(parser.is_empty());
    }

    #[test]
    fn test_incremental_event() {
        let mut parser = SseParser::new();
        assert!(parser.add_bytes(b"da").unwrap().is_empty());
        assert!(parser.add_bytes(b"ta: hel").unwrap().is_empty());
        assert!(parser.add_bytes(b"lo\n").unwrap().is_empty());
        assert_eq!(parser.add_bytes(b"\n").unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_crlf_comments_and_other_fields() {
        let mut parser = SseParser::new();
        let events = parser
            .add_bytes(b": keep-alive\r\nevent: message\r\nid: 7\r\ndata: x\r\n\r\n")
            .unwrap();
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.add_bytes(b"data: a\ndata: b\n\n").unwrap();
        assert_eq!(events, vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.add_bytes(b"data: tail").unwrap().is_empty());
        assert_eq!(parser.finish(), Some("tail".to_string()));
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_buffer_overflow() {
        let mut parser = SseParser::with_capacity(100);
        let large_data = vec![b'a'; 150];
        let result = parser.add_bytes(&large_data);
        assert!(matches!(result, Err(BakeError::Sse(_))));
    }

    #[test]
    fn test_parse_frame_variants() {
        assert_eq!(parse_frame("[DONE]").unwrap(), Frame::Done);
        assert_eq!(
            parse_frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            Frame::Empty
        );
        assert_eq!(
            parse_frame(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            Frame::Content("Hi".to_string())
        );
        assert!(matches!(
            parse_frame(r#"{"error":{"message":"rate limited"}}"#),
            Err(BakeError::Transport(msg)) if msg == "rate limited"
        ));
        assert!(matches!(parse_frame("not json"), Err(BakeError::Sse(_))));
    }

    #[tokio::test]
    async fn test_content_stream_stops_at_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", frame("Hel"), frame("lo"), frame("ignored"));
        let chunks = vec![Ok(Bytes::from(body))];

        let items: Vec<Result<Bytes>> = content_stream(stream::iter(chunks)).collect().await;
        let text: Vec<u8> = items
            .into_iter()
            .flat_map(|item| item.unwrap().to_vec())
            .collect();
        assert_eq!(String::from_utf8(text).unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_content_stream_yields_body_error_once() {
        let chunks = vec![
            Ok(Bytes::from(frame("partial"))),
            Err(BakeError::Transport("connection reset".to_string())),
            Ok(Bytes::from(frame("never"))),
        ];

        let items: Vec<Result<Bytes>> = content_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &Bytes::from("partial"));
        assert!(matches!(items[1], Err(BakeError::Transport(_))));
    }

    #[quickcheck]
    fn prop_events_independent_of_split(contents: Vec<String>, cut: usize) -> bool {
        let body: String = contents
            .iter()
            .map(|c| format!("data: {}\n\n", c.replace(['\n', '\r'], " ")))
            .collect();
        let bytes = body.as_bytes();
        let cut = if bytes.is_empty() { 0 } else { cut % (bytes.len() + 1) };

        let mut whole = SseParser::new();
        let expected = whole.add_bytes(bytes).unwrap();

        let mut split = SseParser::new();
        let mut actual = split.add_bytes(&bytes[..cut]).unwrap();
        actual.extend(split.add_bytes(&bytes[cut..]).unwrap());

        expected == actual
    }
}
