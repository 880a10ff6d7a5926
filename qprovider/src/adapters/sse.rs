//! Server-sent event decoding shared by the HTTP adapters.
//!
//! ```rust
//! use qprovider::adapters::sse::SseDecoder;
//!
//! let mut decoder = SseDecoder::default();
//! assert!(decoder.push(b"event: ping\nda").is_empty());
//!
//! let events = decoder.push(b"ta: {}\n\n");
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event.as_deref(), Some("ping"));
//! assert_eq!(events[0].data, "{}");
//! ```

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::BackendFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental decoder. Bytes may be split anywhere, including inside a
/// multi-byte character; lines are only decoded once complete.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=newline_index).collect::<Vec<_>>();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.feed_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes a trailing event when the body ends without a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&line).into_owned();
            self.feed_line(line.trim_end_matches('\r'));
        }

        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }

        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Decodes a streaming HTTP body into events. Dropping the returned stream
/// drops the response and closes the connection.
pub(crate) fn response_events(
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseEvent, BackendFailure>> + Send {
    try_stream! {
        let mut chunks = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(item) = chunks.next().await {
            let bytes = item.map_err(request_failure)?;
            for event in decoder.push(&bytes) {
                yield event;
            }
        }

        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

/// Fails a body that ended without the backend's end-of-stream marker.
pub(crate) fn ensure_completed(completed: bool) -> Result<(), BackendFailure> {
    if completed {
        return Ok(());
    }
    Err(BackendFailure::transport("stream ended before completion"))
}

/// Failure for a request that produced no usable HTTP status.
pub(crate) fn request_failure(error: reqwest::Error) -> BackendFailure {
    let failure = BackendFailure::transport(error.to_string());
    match error.status() {
        Some(status) => BackendFailure {
            status: Some(status.as_u16()),
            ..failure
        },
        None => failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_only_events_dispatch_on_blank_line() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");

        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: None,
                    data: "{\"a\":1}".to_string(),
                },
                SseEvent {
                    event: None,
                    data: "[DONE]".to_string(),
                },
            ]
        );
    }

    #[test]
    fn split_multibyte_character_is_reassembled() {
        let payload = "data: héllo\n\n".as_bytes();
        let split = payload
            .iter()
            .position(|byte| *byte == 0xC3)
            .expect("payload has a multibyte char")
            + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&payload[..split]).is_empty());
        let events = decoder.push(&payload[split..]);
        assert_eq!(events[0].data, "héllo");
    }

    #[test]
    fn comments_and_crlf_are_handled() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\r\nevent: message_stop\r\ndata: {}\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message_stop"));
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn missing_end_marker_is_a_transport_failure() {
        assert_eq!(ensure_completed(true), Ok(()));

        let failure = ensure_completed(false).expect_err("truncated");
        assert_eq!(failure.status, None);
        assert_eq!(
            failure.detail.as_deref(),
            Some("stream ended before completion")
        );
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(
            decoder.finish().map(|event| event.data),
            Some("tail".to_string())
        );
        assert_eq!(decoder.finish(), None);
    }
}
