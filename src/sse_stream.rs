//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use crate::Error;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::debug;

/// Largest amount of unparsed data held while waiting for an event boundary.
const MAX_BUFFER_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (optional).
    pub event_type: Option<String>,
    /// Event data.
    pub data: String,
}

impl SseEvent {
    /// The `[DONE]` sentinel that closes OpenAI-style streams.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// A stream adapter that parses SSE events from a byte stream.
/// Events split across chunks are reassembled.
pub struct SseStream<S> {
    inner: S,
    /// Raw bytes not yet forming a complete event.
    buffer: Vec<u8>,
    /// Offset in `buffer` where the boundary search resumes.
    scanned: usize,
    /// Parsed events ready to be yielded.
    events: VecDeque<SseEvent>,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            scanned: 0,
            events: VecDeque::new(),
        }
    }

    /// Move every complete event out of the buffer.
    ///
    /// An event ends at a blank line, with `\n` or `\r\n` line endings in any
    /// mix. Bytes already searched are not searched again.
    fn parse_buffer(&mut self) -> Result<(), Error> {
        let mut start = 0;
        let mut search = self.scanned;

        loop {
            let Some(pos) = memchr::memchr(b'\n', &self.buffer[search..]) else {
                search = self.buffer.len();
                break;
            };
            let line_end = search + pos;
            let separator = match &self.buffer[line_end + 1..] {
                [b'\n', ..] => 1,
                [b'\r', b'\n', ..] => 2,
                // Whether this line closes the event depends on the next chunk.
                [] | [b'\r'] => {
                    search = line_end;
                    break;
                }
                _ => {
                    search = line_end + 1;
                    continue;
                }
            };
            let next = line_end + 1 + separator;

            let parsed = std::str::from_utf8(&self.buffer[start..line_end]).map(parse_event);
            match parsed {
                Ok(Some(event)) => self.events.push_back(event),
                Ok(None) => {}
                Err(e) => {
                    self.buffer.drain(..next);
                    self.scanned = 0;
                    return Err(Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")));
                }
            }

            start = next;
            search = next;
        }

        self.buffer.drain(..start);
        self.scanned = search - start;

        Ok(())
    }
}

/// Parse one complete SSE event from its text representation.
fn parse_event(event_text: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');

        // Comments (keep-alives) start with a colon.
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!("Stream error: {e}")))));
                }
                None => {
                    // The body may end without the final blank line.
                    let rest = std::mem::take(&mut self.buffer);
                    self.scanned = 0;
                    let event = std::str::from_utf8(&rest)
                        .ok()
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                        .and_then(parse_event);
                    if event.is_none() && !rest.is_empty() {
                        debug!(bytes = rest.len(), "discarding trailing SSE data");
                    }
                    return Poll::Ready(event.map(Ok));
                }
            };

            self.buffer.extend_from_slice(&chunk);

            if self.buffer.len() > MAX_BUFFER_BYTES {
                self.buffer.clear();
                self.scanned = 0;
                return Poll::Ready(Some(Err(Error::streaming(
                    "SSE buffer exceeded maximum size",
                ))));
            }

            if let Err(e) = self.parse_buffer() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::copy_from_slice(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_split_events_are_reassembled() {
        let mut events = chunks(&[b"data: Hel", b"lo World\n\ndata: ", b"Second\n\n"]).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "Hello World");
        assert_eq!(events.next().await.unwrap().unwrap().data, "Second");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_and_comments() {
        let mut events =
            chunks(&[b": keep-alive\r\n\r\nevent: chunk\r\ndata: {\"a\":1}\r\n\r\n"]).sse_events();

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.event_type.as_deref(), Some("chunk"));
        assert_eq!(event.data, "{\"a\":1}");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_boundary_split_across_chunks() {
        let euro = "€".as_bytes();
        let second = [b"\ndata: ".as_slice(), &euro[..1]].concat();
        let third = [&euro[1..], b"\r\n".as_slice()].concat();
        let mut events = chunks(&[
            b"data: one\r\n\r",
            &second,
            &third,
            b"\r\ndata: three\n\r\n",
        ])
        .sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "one");
        assert_eq!(events.next().await.unwrap().unwrap().data, "€");
        assert_eq!(events.next().await.unwrap().unwrap().data, "three");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_boundary_in_next_chunk() {
        let mut events = chunks(&[b"data: a\n", b"\n", b"data: b\r\n", b"\r\n"]).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "a");
        assert_eq!(events.next().await.unwrap().unwrap().data, "b");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_multiline_data() {
        let mut events = chunks(&[b"data: Line 1\ndata: Line 2\n\n"]).sse_events();
        assert_eq!(events.next().await.unwrap().unwrap().data, "Line 1\nLine 2");
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        let euro = "€".as_bytes();
        let first = [b"data: Price: ".as_slice(), &euro[..2]].concat();
        let second = [&euro[2..], b"100\n\n".as_slice()].concat();
        let mut events = chunks(&[&first, &second]).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "Price: €100");
    }

    #[tokio::test]
    async fn test_stream_ends_without_final_newline() {
        let mut events = chunks(&[b"data: First\n\n", b"data: [DONE]"]).sse_events();

        assert_eq!(events.next().await.unwrap().unwrap().data, "First");
        let done = events.next().await.unwrap().unwrap();
        assert!(done.is_done());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let mut events = chunks(&[b"data: bad \xFF\xFE bytes\n\n"]).sse_events();
        assert!(events.next().await.unwrap().is_err());
    }
}
