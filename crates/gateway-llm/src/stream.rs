//! Streaming response decoding
//!
//! Upstream bodies arrive as arbitrary byte chunks. Two framings are supported:
//! - server-sent events, split on newlines with the partial tail carried over
//! - a JSON array of objects (Gemini), split on object boundaries
//!
//! Both decoders hold incomplete input across chunks, so a boundary falling inside a
//! line or inside an object never loses or corrupts an event.

use crate::provider::{ProviderError, ProviderResult};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use gateway_core::llm::StreamDelta;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Lazy, finite sequence of deltas read from one upstream connection.
///
/// Ends after the upstream terminator, at end of body, or after the first error.
/// Dropping or closing the stream releases the upstream connection.
pub struct DeltaStream {
    inner: Option<BoxStream<'static, ProviderResult<StreamDelta>>>,
}

impl DeltaStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = ProviderResult<StreamDelta>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// Stream that yields the given items and ends
    pub fn from_deltas(items: Vec<ProviderResult<StreamDelta>>) -> Self {
        Self::new(futures::stream::iter(items))
    }

    /// Pull the next delta. `None` once the stream is finished or closed.
    pub async fn next_delta(&mut self) -> Option<ProviderResult<StreamDelta>> {
        let inner = self.inner.as_mut()?;
        let item = inner.next().await;
        if matches!(item, None | Some(Err(_))) {
            self.inner = None;
        }
        item
    }

    /// Stop reading and release the upstream connection.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("Delta stream closed before completion");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for DeltaStream {
    type Item = ProviderResult<StreamDelta>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        let poll = inner.as_mut().poll_next(cx);
        if matches!(poll, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.inner = None;
        }
        poll
    }
}

impl std::fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Newline splitter that carries the incomplete tail between chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Take whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Payload of an SSE `data:` line. Other SSE fields and comments yield `None`.
pub fn sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

/// Splits a streamed JSON array into its top-level objects.
///
/// Tracks brace depth and string/escape state across chunks. Array punctuation and
/// whitespace between objects are skipped.
#[derive(Debug, Default)]
pub struct JsonObjectSplitter {
    buffer: Vec<u8>,
    scanned: usize,
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonObjectSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every object it completed, as raw JSON text.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut objects = Vec::new();
        for i in self.scanned..self.buffer.len() {
            let byte = self.buffer[i];

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'{' => {
                    if self.depth == 0 {
                        self.start = Some(i);
                    }
                    self.depth += 1;
                }
                b'"' if self.depth > 0 => self.in_string = true,
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some(start) = self.start.take() {
                            objects.push(String::from_utf8_lossy(&self.buffer[start..=i]).into_owned());
                        }
                    }
                }
                _ => {}
            }
        }

        // Keep only the unfinished object, if any.
        let keep_from = self.start.unwrap_or(self.buffer.len());
        self.buffer.drain(..keep_from);
        if self.start.is_some() {
            self.start = Some(0);
        }
        self.scanned = self.buffer.len();

        objects
    }
}

/// Outcome of decoding one SSE `data:` payload
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Delta(StreamDelta),
    /// Not a content event, or not decodable
    Skip,
    /// Upstream terminator
    Done,
}

/// Turn an SSE response body into deltas using a per-payload decoder.
pub(crate) fn sse_deltas<F>(response: reqwest::Response, mut decode: F) -> DeltaStream
where
    F: FnMut(&str) -> SseEvent + Send + 'static,
{
    DeltaStream::new(async_stream::try_stream! {
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut finished = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ProviderError::from)?;
            for line in lines.push(&chunk) {
                let Some(data) = sse_data(&line) else { continue };
                match decode(data) {
                    SseEvent::Delta(delta) => yield delta,
                    SseEvent::Skip => {}
                    SseEvent::Done => {
                        finished = true;
                        break 'read;
                    }
                }
            }
        }

        if !finished {
            if let Some(line) = lines.finish() {
                if let Some(data) = sse_data(&line) {
                    if let SseEvent::Delta(delta) = decode(data) {
                        yield delta;
                    }
                }
            }
        }
    })
}

/// Turn a streamed JSON array body into deltas using a per-object decoder.
pub(crate) fn json_array_deltas<F>(response: reqwest::Response, mut decode: F) -> DeltaStream
where
    F: FnMut(&str) -> Option<StreamDelta> + Send + 'static,
{
    DeltaStream::new(async_stream::try_stream! {
        let mut body = response.bytes_stream();
        let mut splitter = JsonObjectSplitter::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ProviderError::from)?;
            for object in splitter.push(&chunk) {
                if let Some(delta) = decode(&object) {
                    yield delta;
                }
            }
        }
    })
}
