//! Server-Sent Events (SSE) decoding for streaming chat completions.
//!
//! The endpoint streams a reply as newline-delimited lines.  Each line is blank, a comment, or
//! `data: <json>`, and the stream ends with `data: [DONE]`.  [`decode`] turns the raw byte
//! stream of such a response into a lazy stream of text fragments.
//!
//! Decoding is tolerant of damage: a `data:` line that does not parse is skipped and counted
//! rather than aborting the reply.  Only a failure of the underlying byte stream ends decoding
//! with an error.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_SKIPPED_CHUNKS};
use crate::types::{ChatCompletionChunk, FinishReason, Usage};
use crate::{Error, Result};

/// The end-of-stream marker.
pub const SENTINEL: &str = "[DONE]";

/// A non-empty piece of assistant text surfaced during streaming.
pub type Fragment = String;

/// Decode a byte stream of server-sent events into a stream of [`Fragment`]s.
///
/// The returned stream is finite and cannot be restarted.  It owns `byte_stream` and drops it
/// as soon as decoding ends, whether on the sentinel, an error, or end of input.
pub fn decode<S>(byte_stream: S) -> FragmentStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    FragmentStream {
        inner: Some(byte_stream),
        buffer: Vec::new(),
        skipped_chunks: 0,
        events: 0,
        bytes: 0,
        usage: None,
        finish_reason: None,
        saw_sentinel: false,
    }
}

/// A stream of fragments decoded from a server-sent event byte stream.
///
/// Besides the fragments themselves, the decoder keeps track of what else the stream said:
/// usage reported by the endpoint, the finish reason, and how many events it had to skip.
pub struct FragmentStream<S> {
    inner: Option<S>,
    buffer: Vec<u8>,
    skipped_chunks: u64,
    events: u64,
    bytes: u64,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    saw_sentinel: bool,
}

enum Line {
    Ignored,
    Fragment(Fragment),
    Sentinel,
    Failed(Error),
}

impl<S> FragmentStream<S> {
    /// Number of malformed events skipped so far.
    pub fn skipped_chunks(&self) -> u64 {
        self.skipped_chunks
    }

    /// Number of well-formed events parsed so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Number of bytes read from the underlying stream so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// The most recent usage the endpoint reported, if any.
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// The most recent finish reason the endpoint reported, if any.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Whether decoding ended on the `[DONE]` sentinel.
    pub fn saw_sentinel(&self) -> bool {
        self.saw_sentinel
    }

    /// Whether the underlying byte stream has been released.
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }

    fn release(&mut self) {
        self.inner = None;
        self.buffer.clear();
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    fn skip(&mut self, reason: &str, line: &str) {
        self.skipped_chunks += 1;
        STREAM_SKIPPED_CHUNKS.click();
        tracing::warn!(
            skipped = self.skipped_chunks,
            reason,
            line,
            "skipping malformed stream event"
        );
    }

    fn process_line(&mut self, line: &[u8]) -> Line {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line,
            Err(_) => {
                self.skip("invalid UTF-8", &String::from_utf8_lossy(line));
                return Line::Ignored;
            }
        };
        if line.trim().is_empty() {
            return Line::Ignored;
        }
        // Comments, `event:` and `id:` fields carry nothing for us.
        let Some(payload) = line.strip_prefix("data:") else {
            return Line::Ignored;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);
        if payload.trim() == SENTINEL {
            return Line::Sentinel;
        }

        let chunk = match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.skip(&err.to_string(), payload);
                return Line::Ignored;
            }
        };
        self.events += 1;

        if let Some(error) = chunk.error.as_ref() {
            let status = error.status_code().unwrap_or(500);
            return Line::Failed(Error::api(status, error.message.clone(), payload));
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason = Some(reason);
        }
        match chunk.content() {
            Some(content) => Line::Fragment(content.to_string()),
            None => Line::Ignored,
        }
    }
}

impl<S> Stream for FragmentStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Fragment>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            // First drain every complete line already buffered.
            while let Some(line) = this.next_line() {
                match this.process_line(&line) {
                    Line::Ignored => {}
                    Line::Fragment(fragment) => {
                        STREAM_FRAGMENTS.click();
                        return Poll::Ready(Some(Ok(fragment)));
                    }
                    Line::Sentinel => {
                        this.saw_sentinel = true;
                        this.release();
                        return Poll::Ready(None);
                    }
                    Line::Failed(err) => {
                        STREAM_ERRORS.click();
                        this.release();
                        return Poll::Ready(Some(Err(err)));
                    }
                }
            }

            // Read more data
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(bytes))) => {
                    this.bytes += bytes.len() as u64;
                    STREAM_BYTES.count(bytes.len() as u64);
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => {
                    STREAM_ERRORS.click();
                    this.release();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    tracing::debug!(
                        events = this.events,
                        bytes = this.bytes,
                        "event stream ended without sentinel"
                    );
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    // An unterminated last line is still a line.
                    this.buffer.push(b'\n');
                }
            }
        }
    }
}
