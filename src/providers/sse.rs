//! Server-Sent Events decoding
//!
//! Turns a chunked chat-completion body into [`ProviderEvent`]s. Network
//! chunks are not aligned with SSE lines, so bytes are buffered until a
//! full line is available.

use super::ProviderEvent;
use crate::models::openai::{extract_error_message, ChatCompletionChunk, WireUsage};
use crate::utils::error::StreamError;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tracing::{debug, warn};

/// End-of-stream marker
const DONE_MARKER: &str = "[DONE]";

/// Line-buffering SSE decoder yielding `data:` payloads
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, get back every complete `data:` payload
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, StreamError> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = Self::decode_line(&line)? {
                payloads.push(data);
            }
        }

        Ok(payloads)
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Result<Option<String>, StreamError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line)
    }

    fn decode_line(line: &[u8]) -> Result<Option<String>, StreamError> {
        let line = std::str::from_utf8(line)
            .map_err(|e| StreamError::Transport(format!("Invalid UTF-8 in stream: {}", e)))?;
        let line = line.trim_end_matches(['\r', '\n']);

        // Comments (": keep-alive"), event names and blank separators carry no data
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };

        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(data.to_string()))
    }
}

/// Meaning of one `data:` payload
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Text and/or usage carried by a regular chunk
    Delta {
        content: String,
        usage: Option<WireUsage>,
    },
    /// `[DONE]`
    Done,
    /// The provider reported an error inside the stream
    Error(String),
    /// Unparseable payload, skipped
    Skip,
}

/// Interpret one `data:` payload
pub fn parse_payload(data: &str) -> ChunkOutcome {
    if data.trim() == DONE_MARKER {
        debug!("Received streaming response end marker");
        return ChunkOutcome::Done;
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse streaming response chunk: {}", e);
            return ChunkOutcome::Skip;
        }
    };

    if let Some(error) = &chunk.error {
        let message = extract_error_message(&serde_json::json!({ "error": error }))
            .unwrap_or_else(|| error.to_string());
        return ChunkOutcome::Error(message);
    }

    ChunkOutcome::Delta {
        content: chunk.content(),
        usage: chunk.wire_usage(),
    }
}

pin_project! {
    /// Provider event stream over a chunked response body
    pub struct ChatCompletionStream<S> {
        #[pin]
        inner: S,
        decoder: SseDecoder,
        pending: VecDeque<Result<ProviderEvent, StreamError>>,
        usage: Option<WireUsage>,
        terminated: bool,
    }
}

impl<S> ChatCompletionStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            usage: None,
            terminated: false,
        }
    }
}

/// Queue the events produced by one payload, honoring the single terminal
fn apply_payload(
    data: &str,
    pending: &mut VecDeque<Result<ProviderEvent, StreamError>>,
    usage: &mut Option<WireUsage>,
    terminated: &mut bool,
) {
    if *terminated {
        return;
    }

    match parse_payload(data) {
        ChunkOutcome::Delta { content, usage: chunk_usage } => {
            if chunk_usage.is_some() {
                *usage = chunk_usage;
            }
            if !content.is_empty() {
                pending.push_back(Ok(ProviderEvent::Fragment(content)));
            }
        }
        ChunkOutcome::Done => {
            pending.push_back(Ok(ProviderEvent::Finished(usage.take())));
            *terminated = true;
        }
        ChunkOutcome::Error(message) => {
            pending.push_back(Err(StreamError::Provider { status: None, message }));
            *terminated = true;
        }
        ChunkOutcome::Skip => {}
    }
}

impl<S, B, E> Stream for ChatCompletionStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    type Item = Result<ProviderEvent, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            if *this.terminated {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => match this.decoder.push(chunk.as_ref()) {
                    Ok(payloads) => {
                        for data in payloads {
                            apply_payload(&data, this.pending, this.usage, this.terminated);
                        }
                    }
                    Err(e) => {
                        this.pending.push_back(Err(e));
                        *this.terminated = true;
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.pending
                        .push_back(Err(StreamError::Transport(format!("Stream error: {}", e))));
                    *this.terminated = true;
                }
                Poll::Ready(None) => {
                    match this.decoder.finish() {
                        Ok(Some(data)) => apply_payload(&data, this.pending, this.usage, this.terminated),
                        Ok(None) => {}
                        Err(e) => {
                            this.pending.push_back(Err(e));
                            *this.terminated = true;
                        }
                    }

                    // Body closed without [DONE]: still a normal finish
                    if !*this.terminated {
                        debug!("Stream closed without end marker");
                        this.pending
                            .push_back(Ok(ProviderEvent::Finished(this.usage.take())));
                        *this.terminated = true;
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
