//! NDJSON parsing for Ollama responses.
//!
//! Ollama emits one JSON object per line:
//! ```text
//! {"model":"llama3","created_at":"2024-05-01T10:00:00Z","message":{"role":"assistant","content":"Hello"},"done":false}
//! {"model":"llama3","created_at":"2024-05-01T10:00:01Z","message":{"role":"assistant","content":", world"},"done":false}
//! {"model":"llama3","created_at":"2024-05-01T10:00:02Z","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}
//! ```
//! A non-streaming response is the same object without a trailing newline,
//! so both modes go through the same parser.

use std::fmt::Display;

use chrono::Utc;
use futures::{Stream, StreamExt};
use llamawrap_types::{ChunkStream, RawChunk, Role, TransportError};

use crate::types::{PullLine, ResponseLine};

/// Wrap an HTTP response body into a [`ChunkStream`].
pub(crate) fn chunk_stream(response: reqwest::Response) -> ChunkStream {
    ChunkStream::new(parse_chunks(response.bytes_stream()))
}

/// Parse a raw byte stream of chat or generate lines into chunks.
///
/// Stops after the first error item.
pub(crate) fn parse_chunks<E: Display + Send + 'static>(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<RawChunk, TransportError>> + Send + 'static {
    async_stream::stream! {
        let mut lines = std::pin::pin!(ndjson_lines(byte_stream));
        while let Some(line) = lines.next().await {
            let item = line.and_then(|l| parse_chunk_line(&l));
            let failed = item.is_err();
            yield item;
            if failed {
                return;
            }
        }
    }
}

/// Split a raw byte stream into complete, non-blank lines.
///
/// Bytes are buffered until a newline so that a multi-byte character split
/// across two network reads still decodes. Whatever is left when the body
/// ends is emitted as a final line.
pub(crate) fn ndjson_lines<E: Display + Send + 'static>(
    byte_stream: impl Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<String, TransportError>> + Send + 'static {
    async_stream::stream! {
        let mut buffer = LineBuffer::default();
        let mut bytes_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield Err(TransportError::Stream(format!("stream read error: {e}")));
                    return;
                }
            };

            buffer.push(&chunk);
            while let Some(line) = buffer.next_line() {
                match line {
                    Ok(l) => yield Ok(l),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(rest) = buffer.finish() {
            yield rest;
        }
    }
}

/// Accumulates bytes and hands out complete lines.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete non-blank line, if one is buffered.
    fn next_line(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let newline = self.buf.iter().position(|b| *b == b'\n')?;
            let raw: Vec<u8> = self.buf.drain(..=newline).collect();
            match decode(&raw[..newline]) {
                Ok(line) if line.is_empty() => continue,
                other => return Some(other),
            }
        }
    }

    /// Whatever is left after the body ended, if it is not blank.
    fn finish(&mut self) -> Option<Result<String, TransportError>> {
        let raw = std::mem::take(&mut self.buf);
        match decode(&raw) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}

fn decode(raw: &[u8]) -> Result<String, TransportError> {
    std::str::from_utf8(raw)
        .map(|s| s.trim().to_string())
        .map_err(|e| TransportError::InvalidResponse(format!("UTF-8 decode error: {e}")))
}

/// Parse one chat or generate line into a [`RawChunk`].
pub(crate) fn parse_chunk_line(line: &str) -> Result<RawChunk, TransportError> {
    let parsed: ResponseLine = serde_json::from_str(line)
        .map_err(|e| TransportError::InvalidResponse(format!("JSON parse error in NDJSON: {e}")))?;

    if let Some(error) = parsed.error {
        tracing::warn!(error = %error, "server reported an error mid-response");
        return Err(TransportError::Server(error));
    }

    let (role, content) = match (parsed.message, parsed.response) {
        (Some(message), _) => (message.role, message.content),
        (None, Some(response)) => (Role::Assistant, response),
        (None, None) => (Role::Assistant, String::new()),
    };

    Ok(RawChunk {
        role,
        content,
        done: parsed.done,
        done_reason: parsed.done_reason.filter(|r| !r.is_empty()),
        created_at: parsed.created_at.unwrap_or_else(Utc::now),
        model: parsed.model,
        context: parsed.context,
    })
}

/// Parse one pull progress line.
pub(crate) fn parse_pull_line(line: &str) -> Result<PullLine, TransportError> {
    let parsed: PullLine = serde_json::from_str(line)
        .map_err(|e| TransportError::InvalidResponse(format!("JSON parse error in pull progress: {e}")))?;
    match parsed.error {
        Some(error) => Err(TransportError::Server(error)),
        None => Ok(parsed),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
