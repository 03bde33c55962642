//! Incremental line assembly for streamed response bodies.
//!
//! Network reads land on arbitrary byte boundaries, so one NDJSON
//! object or SSE event can span several reads (and a read can split a
//! multi-byte UTF-8 sequence). Parsing must only ever see lines that
//! were actually terminated; the trailing partial line is carried into
//! the next read.

use futures::{Stream, StreamExt};
use pollkit_core::{AppError, AppResult};

/// Byte buffer yielding complete lines as they are terminated.
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append raw bytes; returns the non-empty lines they completed.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Drain an unterminated trailing line once the body has ended.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Adapt a response byte stream into a stream of complete lines.
pub(crate) fn lines<S, B>(body: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    futures::stream::unfold(
        (Box::pin(body), LineBuffer::new(), false),
        |(mut body, mut buffer, done)| async move {
            if done {
                return None;
            }

            let batch: Vec<AppResult<String>> = match body.next().await {
                Some(Ok(bytes)) => buffer.push(bytes.as_ref()).into_iter().map(Ok).collect(),
                Some(Err(e)) => {
                    vec![Err(AppError::Generation(format!("Stream error: {}", e)))]
                }
                None => {
                    let tail: Vec<AppResult<String>> =
                        buffer.finish().into_iter().map(Ok).collect();
                    return Some((futures::stream::iter(tail), (body, buffer, true)));
                }
            };

            Some((futures::stream::iter(batch), (body, buffer, false)))
        },
    )
    .flatten()
}
