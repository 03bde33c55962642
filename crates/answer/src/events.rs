//! Answer event stream.
//!
//! The orchestrator delivers each answer as a lazy, finite sequence of
//! events consumed exactly once: zero or more text deltas followed by a
//! terminal `Done`. The producer pushes into a bounded channel and
//! observes consumer disconnection at every send.

use futures::Stream;
use pollkit_core::AppResult;
use pollkit_llm::GenerationBackend;
use pollkit_retrieval::PassageMeta;
use std::pin::Pin;
use tokio::sync::mpsc;

/// One event of an answer stream.
#[derive(Debug, Clone)]
pub enum AnswerEvent {
    /// Incremental answer text
    Delta(String),

    /// Terminal event; always the last item of a successful stream
    Done {
        /// Citation extracted from the answer (empty if the answer did
        /// not carry the source marker)
        cited_source: String,

        /// Passages behind the citation; empty on blocked answers and
        /// uncited fresh answers
        source_meta: Vec<PassageMeta>,

        /// Whether the answer came from the cache
        was_cached: bool,

        /// Backend that generated the answer; `None` for cached and
        /// blocked answers
        backend: Option<GenerationBackend>,
    },
}

/// Ordered stream of answer events; an `Err` item is terminal, and an
/// abrupt end without `Done` means the request failed mid-stream.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<AnswerEvent>> + Send>>;

/// Wrap a channel receiver as an [`AnswerStream`].
pub(crate) fn stream_from_receiver(rx: mpsc::Receiver<AppResult<AnswerEvent>>) -> AnswerStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = stream_from_receiver(rx);

        tx.send(Ok(AnswerEvent::Delta("hello".to_string())))
            .await
            .unwrap();
        drop(tx);

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, AnswerEvent::Delta(ref text) if text == "hello"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_channel() {
        let (tx, rx) = mpsc::channel(1);
        let stream = stream_from_receiver(rx);
        drop(stream);

        assert!(tx
            .send(Ok(AnswerEvent::Delta("orphan".to_string())))
            .await
            .is_err());
    }
}
