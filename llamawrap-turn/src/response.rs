//! A live response the caller can iterate and stop.

use futures::StreamExt;
use llamawrap_types::{ChunkStream, ChunkView, Message, RawChunk, TransportError, TurnError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::accumulator::{Accumulator, PendingMessage, TurnPhase};

/// What one wait on the transport produced.
enum Pulled {
    Chunk(RawChunk),
    End,
    Broken(TransportError),
    Cancelled,
    DeadlinePassed,
}

/// Async iterator over one response, folding as it goes.
///
/// Each call to [`next`](Self::next) waits for the transport and hands
/// back a [`ChunkView`] for exactly one chunk, in arrival order. The wait
/// ends early when the cancellation token fires or the deadline passes;
/// both end the response as [`TurnError::Cancelled`].
///
/// ```ignore
/// let mut response = session.generate_stream("", "Why is the sky blue?", token).await;
/// while let Some(view) = response.next().await {
///     print!("{}", view.fragment);
/// }
/// let message = response.finish().await?;
/// ```
pub struct ResponseStream {
    chunks: ChunkStream,
    accumulator: Accumulator,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    exhausted: bool,
    stopped: Option<TurnError>,
}

impl ResponseStream {
    /// Wrap a chunk stream. Cancellation and deadline are off until set.
    #[must_use]
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            accumulator: Accumulator::new(),
            cancel: CancellationToken::new(),
            deadline: None,
            exhausted: false,
            stopped: None,
        }
    }

    /// A response whose request never got off the ground.
    ///
    /// Yields no views; [`finish`](Self::finish) reports `error`.
    #[must_use]
    pub fn failed(error: TransportError) -> Self {
        let mut response = Self::new(ChunkStream::from_results(Vec::new()));
        response.stopped = Some(response.accumulator.fail(error));
        response
    }

    /// A response stopped before its request finished opening.
    ///
    /// Yields no views; [`finish`](Self::finish) reports
    /// [`TurnError::Cancelled`].
    #[must_use]
    pub fn cancelled() -> Self {
        let mut response = Self::new(ChunkStream::from_results(Vec::new()));
        response.stopped = Some(response.accumulator.cancel());
        response
    }

    /// Stop when `token` is cancelled.
    ///
    /// The response listens on a child of `token`, so [`cancel`](Self::cancel)
    /// never cancels the caller's token.
    #[must_use]
    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    /// Stop once `deadline` passes.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The next chunk, or `None` once the response ended, failed or was stopped.
    pub async fn next(&mut self) -> Option<ChunkView> {
        if self.exhausted || self.stopped.is_some() {
            return None;
        }

        match self.pull().await {
            Pulled::Chunk(chunk) => match self.accumulator.fold(chunk) {
                Ok(view) => Some(view),
                Err(e) => {
                    self.stopped = Some(e);
                    None
                }
            },
            Pulled::End => {
                self.exhausted = true;
                None
            }
            Pulled::Broken(e) => {
                tracing::warn!(
                    error = %e,
                    chunks = self.accumulator.chunks_seen(),
                    "response stream broke"
                );
                self.stopped = Some(self.accumulator.fail(e));
                None
            }
            Pulled::Cancelled => {
                tracing::debug!(chunks = self.accumulator.chunks_seen(), "response cancelled");
                self.stopped = Some(self.accumulator.cancel());
                None
            }
            Pulled::DeadlinePassed => {
                tracing::debug!(chunks = self.accumulator.chunks_seen(), "response deadline passed");
                self.stopped = Some(self.accumulator.cancel());
                None
            }
        }
    }

    async fn pull(&mut self) -> Pulled {
        let expired = expiry(self.deadline);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Pulled::Cancelled,
            () = expired => Pulled::DeadlinePassed,
            item = self.chunks.receiver.next() => match item {
                Some(Ok(chunk)) => Pulled::Chunk(chunk),
                Some(Err(e)) => Pulled::Broken(e),
                None => Pulled::End,
            },
        }
    }

    /// Stop the response. The next call to [`next`](Self::next) returns `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current phase of the fold.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.accumulator.phase()
    }

    /// The message built so far, if any chunk has arrived.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingMessage> {
        self.accumulator.pending()
    }

    /// Drain whatever is left and produce the final message.
    ///
    /// Chunks not yet taken through [`next`](Self::next) are folded without
    /// being surfaced.
    ///
    /// # Errors
    ///
    /// [`TurnError::EmptyResponse`] when no chunk arrived,
    /// [`TurnError::Transport`] when the stream broke,
    /// [`TurnError::Cancelled`] when stopped early.
    pub async fn finish(mut self) -> Result<Message, TurnError> {
        while self.next().await.is_some() {}
        if let Some(error) = self.stopped.take() {
            return Err(error);
        }
        let message = self.accumulator.finish()?;
        tracing::debug!(
            chunks = self.accumulator.chunks_seen(),
            chars = message.content.len(),
            "response finished"
        );
        Ok(message)
    }

    /// Fold the whole response without looking at individual chunks.
    ///
    /// # Errors
    ///
    /// Same as [`finish`](Self::finish).
    pub async fn collect_message(self) -> Result<Message, TurnError> {
        self.finish().await
    }
}

/// Resolves once `deadline` passes; never without one.
pub(crate) async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("phase", &self.accumulator.phase())
            .field("chunks", &self.accumulator.chunks_seen())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
