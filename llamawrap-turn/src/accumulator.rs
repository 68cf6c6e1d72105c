//! Folding chunks into a single assistant message.
//!
//! [`Accumulator`] is the synchronous heart of a turn. It owns the
//! per-turn state machine:
//!
//! ```text
//! NoChunkReceived ──fold──▶ Accumulating ──finish──▶ Finalized
//!        │                       │
//!        ├──finish──▶ Failed(EmptyResponse)
//!        ├──fail────▶ Failed(Transport) ◀──fail──┤
//!        └──cancel──▶ Cancelled ◀────cancel──────┘
//! ```
//!
//! `Finalized`, `Failed` and `Cancelled` are terminal. Any further call
//! reports [`TurnError::Finished`].

use chrono::{DateTime, Utc};
use llamawrap_types::{ChunkView, Message, RawChunk, Role, TransportError, TurnError};

/// The in-progress assistant message of one streamed turn.
///
/// Created by the first chunk and never before, so a turn without chunks
/// has nothing to promote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    role: Role,
    content: String,
    done_reason: Option<String>,
    created_at: DateTime<Utc>,
    model: String,
}

impl PendingMessage {
    fn from_chunk(chunk: &RawChunk) -> Self {
        Self {
            role: chunk.role,
            content: chunk.content.clone(),
            done_reason: chunk.done_reason.clone(),
            created_at: chunk.created_at,
            model: chunk.model.clone(),
        }
    }

    fn absorb(&mut self, chunk: &RawChunk) {
        self.content.push_str(&chunk.content);
        if chunk.done_reason.is_some() {
            self.done_reason.clone_from(&chunk.done_reason);
        }
        self.created_at = chunk.created_at;
        if !chunk.model.is_empty() {
            self.model.clone_from(&chunk.model);
        }
    }

    /// Role taken from the first chunk.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Everything received so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Latest stop reason seen.
    #[must_use]
    pub fn done_reason(&self) -> Option<&str> {
        self.done_reason.as_deref()
    }

    /// Timestamp of the latest chunk.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Model named by the latest chunk that named one.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Promote to a transcript message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::new(self.role, self.content)
    }
}

/// Where a turn currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No chunk has arrived yet.
    NoChunkReceived,
    /// At least one chunk has been folded.
    Accumulating,
    /// The message was produced.
    Finalized,
    /// The turn ended without a message (empty response or transport error).
    Failed,
    /// The consumer stopped the turn.
    Cancelled,
}

impl TurnPhase {
    /// Whether no more chunks will be accepted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug)]
enum State {
    NoChunkReceived,
    Accumulating(PendingMessage),
    Finalized,
    Failed,
    Cancelled,
}

/// Per-turn fold of [`RawChunk`]s into one [`Message`].
#[derive(Debug)]
pub struct Accumulator {
    state: State,
    chunks: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// A fresh turn with no chunks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::NoChunkReceived,
            chunks: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        match self.state {
            State::NoChunkReceived => TurnPhase::NoChunkReceived,
            State::Accumulating(_) => TurnPhase::Accumulating,
            State::Finalized => TurnPhase::Finalized,
            State::Failed => TurnPhase::Failed,
            State::Cancelled => TurnPhase::Cancelled,
        }
    }

    /// The message being built, once the first chunk has arrived.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingMessage> {
        match &self.state {
            State::Accumulating(pending) => Some(pending),
            _ => None,
        }
    }

    /// Number of chunks folded so far.
    #[must_use]
    pub fn chunks_seen(&self) -> usize {
        self.chunks
    }

    /// Fold one chunk and describe it for the consumer.
    ///
    /// The returned view carries only this chunk's fragment.
    ///
    /// # Errors
    ///
    /// [`TurnError::Finished`] if the turn is already terminal.
    pub fn fold(&mut self, chunk: RawChunk) -> Result<ChunkView, TurnError> {
        if let State::Accumulating(pending) = &mut self.state {
            pending.absorb(&chunk);
        } else if matches!(self.state, State::NoChunkReceived) {
            self.state = State::Accumulating(PendingMessage::from_chunk(&chunk));
        } else {
            return Err(TurnError::Finished);
        }
        self.chunks += 1;
        let done_reason = self.pending().and_then(|p| p.done_reason.clone());

        Ok(ChunkView {
            role: chunk.role,
            fragment: chunk.content,
            done: chunk.done,
            done_reason,
            created_at: chunk.created_at,
            model: chunk.model,
        })
    }

    /// End the turn because the transport broke.
    ///
    /// Any partial content is discarded.
    pub fn fail(&mut self, error: TransportError) -> TurnError {
        if self.phase().is_terminal() {
            return TurnError::Finished;
        }
        self.state = State::Failed;
        TurnError::Transport(error)
    }

    /// End the turn at the consumer's request.
    ///
    /// Any partial content is discarded.
    pub fn cancel(&mut self) -> TurnError {
        if self.phase().is_terminal() {
            return TurnError::Finished;
        }
        self.state = State::Cancelled;
        TurnError::Cancelled
    }

    /// The stream ended: promote the pending message.
    ///
    /// # Errors
    ///
    /// [`TurnError::EmptyResponse`] if no chunk ever arrived,
    /// [`TurnError::Finished`] if the turn was already terminal.
    pub fn finish(&mut self) -> Result<Message, TurnError> {
        match std::mem::replace(&mut self.state, State::Finalized) {
            State::Accumulating(pending) => Ok(pending.into_message()),
            State::NoChunkReceived => {
                self.state = State::Failed;
                Err(TurnError::EmptyResponse)
            }
            terminal => {
                self.state = terminal;
                Err(TurnError::Finished)
            }
        }
    }
}
