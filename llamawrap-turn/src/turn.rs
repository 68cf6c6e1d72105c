//! One chat exchange bound to the transcript it extends.

use llamawrap_types::{ChunkView, Message, Transcript, TurnFailure};

use crate::accumulator::TurnPhase;
use crate::response::ResponseStream;

/// A streamed chat turn.
///
/// Iterate with [`next`](Self::next) for live output, then call
/// [`finish`](Self::finish) for the new transcript. The transcript the
/// turn was started from is never modified.
#[derive(Debug)]
pub struct ChatTurn {
    prior: Transcript,
    user: Message,
    response: ResponseStream,
}

impl ChatTurn {
    /// Bind a response to the conversation it answers.
    #[must_use]
    pub fn new(prior: Transcript, user: Message, response: ResponseStream) -> Self {
        Self {
            prior,
            user,
            response,
        }
    }

    /// The next chunk view, in arrival order.
    pub async fn next(&mut self) -> Option<ChunkView> {
        self.response.next().await
    }

    /// Stop the turn. No assistant message will be appended.
    pub fn cancel(&self) {
        self.response.cancel();
    }

    /// Current phase of the underlying fold.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.response.phase()
    }

    /// The transcript this turn extends.
    #[must_use]
    pub fn prior(&self) -> &Transcript {
        &self.prior
    }

    /// The user message that started this turn.
    #[must_use]
    pub fn user_message(&self) -> &Message {
        &self.user
    }

    /// Text received so far, empty before the first chunk.
    #[must_use]
    pub fn partial_content(&self) -> &str {
        self.response.pending().map_or("", |p| p.content())
    }

    /// Finish the turn.
    ///
    /// On success the transcript is `prior + user + assistant`.
    ///
    /// # Errors
    ///
    /// A [`TurnFailure`] holding `prior + user` and the reason no assistant
    /// message was produced.
    pub async fn finish(self) -> Result<Transcript, TurnFailure> {
        let with_user = self.prior.appended(self.user);
        match self.response.finish().await {
            Ok(reply) => Ok(with_user.appended(reply)),
            Err(error) => {
                tracing::warn!(error = %error, "chat turn produced no reply");
                Err(TurnFailure {
                    transcript: with_user,
                    error,
                })
            }
        }
    }
}
