#![deny(missing_docs)]
//! Turning chunked responses into conversation state.
//!
//! A [`Session`] sends chat and generate requests through any
//! [`llamawrap_types::Transport`]. Each response is folded by an
//! [`Accumulator`]: every chunk is surfaced once, in arrival order, as a
//! [`llamawrap_types::ChunkView`], and the fragments are concatenated into
//! exactly one assistant [`llamawrap_types::Message`].
//!
//! Streaming responses are consumed through [`ResponseStream`] (generate)
//! and [`ChatTurn`] (chat), both async iterators that can be cancelled with
//! a [`tokio_util::sync::CancellationToken`] or bounded by a deadline.
//!
//! A turn that produces no assistant message (no chunks, a broken stream,
//! or cancellation) leaves the transcript with the user message only.

mod accumulator;
mod availability;
mod response;
mod session;
mod turn;

pub use accumulator::{Accumulator, PendingMessage, TurnPhase};
pub use availability::{Availability, ensure_model_available};
pub use response::ResponseStream;
pub use session::{DEFAULT_MODEL, Session, SessionConfig};
pub use turn::ChatTurn;
