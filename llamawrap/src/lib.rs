#![deny(missing_docs)]
//! # llamawrap — umbrella crate
//!
//! One import surface for chatting with a local Ollama server. The shared
//! types and the turn machinery are always available; the HTTP transport
//! and the process supervisor sit behind the `ollama` and `supervisor`
//! features (both on by default).

pub use llamawrap_turn;
pub use llamawrap_types;

#[cfg(feature = "ollama")]
pub use llamawrap_ollama;
#[cfg(feature = "supervisor")]
pub use llamawrap_supervisor;

/// Cancellation token accepted by streaming calls.
pub use tokio_util::sync::CancellationToken;

/// Happy-path imports.
pub mod prelude {
    pub use llamawrap_types::{
        ChunkView, Format, Message, ModelRegistry, Options, PullProgress, RegistryError, Role,
        SupervisorError, Transcript, Transport, TransportError, TurnError, TurnFailure,
    };

    pub use llamawrap_turn::{
        Availability, ChatTurn, ResponseStream, Session, SessionConfig, ensure_model_available,
    };

    pub use tokio_util::sync::CancellationToken;

    #[cfg(feature = "ollama")]
    pub use llamawrap_ollama::OllamaClient;

    #[cfg(feature = "supervisor")]
    pub use llamawrap_supervisor::{ServerHandle, ServerSupervisor};
}
