//! Error types for all llamawrap crates.

use std::time::Duration;

use crate::types::Transcript;

/// Errors talking to the inference server.
///
/// The core never retries; [`TransportError::is_retryable`] is a hint for
/// callers that want their own policy.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    // Retryable errors
    /// Network-level error (connection refused, reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Request timed out. Carries the limit when it is known.
    #[error("timeout{}", timeout_limit(.0))]
    Timeout(Option<Duration>),
    /// Server returned a 5xx status.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Requested model does not exist on the server.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// Malformed or rejected request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Server reported an error inside an otherwise successful response.
    #[error("server error: {0}")]
    Server(String),

    // Catch-all
    /// Response stream broke while reading.
    #[error("stream error: {0}")]
    Stream(String),
}

fn timeout_limit(limit: &Option<Duration>) -> String {
    limit.map_or_else(String::new, |d| format!(" after {d:?}"))
}

impl TransportError {
    /// Whether this error is likely transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::ServiceUnavailable(_) | Self::Stream(_)
        )
    }
}

/// Why a single turn produced no assistant message.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The transport failed before or during the response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The response finished without a single chunk.
    #[error("empty response: the server sent no chunks")]
    EmptyResponse,
    /// The consumer or its deadline stopped the turn early.
    #[error("cancelled")]
    Cancelled,
    /// The turn already reached a terminal state.
    #[error("turn already finished")]
    Finished,
}

/// A failed chat turn, together with the transcript the caller should keep.
///
/// `transcript` holds the prior history plus the user message only; a
/// partially streamed assistant reply is never part of it.
#[derive(Debug, thiserror::Error)]
#[error("chat turn failed: {error}")]
pub struct TurnFailure {
    /// Prior transcript plus the user message.
    pub transcript: Transcript,
    /// What went wrong.
    #[source]
    pub error: TurnError,
}

impl TurnFailure {
    /// Whether the turn ended because the server sent nothing.
    #[must_use]
    pub fn is_empty_response(&self) -> bool {
        matches!(self.error, TurnError::EmptyResponse)
    }

    /// Whether the turn was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, TurnError::Cancelled)
    }
}

/// Errors from model listing and pulling.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Listing local models failed.
    #[error("failed to list local models: {0}")]
    List(#[source] TransportError),
    /// Pulling a model failed.
    #[error("failed to pull model {model}: {source}")]
    Pull {
        /// The model being pulled.
        model: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
}

/// Errors from starting, stopping or locating the server process.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The server process could not be spawned.
    #[error("failed to start server: {0}")]
    Start(#[source] std::io::Error),
    /// The spawned process exited before reporting a pid.
    #[error("server process has no pid after spawn")]
    MissingPid,
    /// The server process could not be stopped.
    #[error("failed to stop server (pid {pid}): {source}")]
    Stop {
        /// Process that failed to stop.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}
