#![deny(missing_docs)]
//! Ollama HTTP transport for llamawrap.
//!
//! [`OllamaClient`] implements [`llamawrap_types::Transport`] for
//! `/api/chat` and `/api/generate`, and [`llamawrap_types::ModelRegistry`]
//! for `/api/tags` and `/api/pull`. Responses are parsed from NDJSON into
//! [`llamawrap_types::RawChunk`]s; folding them into messages is the job of
//! `llamawrap-turn`.
//!
//! Ollama runs locally, so there are no auth headers.

mod client;
mod error;
mod streaming;
mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_PORT, HOST_ENV_VAR, OllamaClient};
