//! Ollama wire types.
//!
//! Key points of the API:
//! - `/api/chat` and `/api/generate` answer in NDJSON when `stream` is true
//!   and with a single JSON object otherwise
//! - chat lines carry `message.content`, generate lines carry `response`
//! - an in-band failure arrives as `{"error": "..."}`
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use chrono::{DateTime, Utc};
use llamawrap_types::{Format, Message, Options, Role};
use serde::{Deserialize, Serialize};

/// `/api/chat` request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'a Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<&'a str>,
}

/// `/api/generate` request body.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'a Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<&'a str>,
}

/// `/api/pull` request body.
#[derive(Debug, Serialize)]
pub(crate) struct PullBody<'a> {
    pub model: &'a str,
    pub stream: bool,
}

/// One line of a chat or generate response.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseLine {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Present on chat lines.
    #[serde(default)]
    pub message: Option<WireMessage>,
    /// Present on generate lines.
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub context: Option<Vec<i64>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The message object inside a chat line.
#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

/// `/api/tags` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsModel {
    pub name: String,
    /// Newer servers repeat the name here; older ones omit it.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

/// One line of a pull response.
#[derive(Debug, Deserialize)]
pub(crate) struct PullLine {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// `/api/version` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct VersionResponse {
    pub version: String,
}
