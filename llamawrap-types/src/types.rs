//! Conversation, chunk and request types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::options::{Format, Options};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system instruction.
    System,
    /// A human user.
    User,
    /// The model.
    Assistant,
    /// A tool result echoed back by the server.
    Tool,
}

impl Role {
    /// The wire name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// The full text of the message.
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// The ordered history of a conversation.
///
/// A `Transcript` is immutable: [`Transcript::appended`] returns a new value
/// and leaves `self` untouched, so every holder of an earlier transcript keeps
/// seeing exactly the messages it had. Cloning is cheap (the messages are
/// shared behind an `Arc`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Message>", into = "Vec<Message>")]
pub struct Transcript {
    messages: Arc<[Message]>,
}

impl Transcript {
    /// An empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new transcript with `message` appended.
    #[must_use]
    pub fn appended(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend_from_slice(&self.messages);
        messages.push(message);
        Self {
            messages: messages.into(),
        }
    }

    /// The messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Iterate over the messages in conversation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Copy the messages out, e.g. to build a request body.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.to_vec()
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into(),
        }
    }
}

impl From<Transcript> for Vec<Message> {
    fn from(transcript: Transcript) -> Self {
        transcript.messages.to_vec()
    }
}

impl FromIterator<Message> for Transcript {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// One partial unit of a response, as produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Role of the message this chunk belongs to.
    pub role: Role,
    /// The text fragment carried by this chunk (not cumulative).
    pub content: String,
    /// Whether the server marked this chunk as the last one.
    pub done: bool,
    /// Why generation stopped (e.g. `"stop"`, `"length"`), usually on the last chunk.
    pub done_reason: Option<String>,
    /// When the server produced this chunk.
    pub created_at: DateTime<Utc>,
    /// Model that produced this chunk.
    pub model: String,
    /// Conversation encoding returned by the generate endpoint on its last chunk.
    pub context: Option<Vec<i64>>,
}

impl RawChunk {
    /// A non-final chunk stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            done: false,
            done_reason: None,
            created_at: Utc::now(),
            model: String::new(),
            context: None,
        }
    }

    /// Mark this chunk as the final one, with the server's stop reason.
    #[must_use]
    pub fn finished(mut self, reason: impl Into<String>) -> Self {
        self.done = true;
        self.done_reason = Some(reason.into());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// What a consumer sees for each chunk of a streamed response.
///
/// `fragment` holds only the text carried by this chunk, so a renderer can
/// print it as-is without re-rendering earlier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkView {
    /// Role of the message being streamed.
    pub role: Role,
    /// Text added by this chunk.
    pub fragment: String,
    /// Whether this was the server's last chunk.
    pub done: bool,
    /// The latest stop reason seen so far in the turn.
    pub done_reason: Option<String>,
    /// When the server produced this chunk.
    pub created_at: DateTime<Utc>,
    /// Model that produced this chunk.
    pub model: String,
}

/// A request to the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier, e.g. `"llama3"`.
    pub model: String,
    /// Full conversation so far, including the newest user message.
    pub messages: Vec<Message>,
    /// Ask the server for incremental chunks.
    pub stream: bool,
    /// Generation options.
    pub options: Option<Options>,
    /// Structured output constraint.
    pub format: Option<Format>,
    /// How long the server keeps the model loaded after this request.
    pub keep_alive: Option<String>,
}

/// A request to the generate endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Model identifier, e.g. `"llama3"`.
    pub model: String,
    /// System prompt setting context and persona.
    pub system: Option<String>,
    /// The prompt to complete.
    pub prompt: String,
    /// Ask the server for incremental chunks.
    pub stream: bool,
    /// Generation options.
    pub options: Option<Options>,
    /// Structured output constraint.
    pub format: Option<Format>,
    /// How long the server keeps the model loaded after this request.
    pub keep_alive: Option<String>,
}

/// A model available on the local server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalModel {
    /// Model name including tag, e.g. `"llama3:latest"`.
    pub name: String,
    /// Content digest.
    pub digest: String,
    /// Size on disk in bytes.
    pub size: u64,
}

/// Progress of a model pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullProgress {
    /// Human-readable status, e.g. `"pulling manifest"` or `"success"`.
    pub status: String,
    /// Digest of the layer being downloaded, empty when not applicable.
    pub digest: String,
    /// Total bytes of the current layer.
    pub total: u64,
    /// Bytes downloaded so far for the current layer.
    pub completed: u64,
}
