//! Per-conversation configuration and the chat/generate entry points.

use std::ops::ControlFlow;
use std::time::Duration;

use llamawrap_types::{
    ChatRequest, ChunkStream, ChunkView, Format, GenerateRequest, Message, Options, Transcript, Transport,
    TransportError, TurnError, TurnFailure,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::response::{ResponseStream, expiry};
use crate::turn::ChatTurn;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3";

/// Settings applied to every request a [`Session`] sends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Model identifier.
    pub model: String,
    /// Default generation options. Empty means the server's defaults.
    pub options: Options,
    /// How long the server keeps the model loaded between requests.
    pub keep_alive: Option<String>,
    /// Upper bound on one whole response. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            options: Options::new(),
            keep_alive: None,
            timeout: None,
        }
    }
}

/// Chat and generate calls against one transport with one configuration.
///
/// The session holds no conversation state: every chat call takes the
/// transcript to extend and returns a new one.
///
/// ```ignore
/// let session = Session::new(OllamaClient::new()).model("mistral");
/// let transcript = session.chat(&Transcript::new(), Message::user("Hi")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
}

impl<T: Transport> Session<T> {
    /// A session with [`SessionConfig::default`].
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// A session with an explicit configuration.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the default generation options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.config.options = options;
        self
    }

    /// Set the server-side keep-alive.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.config.keep_alive = Some(keep_alive.into());
        self
    }

    /// Bound every response by `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one user message and wait for the whole reply.
    ///
    /// # Errors
    ///
    /// A [`TurnFailure`] carrying `transcript + user` when no reply was
    /// produced.
    pub async fn chat(&self, transcript: &Transcript, user: Message) -> Result<Transcript, TurnFailure> {
        self.open_chat(transcript, user, false, &CancellationToken::new())
            .await
            .finish()
            .await
    }

    /// Send one user message and stream the reply.
    ///
    /// A failure to open the request surfaces from [`ChatTurn::finish`].
    pub async fn chat_stream(
        &self,
        transcript: &Transcript,
        user: Message,
        cancel: &CancellationToken,
    ) -> ChatTurn {
        self.open_chat(transcript, user, true, cancel).await
    }

    /// Stream a reply into a callback.
    ///
    /// Returning [`ControlFlow::Break`] stops the turn, which then fails with
    /// [`TurnError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Same as [`chat`](Self::chat).
    pub async fn chat_stream_with<F>(
        &self,
        transcript: &Transcript,
        user: Message,
        mut on_chunk: F,
    ) -> Result<Transcript, TurnFailure>
    where
        F: FnMut(ChunkView) -> ControlFlow<()>,
    {
        let mut turn = self
            .chat_stream(transcript, user, &CancellationToken::new())
            .await;
        while let Some(view) = turn.next().await {
            if on_chunk(view).is_break() {
                turn.cancel();
            }
        }
        turn.finish().await
    }

    /// One-shot completion with the session's options.
    ///
    /// An empty `system` sends no system prompt.
    ///
    /// # Errors
    ///
    /// Any [`TurnError`]; [`TurnError::EmptyResponse`] if the server sent nothing.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, TurnError> {
        self.generate_with_options(system, prompt, &self.config.options)
            .await
    }

    /// One-shot completion with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub async fn generate_with_options(
        &self,
        system: &str,
        prompt: &str,
        options: &Options,
    ) -> Result<String, TurnError> {
        let request = self.generate_request(system, prompt, false, options, None);
        self.open_generate(request, &CancellationToken::new())
            .await
            .collect_message()
            .await
            .map(|m| m.content)
    }

    /// One-shot completion constrained to `format`.
    ///
    /// The returned string is whatever the model produced; it is not
    /// validated against the schema.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub async fn generate_formatted(
        &self,
        system: &str,
        prompt: &str,
        options: &Options,
        format: Format,
    ) -> Result<String, TurnError> {
        let request = self.generate_request(system, prompt, false, options, Some(format));
        self.open_generate(request, &CancellationToken::new())
            .await
            .collect_message()
            .await
            .map(|m| m.content)
    }

    /// Streamed completion with the session's options.
    pub async fn generate_stream(
        &self,
        system: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> ResponseStream {
        let request = self.generate_request(system, prompt, true, &self.config.options, None);
        self.open_generate(request, cancel).await
    }

    async fn open_chat(
        &self,
        transcript: &Transcript,
        user: Message,
        stream: bool,
        cancel: &CancellationToken,
    ) -> ChatTurn {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.extend_from_slice(transcript.messages());
        messages.push(user.clone());

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            stream,
            options: non_empty(&self.config.options),
            format: None,
            keep_alive: self.config.keep_alive.clone(),
        };

        tracing::debug!(
            model = %request.model,
            history = transcript.len(),
            stream,
            "starting chat turn"
        );

        let response = self
            .open(self.transport.send_chat(request), cancel, "chat")
            .await;
        ChatTurn::new(transcript.clone(), user, response)
    }

    async fn open_generate(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> ResponseStream {
        tracing::debug!(
            model = %request.model,
            stream = request.stream,
            formatted = request.format.is_some(),
            "starting generate request"
        );

        self.open(self.transport.send_generate(request), cancel, "generate")
            .await
    }

    /// Wait for the request to open, giving up on cancel or timeout.
    ///
    /// The deadline starts here and also bounds the response that follows.
    async fn open<F>(
        &self,
        send: F,
        cancel: &CancellationToken,
        kind: &'static str,
    ) -> ResponseStream
    where
        F: Future<Output = Result<ChunkStream, TransportError>>,
    {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let token = cancel.child_token();

        let opened = tokio::select! {
            biased;
            () = token.cancelled() => None,
            () = expiry(deadline) => None,
            result = send => Some(result),
        };

        match opened {
            Some(Ok(chunks)) => ResponseStream::new(chunks)
                .with_cancellation(&token)
                .with_deadline(deadline),
            Some(Err(e)) => {
                tracing::warn!(error = %e, kind, "request failed to open");
                ResponseStream::failed(e)
            }
            None => {
                tracing::debug!(kind, "request stopped before it opened");
                ResponseStream::cancelled()
            }
        }
    }

    fn generate_request(
        &self,
        system: &str,
        prompt: &str,
        stream: bool,
        options: &Options,
        format: Option<Format>,
    ) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            system: (!system.is_empty()).then(|| system.to_string()),
            prompt: prompt.to_string(),
            stream,
            options: non_empty(options),
            format,
            keep_alive: self.config.keep_alive.clone(),
        }
    }

}

fn non_empty(options: &Options) -> Option<Options> {
    (!options.is_empty()).then(|| options.clone())
}
