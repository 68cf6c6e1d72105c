//! Ollama API client struct and builder.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use llamawrap_types::{
    ChatRequest, ChunkStream, GenerateRequest, LocalModel, ModelRegistry, PullProgress, Transport,
    TransportError,
};

use crate::error::{map_http_status, map_reqwest_error};
use crate::streaming::{chunk_stream, ndjson_lines, parse_pull_line};
use crate::types::{ChatBody, GenerateBody, PullBody, TagsResponse, VersionResponse};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Default Ollama port.
pub const DEFAULT_PORT: u16 = 11434;

/// Environment variable holding the server address.
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// Timeout applied to short metadata calls (tags, version).
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Ollama HTTP API.
///
/// Implements [`Transport`] and [`ModelRegistry`].
///
/// # Example
///
/// ```no_run
/// use llamawrap_ollama::OllamaClient;
///
/// let client = OllamaClient::new().base_url("http://localhost:11434");
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// API base URL without a trailing slash.
    pub(crate) base_url: String,
    /// Timeout for tags and version requests.
    pub(crate) metadata_timeout: Duration,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client pointed at [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from the `OLLAMA_HOST` environment variable.
    ///
    /// Unset or empty means [`DEFAULT_BASE_URL`]. A host without a scheme gets
    /// `http://`, a host without a port gets 11434 (443 for https).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the variable cannot be
    /// parsed as a host.
    pub fn from_env() -> Result<Self, TransportError> {
        let raw = std::env::var(HOST_ENV_VAR).unwrap_or_default();
        let base_url = parse_host(&raw)?;
        tracing::debug!(base_url = %base_url, "ollama client configured from environment");
        Ok(Self::new().base_url(base_url))
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a mock server or a remote Ollama instance.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the timeout for tags and version requests.
    ///
    /// Chat, generate and pull responses are long-lived and are not subject to it.
    #[must_use]
    pub fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Use a preconfigured [`reqwest::Client`] (proxies, TLS roots, ...).
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The configured base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    /// Ask the server for its version string.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] from the request or a malformed body.
    pub async fn version(&self) -> Result<String, TransportError> {
        let url = self.endpoint("version");
        tracing::debug!(url = %url, "requesting server version");

        let response = self
            .client
            .get(&url)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, Some(self.metadata_timeout)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, Some(self.metadata_timeout)))?;
        if !status.is_success() {
            return Err(map_http_status(status, &body));
        }

        let parsed: VersionResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::InvalidResponse(format!("invalid version body: {e}")))?;
        Ok(parsed.version)
    }

    /// POST a JSON body to a streaming endpoint and hand back the response
    /// once the status is known to be a success.
    async fn post_streaming(
        client: reqwest::Client,
        url: String,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, TransportError> {
        let response = client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, None))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, None))?;
            return Err(map_http_status(status, &body_text));
        }
        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for OllamaClient {
    /// Send a request to `/api/chat`.
    ///
    /// With `stream: true` the returned [`ChunkStream`] yields one chunk per
    /// NDJSON line as the model generates; otherwise it yields the single
    /// complete response.
    fn send_chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        let url = self.endpoint("chat");
        let http_client = self.client.clone();

        async move {
            let body = serde_json::to_value(ChatBody {
                model: &request.model,
                messages: &request.messages,
                stream: request.stream,
                options: request.options.as_ref(),
                format: request.format.as_ref(),
                keep_alive: request.keep_alive.as_deref(),
            })
            .map_err(|e| TransportError::InvalidRequest(format!("unserializable request: {e}")))?;

            tracing::debug!(
                url = %url,
                model = %request.model,
                messages = request.messages.len(),
                stream = request.stream,
                "sending chat request to Ollama"
            );

            let response = Self::post_streaming(http_client, url, body).await?;
            Ok(chunk_stream(response))
        }
    }

    /// Send a request to `/api/generate`.
    fn send_generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        let url = self.endpoint("generate");
        let http_client = self.client.clone();

        async move {
            let body = serde_json::to_value(GenerateBody {
                model: &request.model,
                prompt: &request.prompt,
                system: request.system.as_deref(),
                stream: request.stream,
                options: request.options.as_ref(),
                format: request.format.as_ref(),
                keep_alive: request.keep_alive.as_deref(),
            })
            .map_err(|e| TransportError::InvalidRequest(format!("unserializable request: {e}")))?;

            tracing::debug!(
                url = %url,
                model = %request.model,
                stream = request.stream,
                "sending generate request to Ollama"
            );

            let response = Self::post_streaming(http_client, url, body).await?;
            Ok(chunk_stream(response))
        }
    }
}

impl ModelRegistry for OllamaClient {
    /// List models from `/api/tags`.
    fn list_local_models(
        &self,
    ) -> impl Future<Output = Result<Vec<LocalModel>, TransportError>> + Send {
        let url = self.endpoint("tags");
        let timeout = self.metadata_timeout;
        let http_client = self.client.clone();

        async move {
            tracing::debug!(url = %url, "listing local models");

            let response = http_client
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, Some(timeout)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| map_reqwest_error(e, Some(timeout)))?;
            if !status.is_success() {
                return Err(map_http_status(status, &body));
            }

            let tags: TagsResponse = serde_json::from_str(&body)
                .map_err(|e| TransportError::InvalidResponse(format!("invalid tags body: {e}")))?;

            Ok(tags
                .models
                .into_iter()
                .map(|m| LocalModel {
                    name: m.model.filter(|s| !s.is_empty()).unwrap_or(m.name),
                    digest: m.digest,
                    size: m.size,
                })
                .collect())
        }
    }

    /// Pull a model through `/api/pull`, forwarding every progress line.
    fn pull_model(
        &self,
        name: &str,
        stream: bool,
        mut on_progress: impl FnMut(PullProgress) + Send,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let url = self.endpoint("pull");
        let model = name.to_string();
        let http_client = self.client.clone();

        async move {
            let body = serde_json::to_value(PullBody {
                model: &model,
                stream,
            })
            .map_err(|e| TransportError::InvalidRequest(format!("unserializable request: {e}")))?;
            tracing::info!(model = %model, stream, "pulling model");

            let response = Self::post_streaming(http_client, url, body).await?;
            let mut lines = std::pin::pin!(ndjson_lines(response.bytes_stream()));

            while let Some(line) = lines.next().await {
                let progress = parse_pull_line(&line?)?;
                on_progress(PullProgress {
                    status: progress.status,
                    digest: progress.digest,
                    total: progress.total,
                    completed: progress.completed,
                });
            }

            tracing::info!(model = %model, "model pull finished");
            Ok(())
        }
    }
}

/// Turn an `OLLAMA_HOST` value into a base URL.
pub(crate) fn parse_host(raw: &str) -> Result<String, TransportError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_BASE_URL.to_string());
    }

    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http".to_string(), raw),
    };
    let default_port = match scheme.as_str() {
        "http" => DEFAULT_PORT,
        "https" => 443,
        other => {
            return Err(TransportError::InvalidRequest(format!(
                "unsupported scheme in {HOST_ENV_VAR}: {other}"
            )));
        }
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx..].trim_end_matches('/')),
        None => (rest, ""),
    };

    let (host, port) = if authority.ends_with(']') {
        (authority, default_port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    TransportError::InvalidRequest(format!("invalid port in {HOST_ENV_VAR}: {raw}"))
                })?;
                (host, port)
            }
            None => (authority, default_port),
        }
    };
    let host = if host.is_empty() { "127.0.0.1" } else { host };

    Ok(format!("{scheme}://{host}:{port}{path}"))
}
