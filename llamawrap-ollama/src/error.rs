//! Internal error helpers for mapping HTTP/reqwest errors to [`TransportError`].

use std::time::Duration;

use llamawrap_types::TransportError;

/// Map an HTTP status code from the Ollama API to a [`TransportError`].
///
/// Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md>
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> TransportError {
    let body = error_message(body);
    match status.as_u16() {
        404 => TransportError::ModelNotFound(body),
        400 => TransportError::InvalidRequest(body),
        500..=599 => TransportError::ServiceUnavailable(body),
        _ => TransportError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`TransportError`].
///
/// `timeout` is the limit this client set on the request, if any. A timeout
/// coming from a caller-supplied `reqwest::Client` has no known limit.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Option<Duration>) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_decode() {
        TransportError::InvalidResponse(err.to_string())
    } else {
        TransportError::Network(Box::new(err))
    }
}

/// Ollama wraps most failures as `{"error": "..."}`; unwrap that when present.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
