//! Boundary traits implemented by transports.

use std::future::Future;
use std::sync::Arc;

use crate::error::TransportError;
use crate::stream::ChunkStream;
use crate::types::{ChatRequest, GenerateRequest, LocalModel, PullProgress};

/// Sends requests to an inference server and returns the response as chunks.
///
/// Non-streaming requests (`stream: false`) still come back as a
/// [`ChunkStream`], usually holding a single chunk, so that every response
/// is folded by the same code.
///
/// # Example
///
/// ```ignore
/// use llamawrap_types::*;
///
/// struct Canned;
///
/// impl Transport for Canned {
///     async fn send_chat(&self, _req: ChatRequest) -> Result<ChunkStream, TransportError> {
///         Ok(ChunkStream::from_chunks(vec![
///             RawChunk::new(Role::Assistant, "hi").finished("stop"),
///         ]))
///     }
///
///     async fn send_generate(&self, _req: GenerateRequest) -> Result<ChunkStream, TransportError> {
///         Ok(ChunkStream::from_chunks(vec![]))
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Issue a chat request.
    fn send_chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send;

    /// Issue a generate request.
    fn send_generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send;
}

/// Lists and downloads models on the server.
pub trait ModelRegistry: Send + Sync {
    /// Models available locally.
    fn list_local_models(
        &self,
    ) -> impl Future<Output = Result<Vec<LocalModel>, TransportError>> + Send;

    /// Download a model, reporting progress as it goes.
    fn pull_model(
        &self,
        name: &str,
        stream: bool,
        on_progress: impl FnMut(PullProgress) + Send,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send_chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        (**self).send_chat(request)
    }

    fn send_generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<ChunkStream, TransportError>> + Send {
        (**self).send_generate(request)
    }
}

impl<T: ModelRegistry> ModelRegistry for Arc<T> {
    fn list_local_models(
        &self,
    ) -> impl Future<Output = Result<Vec<LocalModel>, TransportError>> + Send {
        (**self).list_local_models()
    }

    fn pull_model(
        &self,
        name: &str,
        stream: bool,
        on_progress: impl FnMut(PullProgress) + Send,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).pull_model(name, stream, on_progress)
    }
}
