//! The chunk stream returned by transports.

use std::pin::Pin;

use futures::Stream;

use crate::error::TransportError;
use crate::types::RawChunk;

/// Handle to a live response.
///
/// Items arrive in the order the server emitted them. An `Err` item means
/// the stream broke; no further items follow it.
pub struct ChunkStream {
    /// The stream of chunks. Consume with `StreamExt::next()`.
    pub receiver: Pin<Box<dyn Stream<Item = Result<RawChunk, TransportError>> + Send>>,
}

impl ChunkStream {
    /// Box any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<RawChunk, TransportError>> + Send + 'static,
    {
        Self {
            receiver: Box::pin(stream),
        }
    }

    /// A stream replaying a fixed list of results. Handy for tests and fakes.
    #[must_use]
    pub fn from_results(items: Vec<Result<RawChunk, TransportError>>) -> Self {
        Self::new(futures::stream::iter(items))
    }

    /// A stream replaying a fixed list of chunks.
    #[must_use]
    pub fn from_chunks(chunks: Vec<RawChunk>) -> Self {
        Self::from_results(chunks.into_iter().map(Ok).collect())
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}
