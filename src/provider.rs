use crate::types::{ChatRequest, ChunkDelta};
use crate::{Completion, Error};
use futures_util::stream::Stream;
use std::pin::Pin;

/// A stream of parsed chat completion chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkDelta, Error>> + Send>>;

/// The collaborator that performs chat completion calls.
///
/// Implementations translate their native failures into [`Error`] at this
/// boundary, so status codes stay reachable through
/// [`HasStatusCode`](crate::HasStatusCode).
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Await one complete assistant turn.
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, Error>;

    /// Open an incremental stream for one assistant turn.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, Error>;
}
