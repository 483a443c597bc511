//! Chunk transport
//!
//! Sends one chunk to the upload endpoint. Every failure, whether a non-2xx
//! status or a request that never completed, comes back as a failed
//! [`ChunkResult`]; nothing in this layer returns an error to the caller.

pub mod client;
pub mod retry;

pub use client::HttpTransport;
pub use retry::{upload_chunk_with_retry, RetryPolicy};

use async_trait::async_trait;
use bulkload_common::{ChunkData, ChunkResult};

/// Something that can deliver a single chunk to an endpoint.
///
/// Implementations report `retry_count == 0`; retry accounting belongs to
/// [`upload_chunk_with_retry`].
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn upload_chunk(&self, chunk: &ChunkData, endpoint: &str) -> ChunkResult;
}

#[async_trait]
impl<T: ChunkTransport + ?Sized> ChunkTransport for std::sync::Arc<T> {
    async fn upload_chunk(&self, chunk: &ChunkData, endpoint: &str) -> ChunkResult {
        (**self).upload_chunk(chunk, endpoint).await
    }
}
