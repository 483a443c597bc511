//! Retry with exponential backoff

use super::ChunkTransport;
use bulkload_common::{ChunkData, ChunkResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and base delay for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,

    /// Delay after the first failed attempt; doubles after each further failure
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Delay after the 0-indexed `attempt` failed: `retry_delay * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Upload `chunk` up to `policy.max_retries` times.
///
/// A success carries the index of the attempt that succeeded as its
/// `retry_count`. When every attempt fails the result carries
/// `retry_count == max_retries` and the last error message. No delay
/// follows the final attempt.
pub async fn upload_chunk_with_retry<T>(
    transport: &T,
    chunk: &ChunkData,
    endpoint: &str,
    policy: &RetryPolicy,
) -> ChunkResult
where
    T: ChunkTransport + ?Sized,
{
    let mut last_error = None;

    for attempt in 0..policy.max_retries {
        debug!(session_id = %chunk.session_id, chunk_index = chunk.chunk_index, attempt, "Uploading chunk");

        let result = transport.upload_chunk(chunk, endpoint).await;
        if result.success {
            return result.with_retry_count(attempt);
        }
        last_error = result.error;

        if attempt + 1 < policy.max_retries {
            let backoff = policy.backoff(attempt);
            warn!(
                session_id = %chunk.session_id,
                chunk_index = chunk.chunk_index,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = last_error.as_deref().unwrap_or_default(),
                "Chunk upload failed, backing off"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    warn!(
        session_id = %chunk.session_id,
        chunk_index = chunk.chunk_index,
        attempts = policy.max_retries,
        "Chunk retry budget exhausted"
    );
    ChunkResult::failed(
        chunk.chunk_index,
        last_error.unwrap_or_else(|| "No upload attempts were made".to_string()),
    )
    .with_retry_count(policy.max_retries)
}
