//! Sequential and bounded-concurrency upload drivers

use super::UploadObserver;
use crate::transport::{upload_chunk_with_retry, ChunkTransport, RetryPolicy};
use bulkload_common::{ChunkData, ChunkResult};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tracing::{debug, info};

/// Upload `chunks` one at a time in index order.
///
/// `observer.should_continue()` is polled before every chunk; when it
/// returns `false` the results gathered so far are returned. Callers detect
/// an early stop by comparing the result count with `chunks.len()`.
/// `delay_between_chunks` is spent between chunks, never after the last.
pub async fn upload_chunks_sequentially<T, O>(
    transport: &T,
    chunks: &[ChunkData],
    endpoint: &str,
    delay_between_chunks: Duration,
    policy: &RetryPolicy,
    observer: &mut O,
) -> Vec<ChunkResult>
where
    T: ChunkTransport + ?Sized,
    O: UploadObserver + ?Sized,
{
    let total = chunks.len();
    let mut results = Vec::with_capacity(total);

    for (i, chunk) in chunks.iter().enumerate() {
        if !observer.should_continue() {
            info!(completed = i, total, "Upload stopped before chunk {}", chunk.chunk_index);
            break;
        }

        let result = upload_chunk_with_retry(transport, chunk, endpoint, policy).await;
        debug!(
            chunk_index = result.chunk_index,
            success = result.success,
            retry_count = result.retry_count,
            "Chunk settled"
        );

        observer.on_chunk_complete(&result);
        observer.on_progress(&result, i + 1, total);
        results.push(result);

        if i + 1 < total && !delay_between_chunks.is_zero() {
            tokio::time::sleep(delay_between_chunks).await;
        }
    }

    results
}

/// Upload `chunks` in consecutive batches of `concurrency`.
///
/// Every chunk of a batch is in flight at once and the next batch starts
/// only after the whole batch has settled. Hooks fire in completion order
/// with a running completed count; the returned results are in index order.
/// This mode cannot be stopped part way.
pub async fn upload_chunks_parallel<T, O>(
    transport: &T,
    chunks: &[ChunkData],
    endpoint: &str,
    policy: &RetryPolicy,
    concurrency: usize,
    observer: &mut O,
) -> Vec<ChunkResult>
where
    T: ChunkTransport + ?Sized,
    O: UploadObserver + ?Sized,
{
    let total = chunks.len();
    let mut results = Vec::with_capacity(total);
    let mut completed = 0;

    for (batch_index, batch) in chunks.chunks(concurrency.max(1)).enumerate() {
        debug!(batch_index, size = batch.len(), "Dispatching batch");

        let mut in_flight: FuturesUnordered<_> = batch
            .iter()
            .enumerate()
            .map(|(slot, chunk)| async move {
                (slot, upload_chunk_with_retry(transport, chunk, endpoint, policy).await)
            })
            .collect();

        let mut settled: Vec<Option<ChunkResult>> = vec![None; batch.len()];
        while let Some((slot, result)) = in_flight.next().await {
            completed += 1;
            observer.on_chunk_complete(&result);
            observer.on_progress(&result, completed, total);
            settled[slot] = Some(result);
        }

        results.extend(settled.into_iter().flatten());
    }

    results
}

/// Re-upload previously failed chunks sequentially with a fresh retry budget
pub async fn retry_failed_chunks<T, O>(
    transport: &T,
    failed_chunks: &[ChunkData],
    endpoint: &str,
    policy: &RetryPolicy,
    delay_between_chunks: Duration,
    observer: &mut O,
) -> Vec<ChunkResult>
where
    T: ChunkTransport + ?Sized,
    O: UploadObserver + ?Sized,
{
    info!(chunks = failed_chunks.len(), "Retrying failed chunks");
    upload_chunks_sequentially(transport, failed_chunks, endpoint, delay_between_chunks, policy, observer).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::upload::{create_chunks, UploadCallbacks};
    use async_trait::async_trait;
    use bulkload_common::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds for every chunk, sleeping longer for lower indexes
    struct SlowFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChunkTransport for SlowFirst {
        async fn upload_chunk(&self, chunk: &ChunkData, _endpoint: &str) -> ChunkResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let wait = 100 - (chunk.chunk_index as u64 % 3) * 40;
            tokio::time::sleep(Duration::from_millis(wait)).await;
            ChunkResult::succeeded(chunk.chunk_index, chunk.record_count())
        }
    }

    fn chunks(n: usize) -> Vec<ChunkData> {
        create_chunks(&vec![Record::new(); n], 1, "s").unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_reports_completion_order_and_returns_index_order() {
        let transport = SlowFirst {
            calls: AtomicUsize::new(0),
        };
        let mut seen = Vec::new();
        let mut callbacks = UploadCallbacks::new().on_progress(|result, completed, total| {
            seen.push((result.chunk_index, completed, total));
        });

        let results = upload_chunks_parallel(&transport, &chunks(5), "http://x", &policy(), 3, &mut callbacks).await;
        drop(callbacks);

        let indexes: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);

        // Batch [0,1,2] settles fastest-first, then batch [3,4]
        let order: Vec<usize> = seen.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(order, vec![2, 1, 0, 4, 3]);
        let counts: Vec<usize> = seen.iter().map(|(_, c, _)| *c).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert!(seen.iter().all(|(_, _, t)| *t == 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_hook_order() {
        let transport = SlowFirst {
            calls: AtomicUsize::new(0),
        };
        let log = std::sync::Mutex::new(Vec::new());
        let mut callbacks = UploadCallbacks::new()
            .on_chunk_complete(|r| log.lock().unwrap().push(format!("complete {}", r.chunk_index)))
            .on_progress(|r, done, _| log.lock().unwrap().push(format!("progress {} {}", r.chunk_index, done)));

        let results = upload_chunks_sequentially(
            &transport,
            &chunks(2),
            "http://x",
            Duration::from_millis(100),
            &policy(),
            &mut callbacks,
        )
        .await;
        drop(callbacks);

        assert_eq!(results.len(), 2);
        assert_eq!(
            log.into_inner().unwrap(),
            vec!["complete 0", "progress 0 1", "complete 1", "progress 1 2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_last_chunk() {
        let transport = SlowFirst {
            calls: AtomicUsize::new(0),
        };
        let started = tokio::time::Instant::now();

        upload_chunks_sequentially(&transport, &chunks(3), "http://x", Duration::from_secs(10), &policy(), &mut ())
            .await;

        // 3 uploads (100 + 60 + 20 ms) and two 10s gaps
        assert_eq!(started.elapsed(), Duration::from_millis(20_180));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let transport = SlowFirst {
            calls: AtomicUsize::new(0),
        };
        assert!(upload_chunks_parallel(&transport, &[], "http://x", &policy(), 3, &mut ()).await.is_empty());
        assert!(retry_failed_chunks(&transport, &[], "http://x", &policy(), Duration::ZERO, &mut ())
            .await
            .is_empty());
    }
}
