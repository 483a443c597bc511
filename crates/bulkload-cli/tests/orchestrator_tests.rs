//! Integration tests for batch orchestration
//!
//! These use in-memory transports and a paused tokio clock:
//! - Retry accounting with an always-failing transport
//! - Exponential backoff timing
//! - Cooperative cancellation in sequential mode
//! - Batch boundaries in parallel mode
//! - Aggregate statistics

use async_trait::async_trait;
use bulkload_cli::transport::{upload_chunk_with_retry, ChunkTransport, RetryPolicy};
use bulkload_cli::upload::{
    calculate_upload_stats, create_chunks, retry_failed_chunks, upload_chunks_parallel,
    upload_chunks_sequentially, UploadCallbacks,
};
use bulkload_common::{ChunkData, ChunkResult, Record, UploadStats};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const ENDPOINT: &str = "http://uploads.test/api/v1/uploads/chunks";

fn rows(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let mut record = Record::new();
            record.insert("row".to_string(), json!(i));
            record
        })
        .collect()
}

/// Rejects everything and records when each attempt happened
#[derive(Default)]
struct AlwaysFail {
    attempts: Mutex<HashMap<usize, Vec<Instant>>>,
}

#[async_trait]
impl ChunkTransport for AlwaysFail {
    async fn upload_chunk(&self, chunk: &ChunkData, _endpoint: &str) -> ChunkResult {
        self.attempts
            .lock()
            .unwrap()
            .entry(chunk.chunk_index)
            .or_default()
            .push(Instant::now());
        ChunkResult::failed(chunk.chunk_index, "HTTP 503 Service Unavailable")
    }
}

/// Accepts every chunk except the listed indexes, tracking concurrency
#[derive(Default)]
struct Scripted {
    fail: HashSet<usize>,
    seen: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl Scripted {
    fn failing(indexes: &[usize]) -> Self {
        Self {
            fail: indexes.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChunkTransport for Scripted {
    async fn upload_chunk(&self, chunk: &ChunkData, _endpoint: &str) -> ChunkResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().unwrap().push(chunk.chunk_index);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.contains(&chunk.chunk_index) {
            ChunkResult::failed(chunk.chunk_index, "HTTP 400 Bad Request")
        } else {
            ChunkResult::succeeded(chunk.chunk_index, chunk.record_count())
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_transport_exhausts_each_chunk() {
    let transport = AlwaysFail::default();
    let chunks = create_chunks(&rows(8), 2, "s-fail").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let results =
        upload_chunks_sequentially(&transport, &chunks, ENDPOINT, Duration::from_millis(100), &policy, &mut ())
            .await;

    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.retry_count, 3);
        assert_eq!(result.records_processed, 0);
        assert_eq!(result.error.as_deref(), Some("HTTP 503 Service Unavailable"));
    }

    let attempts = transport.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 4);
    assert!(attempts.values().all(|times| times.len() == 3));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let transport = AlwaysFail::default();
    let chunk = create_chunks(&rows(1), 1, "s-backoff").unwrap().remove(0);
    let policy = RetryPolicy::new(4, Duration::from_millis(1000));

    let started = Instant::now();
    let result = upload_chunk_with_retry(&transport, &chunk, ENDPOINT, &policy).await;
    let finished = Instant::now();

    assert_eq!(result.retry_count, 4);
    let attempts = transport.attempts.lock().unwrap();
    let times = &attempts[&0];
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000)
        ]
    );

    // No backoff after the final attempt
    assert_eq!(times[0], started);
    assert_eq!(finished, times[3]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_after_two_of_five_chunks() {
    let transport = Scripted::default();
    let chunks = create_chunks(&rows(10), 2, "s-cancel").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let mut checks = 0;
    let mut callbacks = UploadCallbacks::new().should_continue(|| {
        checks += 1;
        checks <= 2
    });
    let results =
        upload_chunks_sequentially(&transport, &chunks, ENDPOINT, Duration::from_millis(100), &policy, &mut callbacks)
            .await;
    drop(callbacks);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(*transport.seen.lock().unwrap(), vec![0, 1]);
    assert_eq!(checks, 3);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_progress_counts() {
    let transport = Scripted::default();
    let chunks = create_chunks(&rows(5), 2, "s-progress").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let mut progress = Vec::new();
    let mut callbacks = UploadCallbacks::new().on_progress(|result, done, total| {
        progress.push((result.chunk_index, done, total));
    });
    upload_chunks_sequentially(&transport, &chunks, ENDPOINT, Duration::ZERO, &policy, &mut callbacks).await;
    drop(callbacks);

    assert_eq!(progress, vec![(0, 1, 3), (1, 2, 3), (2, 3, 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_respects_concurrency_and_batches() {
    let transport = Scripted::with_latency(Duration::from_millis(50));
    let chunks = create_chunks(&rows(7), 1, "s-parallel").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let started = Instant::now();
    let results = upload_chunks_parallel(&transport, &chunks, ENDPOINT, &policy, 3, &mut ()).await;

    assert_eq!(results.len(), 7);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 3);
    // Batches of 3, 3 and 1, each one latency long
    assert_eq!(started.elapsed(), Duration::from_millis(150));

    let seen = transport.seen.lock().unwrap();
    let first_batch: HashSet<usize> = seen[..3].iter().copied().collect();
    assert_eq!(first_batch, HashSet::from([0, 1, 2]));
    assert_eq!(seen[6], 6);
}

#[tokio::test(start_paused = true)]
async fn test_stats_for_successful_and_failed_chunks() {
    let transport = Scripted::failing(&[5, 6]);
    let chunks = create_chunks(&rows(70), 10, "s-stats").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let results = upload_chunks_sequentially(&transport, &chunks, ENDPOINT, Duration::ZERO, &policy, &mut ()).await;

    assert_eq!(
        calculate_upload_stats(&results),
        UploadStats {
            total_chunks: 7,
            successful_chunks: 5,
            failed_chunks: 2,
            total_records: 50,
            successful_records: 50,
            failed_records: 0,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_failed_chunks_gets_fresh_budget() {
    let chunks = create_chunks(&rows(6), 2, "s-retry").unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));

    let failing = AlwaysFail::default();
    let first = upload_chunks_sequentially(&failing, &chunks, ENDPOINT, Duration::ZERO, &policy, &mut ()).await;
    let failed: Vec<ChunkData> = first
        .iter()
        .filter(|r| !r.success)
        .map(|r| chunks[r.chunk_index].clone())
        .collect();
    assert_eq!(failed.len(), 3);

    let healthy = Scripted::default();
    let retried = retry_failed_chunks(&healthy, &failed, ENDPOINT, &policy, Duration::ZERO, &mut ()).await;

    assert!(retried.iter().all(|r| r.success && r.retry_count == 0));
    assert_eq!(*healthy.seen.lock().unwrap(), vec![0, 1, 2]);
    assert!(failed.iter().all(|c| c.session_id == "s-retry"));
}
