//! Batch orchestration
//!
//! Drives a list of chunks through a [`ChunkTransport`](crate::transport::ChunkTransport),
//! one at a time or in bounded concurrent batches, and reports each outcome
//! through an [`UploadObserver`].

pub mod batch;
pub mod chunking;

pub use batch::{retry_failed_chunks, upload_chunks_parallel, upload_chunks_sequentially};
pub use chunking::{calculate_upload_stats, create_chunks, validate_api_endpoint};

use bulkload_common::ChunkResult;

/// Hooks invoked while a batch of chunks is uploaded.
///
/// For each chunk `on_chunk_complete` runs before `on_progress`.
/// `should_continue` is only consulted in sequential mode, before each chunk.
pub trait UploadObserver {
    /// Return `false` to stop before the next chunk
    fn should_continue(&mut self) -> bool {
        true
    }

    fn on_chunk_complete(&mut self, _result: &ChunkResult) {}

    /// `completed` counts chunks finished so far out of `total`
    fn on_progress(&mut self, _result: &ChunkResult, _completed: usize, _total: usize) {}
}

/// Observer that ignores everything and never stops
impl UploadObserver for () {}

type ProgressFn<'a> = Box<dyn FnMut(&ChunkResult, usize, usize) + Send + 'a>;
type ChunkCompleteFn<'a> = Box<dyn FnMut(&ChunkResult) + Send + 'a>;
type ContinueFn<'a> = Box<dyn FnMut() -> bool + Send + 'a>;

/// Closure-based [`UploadObserver`]; unset hooks do nothing.
#[derive(Default)]
pub struct UploadCallbacks<'a> {
    on_progress: Option<ProgressFn<'a>>,
    on_chunk_complete: Option<ChunkCompleteFn<'a>>,
    should_continue: Option<ContinueFn<'a>>,
}

impl<'a> UploadCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl FnMut(&ChunkResult, usize, usize) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_chunk_complete(mut self, f: impl FnMut(&ChunkResult) + Send + 'a) -> Self {
        self.on_chunk_complete = Some(Box::new(f));
        self
    }

    pub fn should_continue(mut self, f: impl FnMut() -> bool + Send + 'a) -> Self {
        self.should_continue = Some(Box::new(f));
        self
    }
}

impl UploadObserver for UploadCallbacks<'_> {
    fn should_continue(&mut self) -> bool {
        self.should_continue.as_mut().map_or(true, |f| f())
    }

    fn on_chunk_complete(&mut self, result: &ChunkResult) {
        if let Some(f) = self.on_chunk_complete.as_mut() {
            f(result);
        }
    }

    fn on_progress(&mut self, result: &ChunkResult, completed: usize, total: usize) {
        if let Some(f) = self.on_progress.as_mut() {
            f(result, completed, total);
        }
    }
}
