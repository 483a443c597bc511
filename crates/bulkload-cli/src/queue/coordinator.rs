//! Upload coordinator
//!
//! Owns the queue and is the only code that changes it. Each file goes
//! through the parser worker, is re-chunked to the upload chunk size and is
//! driven through the transport; the queue is saved after every settled
//! chunk and every status change.
//!
//! Pause and cancel requests arrive through an [`UploadControl`], which can
//! be cloned into a signal handler while an upload runs. Both are honoured
//! at the next chunk boundary in sequential mode; parallel mode runs an item
//! to completion.

use super::{FileMetadata, FileQueueItem, QueueStore, UploadQueue, UploadStatus};
use crate::config::UploadConfig;
use crate::error::{CliError, Result};
use crate::transport::ChunkTransport;
use crate::upload::{
    create_chunks, retry_failed_chunks, upload_chunks_parallel, upload_chunks_sequentially,
    UploadObserver,
};
use bulkload_common::fingerprint::{fingerprint_file, verify_fingerprint};
use bulkload_common::{BulkError, ChunkData, ChunkResult};
use bulkload_ingest::{FileSource, ParseRequest, ParserHandle, WorkerOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// How an item's chunks are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// One chunk at a time; pause and cancel take effect between chunks
    #[default]
    Sequential,
    /// Batches of `concurrency` chunks; runs to completion
    Parallel,
}

/// Shared pause/cancel flags for the running upload
#[derive(Debug, Clone, Default)]
pub struct UploadControl {
    pause: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl UploadControl {
    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn stop_requested(&self) -> bool {
        self.is_paused() || self.is_cancelled()
    }

    fn reset(&self) {
        self.pause.store(false, Ordering::SeqCst);
        self.cancel.store(false, Ordering::SeqCst);
    }
}

/// Read-only view of queue activity, for progress display
pub trait QueueListener {
    fn on_item_started(&mut self, _item: &FileQueueItem) {}

    fn on_item_progress(&mut self, _item: &FileQueueItem, _result: &ChunkResult) {}

    fn on_item_finished(&mut self, _item: &FileQueueItem) {}
}

impl QueueListener for () {}

/// How an upload run ended, before it is turned into a status
enum RunOutcome {
    /// Every chunk of the run settled
    Finished,
    /// Pause or cancel stopped the run early
    Stopped,
    /// The source file could not be decoded
    ParseFailed(String),
}

pub struct UploadCoordinator<T> {
    transport: T,
    config: UploadConfig,
    store: QueueStore,
    queue: UploadQueue,
    parser: ParserHandle,
    control: UploadControl,
}

impl<T: ChunkTransport> UploadCoordinator<T> {
    /// Load the queue at `config.queue_path` and start a parser worker.
    ///
    /// Items a previous process left `uploading` are marked `paused`.
    pub fn open(config: UploadConfig, transport: T) -> Result<Self> {
        Self::open_with_parser(config, transport, WorkerOptions::default())
    }

    pub fn open_with_parser(config: UploadConfig, transport: T, options: WorkerOptions) -> Result<Self> {
        let store = QueueStore::new(&config.queue_path);
        let mut queue = store.load()?;

        let recovered = queue.recover_interrupted();
        if recovered > 0 {
            warn!(recovered, "Interrupted uploads marked as paused");
            queue.touch();
            store.save(&queue)?;
        }

        Ok(Self {
            transport,
            config,
            store,
            queue,
            parser: ParserHandle::spawn(options),
            control: UploadControl::default(),
        })
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle for pausing or cancelling the running upload from elsewhere
    pub fn control(&self) -> UploadControl {
        self.control.clone()
    }

    /// Validate `path` and add it to the end of the queue as `pending`.
    ///
    /// Returns the new item's id.
    pub fn enqueue(
        &mut self,
        path: &Path,
        sheet_name: Option<String>,
        matched_record: Option<String>,
        filters: BTreeMap<String, String>,
    ) -> Result<String> {
        let size = self.config.validate_file(path)?;
        let path = std::fs::canonicalize(path)?;
        let fingerprint = fingerprint_file(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let item = FileQueueItem::new(
            FileMetadata {
                name,
                path,
                size,
                fingerprint,
                sheet_name,
            },
            matched_record,
            filters,
        );
        let id = item.id.clone();

        info!(id = %id, file = %item.file.name, size, "Upload queued");
        self.queue.items.push(item);
        self.persist()?;
        Ok(id)
    }

    /// Upload one `pending` or `paused` item.
    ///
    /// A paused item sends only the chunks without a final outcome, with the
    /// same session id, provided the source file is unchanged.
    pub async fn process_item<L>(&mut self, id: &str, mode: UploadMode, listener: &mut L) -> Result<FileQueueItem>
    where
        L: QueueListener + ?Sized,
    {
        let id = self.queue.resolve_id(id)?;
        let item = self.item(&id)?;
        if !matches!(item.status, UploadStatus::Pending | UploadStatus::Paused) {
            return Err(CliError::InvalidTransition {
                id,
                from: item.status,
                to: UploadStatus::Uploading,
            });
        }
        let failed_chunks_only = item.total_chunks > 0 && item.chunks_resolved >= item.total_chunks;

        self.begin(&id, listener)?;
        let outcome = if failed_chunks_only {
            self.run_failed_chunks(&id, listener).await
        } else {
            self.run_upload(&id, mode, listener).await
        };
        self.finish(&id, outcome, listener)
    }

    /// Upload every `pending` and `paused` item in queue order.
    ///
    /// Stops early when a pause is requested. Once every item is terminal the
    /// queue's current upload and pause flag are cleared.
    pub async fn process_pending<L>(&mut self, mode: UploadMode, listener: &mut L) -> Result<Vec<FileQueueItem>>
    where
        L: QueueListener + ?Sized,
    {
        let mut processed = Vec::new();

        for id in self.queue.runnable_ids() {
            if self.control.is_paused() {
                break;
            }

            match self.process_item(&id, mode, listener).await {
                Ok(item) => {
                    let paused = item.status == UploadStatus::Paused;
                    processed.push(item);
                    if paused {
                        break;
                    }
                },
                Err(CliError::Common(BulkError::FingerprintMismatch { .. })) => {
                    warn!(id = %id, "Source file changed since it was queued, skipping");
                    let item = self.queue.get_mut(&id)?;
                    item.error = Some(
                        "Source file changed since it was queued. Remove it and upload again.".to_string(),
                    );
                    self.persist()?;
                },
                Err(e) => return Err(e),
            }
        }

        if self.queue.is_settled() && (self.queue.current_upload_id.is_some() || self.queue.is_paused) {
            self.queue.current_upload_id = None;
            self.queue.is_paused = false;
            self.persist()?;
            info!("Upload queue complete");
        }

        Ok(processed)
    }

    /// Ask the running upload to pause at its next chunk boundary
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Continue a paused item
    pub async fn resume<L>(&mut self, id: &str, mode: UploadMode, listener: &mut L) -> Result<FileQueueItem>
    where
        L: QueueListener + ?Sized,
    {
        let id = self.queue.resolve_id(id)?;
        let status = self.item(&id)?.status;
        if status != UploadStatus::Paused {
            return Err(CliError::InvalidTransition {
                id,
                from: status,
                to: UploadStatus::Uploading,
            });
        }
        self.process_item(&id, mode, listener).await
    }

    /// Cancel a queued or paused item
    pub fn cancel(&mut self, id: &str) -> Result<FileQueueItem> {
        let id = self.queue.resolve_id(id)?;
        let item = self.queue.get_mut(&id)?;
        item.transition(UploadStatus::Cancelled)?;
        let snapshot = item.clone();

        if self.queue.current_upload_id.as_deref() == Some(id.as_str()) {
            self.queue.current_upload_id = None;
        }
        info!(id = %id, "Upload cancelled");
        self.persist()?;
        Ok(snapshot)
    }

    /// Resubmit the stored payloads of a `failed` item's failed chunks.
    ///
    /// An item that failed before any chunk was built (its file did not
    /// parse) is uploaded again from the start.
    pub async fn retry_failed<L>(&mut self, id: &str, listener: &mut L) -> Result<FileQueueItem>
    where
        L: QueueListener + ?Sized,
    {
        let id = self.queue.resolve_id(id)?;
        let item = self.item(&id)?;
        if item.status != UploadStatus::Failed {
            return Err(CliError::InvalidTransition {
                id,
                from: item.status,
                to: UploadStatus::Uploading,
            });
        }

        if item.failed_chunks.is_empty() {
            let fingerprint = fingerprint_file(&item.file.path)?;
            let item = self.queue.get_mut(&id)?;
            item.file.fingerprint = fingerprint;
            item.uploaded_records = 0;
            item.total_records = 0;
            item.total_chunks = 0;
            item.chunk_size = 0;
            item.chunks_resolved = 0;
            item.resolved_chunks.clear();
            item.progress = 0;

            self.begin(&id, listener)?;
            let outcome = self.run_upload(&id, UploadMode::Sequential, listener).await;
            return self.finish(&id, outcome, listener);
        }

        self.begin(&id, listener)?;
        let outcome = self.run_failed_chunks(&id, listener).await;
        self.finish(&id, outcome, listener)
    }

    /// Remove an item that is not uploading
    pub fn remove(&mut self, id: &str) -> Result<FileQueueItem> {
        let id = self.queue.resolve_id(id)?;
        if self.item(&id)?.status == UploadStatus::Uploading {
            return Err(CliError::UploadInProgress(id));
        }

        let position = self
            .queue
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CliError::QueueItemNotFound(id.clone()))?;
        let removed = self.queue.items.remove(position);
        info!(id = %id, "Upload removed from queue");
        self.persist()?;
        Ok(removed)
    }

    /// Drop `success` and `cancelled` items; failed items stay for retry.
    ///
    /// Returns how many items were removed.
    pub fn clear_finished(&mut self) -> Result<usize> {
        let before = self.queue.items.len();
        self.queue
            .items
            .retain(|item| !matches!(item.status, UploadStatus::Success | UploadStatus::Cancelled));
        let removed = before - self.queue.items.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Forget every item and delete the queue file
    pub fn reset(&mut self) -> Result<()> {
        self.queue = UploadQueue::default();
        self.control.reset();
        self.store.clear()?;
        info!("Upload queue reset");
        Ok(())
    }

    /// Stop the parser worker
    pub async fn shutdown(self) {
        self.parser.shutdown().await;
    }

    fn item(&self, id: &str) -> Result<&FileQueueItem> {
        self.queue
            .get(id)
            .ok_or_else(|| CliError::QueueItemNotFound(id.to_string()))
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.queue
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CliError::QueueItemNotFound(id.to_string()))
    }

    fn persist(&mut self) -> Result<()> {
        self.queue.touch();
        self.store.save(&self.queue)
    }

    /// Mark `id` as the current upload and move it to `uploading`
    fn begin<L>(&mut self, id: &str, listener: &mut L) -> Result<()>
    where
        L: QueueListener + ?Sized,
    {
        if let Some(current) = self.queue.current_upload_id.as_deref() {
            if current != id {
                return Err(CliError::UploadInProgress(current.to_string()));
            }
        }

        let item = self.queue.get_mut(id)?;
        if item.status == UploadStatus::Paused {
            verify_fingerprint(&item.file.path, &item.file.fingerprint)?;
        }
        item.transition(UploadStatus::Uploading)?;
        item.error = None;
        info!(id = %id, file = %item.file.name, session_id = %item.session_id, "Upload started");

        self.control.reset();
        self.queue.current_upload_id = Some(id.to_string());
        self.queue.is_paused = false;
        self.persist()?;

        listener.on_item_started(self.item(id)?);
        Ok(())
    }

    /// Parse the item's file and send every chunk not yet resolved
    async fn run_upload<L>(&mut self, id: &str, mode: UploadMode, listener: &mut L) -> Result<RunOutcome>
    where
        L: QueueListener + ?Sized,
    {
        let index = self.index_of(id)?;
        let item = &self.queue.items[index];
        let mut request = ParseRequest::new(FileSource::path(&item.file.path), self.config.parse_chunk_size);
        if let Some(sheet) = &item.file.sheet_name {
            request = request.with_sheet(sheet.clone());
        }
        let session_id = item.session_id.clone();
        let chunk_size = if item.chunk_size > 0 {
            item.chunk_size
        } else {
            self.config.chunk_size
        };

        let parsed = match self.parser.parse_to_end(request).await {
            Ok(parsed) => parsed,
            Err(e) => return Ok(RunOutcome::ParseFailed(e.to_string())),
        };
        let chunks = create_chunks(&parsed.rows, chunk_size, &session_id)?;

        let item = &mut self.queue.items[index];
        item.chunk_size = chunk_size;
        item.total_records = parsed.total_rows;
        item.total_chunks = chunks.len();
        let remaining: Vec<ChunkData> = chunks
            .iter()
            .filter(|chunk| !item.resolved_chunks.contains(&chunk.chunk_index))
            .cloned()
            .collect();
        if remaining.len() < chunks.len() {
            info!(
                id = %id,
                remaining = remaining.len(),
                total_chunks = chunks.len(),
                "Resuming upload"
            );
        }
        self.persist()?;

        let policy = self.config.retry_policy();
        let mut recorder = ItemRecorder {
            queue: &mut self.queue,
            store: &self.store,
            control: &self.control,
            listener,
            index,
            chunks: &chunks,
            save_error: None,
        };

        let results = match mode {
            UploadMode::Sequential => {
                upload_chunks_sequentially(
                    &self.transport,
                    &remaining,
                    &self.config.api_endpoint,
                    self.config.delay_between_chunks(),
                    &policy,
                    &mut recorder,
                )
                .await
            },
            UploadMode::Parallel => {
                upload_chunks_parallel(
                    &self.transport,
                    &remaining,
                    &self.config.api_endpoint,
                    &policy,
                    self.config.concurrency,
                    &mut recorder,
                )
                .await
            },
        };

        if let Some(e) = recorder.save_error {
            return Err(e);
        }
        Ok(if results.len() < remaining.len() {
            RunOutcome::Stopped
        } else {
            RunOutcome::Finished
        })
    }

    /// Resubmit the item's failed chunks with a fresh retry budget
    async fn run_failed_chunks<L>(&mut self, id: &str, listener: &mut L) -> Result<RunOutcome>
    where
        L: QueueListener + ?Sized,
    {
        let index = self.index_of(id)?;
        let payloads: Vec<ChunkData> = self.queue.items[index]
            .failed_chunks
            .iter()
            .map(|failed| failed.chunk.clone())
            .collect();

        let policy = self.config.retry_policy();
        let mut recorder = ItemRecorder {
            queue: &mut self.queue,
            store: &self.store,
            control: &self.control,
            listener,
            index,
            chunks: &payloads,
            save_error: None,
        };

        let results = retry_failed_chunks(
            &self.transport,
            &payloads,
            &self.config.api_endpoint,
            &policy,
            self.config.delay_between_chunks(),
            &mut recorder,
        )
        .await;

        if let Some(e) = recorder.save_error {
            return Err(e);
        }
        Ok(if results.len() < payloads.len() {
            RunOutcome::Stopped
        } else {
            RunOutcome::Finished
        })
    }

    /// Turn a run's outcome into the item's next status and release the queue
    fn finish<L>(&mut self, id: &str, outcome: Result<RunOutcome>, listener: &mut L) -> Result<FileQueueItem>
    where
        L: QueueListener + ?Sized,
    {
        let cancelled = self.control.is_cancelled();
        let item = self.queue.get_mut(id)?;

        let mut paused = false;
        let run_error = match outcome {
            Ok(RunOutcome::Finished) if item.is_complete() => {
                item.transition(UploadStatus::Success)?;
                None
            },
            Ok(RunOutcome::Finished) => {
                item.error = Some(format!(
                    "{} of {} chunks failed",
                    item.failed_chunks.len(),
                    item.total_chunks
                ));
                item.transition(UploadStatus::Failed)?;
                None
            },
            Ok(RunOutcome::ParseFailed(message)) => {
                item.error = Some(message);
                item.transition(UploadStatus::Failed)?;
                None
            },
            Ok(RunOutcome::Stopped) if cancelled => {
                item.transition(UploadStatus::Cancelled)?;
                None
            },
            Ok(RunOutcome::Stopped) => {
                item.transition(UploadStatus::Paused)?;
                paused = true;
                None
            },
            Err(e) => {
                item.error = Some(e.to_string());
                item.transition(UploadStatus::Paused)?;
                paused = true;
                Some(e)
            },
        };

        info!(
            id = %id,
            status = %item.status,
            progress = item.progress,
            uploaded_records = item.uploaded_records,
            total_records = item.total_records,
            failed_chunks = item.failed_chunks.len(),
            "Upload finished"
        );
        let snapshot = item.clone();

        self.queue.current_upload_id = None;
        if paused {
            self.queue.is_paused = true;
        }
        let saved = self.persist();

        listener.on_item_finished(&snapshot);
        match run_error {
            Some(e) => Err(e),
            None => saved.map(|_| snapshot),
        }
    }
}

/// Folds chunk results into one queue item and saves after each
struct ItemRecorder<'a, L: ?Sized> {
    queue: &'a mut UploadQueue,
    store: &'a QueueStore,
    control: &'a UploadControl,
    listener: &'a mut L,
    index: usize,
    chunks: &'a [ChunkData],
    save_error: Option<CliError>,
}

/// Chunks are usually stored by index; retried payloads are not
fn find_chunk(chunks: &[ChunkData], chunk_index: usize) -> Option<&ChunkData> {
    chunks
        .get(chunk_index)
        .filter(|c| c.chunk_index == chunk_index)
        .or_else(|| chunks.iter().find(|c| c.chunk_index == chunk_index))
}

impl<L: QueueListener + ?Sized> UploadObserver for ItemRecorder<'_, L> {
    fn should_continue(&mut self) -> bool {
        self.save_error.is_none() && !self.control.stop_requested()
    }

    fn on_chunk_complete(&mut self, result: &ChunkResult) {
        let chunks = self.chunks;
        let Some(chunk) = find_chunk(chunks, result.chunk_index) else {
            warn!(chunk_index = result.chunk_index, "Result for unknown chunk ignored");
            return;
        };
        self.queue.items[self.index].record_result(chunk, result);
        self.queue.touch();

        if self.save_error.is_none() {
            if let Err(e) = self.store.save(self.queue) {
                warn!(error = %e, "Failed to save upload queue");
                self.save_error = Some(e);
            }
        }
    }

    fn on_progress(&mut self, result: &ChunkResult, _completed: usize, _total: usize) {
        self.listener.on_item_progress(&self.queue.items[self.index], result);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_control_flags() {
        let control = UploadControl::default();
        let remote = control.clone();
        assert!(!control.stop_requested());

        remote.pause();
        assert!(control.is_paused());
        assert!(control.stop_requested());

        control.reset();
        remote.cancel();
        assert!(!control.is_paused());
        assert!(control.is_cancelled());
    }
}
