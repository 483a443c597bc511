//! Upload queue model
//!
//! An ordered, persisted list of per-file upload jobs. Only the
//! [`UploadCoordinator`] mutates it, and it saves the queue through a
//! [`QueueStore`] after every change.

pub mod coordinator;
pub mod store;

pub use coordinator::{QueueListener, UploadControl, UploadCoordinator, UploadMode};
pub use store::QueueStore;

use crate::error::{CliError, Result};
use bulkload_common::{ChunkData, ChunkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of one file upload
///
/// ```text
/// pending ──> uploading ──> success | failed | cancelled
///    │          │  ^                   │
///    │          v  │                   │ (retry failed chunks)
///    │        paused ──> cancelled     │
///    └──> cancelled        uploading <─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Paused,
    Success,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Paused => "paused",
            UploadStatus::Success => "success",
            UploadStatus::Failed => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }

    /// No further work happens without user action
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Success | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Pending, Cancelled)
                | (Uploading, Success)
                | (Uploading, Failed)
                | (Uploading, Cancelled)
                | (Uploading, Paused)
                | (Paused, Uploading)
                | (Paused, Cancelled)
                | (Failed, Uploading)
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source file identity captured at enqueue time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,

    /// SHA-256 of the file contents; a resume refuses a file that changed
    pub fingerprint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

/// A chunk whose retry budget ran out, kept with its payload for a manual retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedChunk {
    pub chunk: ChunkData,
    pub error: String,

    /// Attempts made across every run, including manual retries
    pub retry_count: u32,
}

/// One file's upload job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQueueItem {
    pub id: String,
    pub file: FileMetadata,

    /// Backend record the rows belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_record: Option<String>,

    /// Filter context the file was selected under
    #[serde(default)]
    pub filters: BTreeMap<String, String>,

    pub status: UploadStatus,

    /// 0-100, `uploaded_records / total_records`, rounded down
    pub progress: u8,
    pub uploaded_records: usize,
    pub total_records: usize,
    pub total_chunks: usize,

    /// Rows per chunk, fixed on the first run so a resume lines up with it
    #[serde(default)]
    pub chunk_size: usize,

    /// Number of chunks with a final outcome, `resolved_chunks.len()`
    #[serde(default)]
    pub chunks_resolved: usize,

    /// Indexes of chunks with a final outcome; a resume sends every other chunk
    #[serde(default)]
    pub resolved_chunks: BTreeSet<usize>,

    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub failed_chunks: Vec<FailedChunk>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileQueueItem {
    pub fn new(
        file: FileMetadata,
        matched_record: Option<String>,
        filters: BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            matched_record,
            filters,
            status: UploadStatus::Pending,
            progress: 0,
            uploaded_records: 0,
            total_records: 0,
            total_chunks: 0,
            chunk_size: 0,
            chunks_resolved: 0,
            resolved_chunks: BTreeSet::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
            error: None,
            failed_chunks: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `next`, rejecting anything outside the state machine
    pub fn transition(&mut self, next: UploadStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CliError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        if next == UploadStatus::Uploading && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        } else {
            self.completed_at = None;
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Fold one settled chunk into the counters.
    ///
    /// A failure keeps `chunk` for a later retry; a success clears any earlier
    /// failure entry for the same chunk index.
    pub fn record_result(&mut self, chunk: &ChunkData, result: &ChunkResult) {
        let position = self
            .failed_chunks
            .iter()
            .position(|f| f.chunk.chunk_index == result.chunk_index);
        let previous = position.map(|i| self.failed_chunks.remove(i));
        let earlier_attempts = previous.as_ref().map_or(0, |f| f.retry_count);
        let newly_resolved = self.resolved_chunks.insert(result.chunk_index);
        // A chunk that already succeeded is never counted twice
        let already_uploaded = !newly_resolved && previous.is_none();

        if result.success {
            if !already_uploaded {
                self.uploaded_records += result.records_processed;
            }
        } else {
            self.failed_chunks.push(FailedChunk {
                chunk: chunk.clone(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown upload error".to_string()),
                retry_count: earlier_attempts + result.retry_count,
            });
            self.failed_chunks.sort_by_key(|f| f.chunk.chunk_index);
        }

        self.chunks_resolved = self.resolved_chunks.len();
        self.progress = progress_percent(self.uploaded_records, self.total_records);
        self.updated_at = Utc::now();
    }

    /// Whether every record reached the endpoint
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
            && self.total_records > 0
            && self.resolved_chunks.len() >= self.total_chunks
            && self.uploaded_records >= self.total_records
    }

    pub fn failed_record_count(&self) -> usize {
        self.failed_chunks.iter().map(|f| f.chunk.record_count()).sum()
    }
}

/// `uploaded / total * 100`, rounded down so 100 means every record landed
pub(crate) fn progress_percent(uploaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((uploaded.min(total) * 100) / total) as u8
}

/// The persisted queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQueue {
    pub items: Vec<FileQueueItem>,

    /// The item being uploaded; at most one at a time
    pub current_upload_id: Option<String>,
    pub is_paused: bool,
    pub last_updated: DateTime<Utc>,
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current_upload_id: None,
            is_paused: false,
            last_updated: Utc::now(),
        }
    }
}

impl UploadQueue {
    pub fn get(&self, id: &str) -> Option<&FileQueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut FileQueueItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| CliError::QueueItemNotFound(id.to_string()))
    }

    /// Resolve a full id or a unique prefix of one
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        if self.get(id_or_prefix).is_some() {
            return Ok(id_or_prefix.to_string());
        }
        let mut matches = self
            .items
            .iter()
            .filter(|item| !id_or_prefix.is_empty() && item.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(item), None) => Ok(item.id.clone()),
            _ => Err(CliError::QueueItemNotFound(id_or_prefix.to_string())),
        }
    }

    /// Ids of items that still have work to do, in queue order
    pub fn runnable_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| matches!(item.status, UploadStatus::Pending | UploadStatus::Paused))
            .map(|item| item.id.clone())
            .collect()
    }

    /// Every item has reached a terminal status
    pub fn is_settled(&self) -> bool {
        self.items.iter().all(|item| item.status.is_terminal())
    }

    /// Items left `uploading` by a process that died become `paused`.
    ///
    /// Returns how many were recovered.
    pub fn recover_interrupted(&mut self) -> usize {
        let mut recovered = 0;
        for item in &mut self.items {
            if item.status == UploadStatus::Uploading {
                item.status = UploadStatus::Paused;
                item.updated_at = Utc::now();
                recovered += 1;
            }
        }
        if recovered > 0 {
            self.current_upload_id = None;
            self.is_paused = true;
        }
        recovered
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
