//! File parser worker
//!
//! An actor that owns spreadsheet decoding. Callers talk to it only through
//! channels: one inbound [`ParseRequest`] per file, and an outbound stream of
//! [`ParserEvent`]s for each request:
//!
//! ```text
//! start { totalRows, headers }
//! chunk { data, chunkIndex, progress }   (zero or more, ascending index)
//! complete { totalRows }  |  error { error }
//! ```
//!
//! Decoding runs on the blocking thread pool so a large workbook never
//! stalls the async runtime. A failed parse produces exactly one `error`
//! event and nothing else; chunks are only emitted once the whole sheet has
//! decoded successfully.

use crate::error::{DecodeError, Result};
use crate::rows::sheet_to_parsed;
use crate::workbook::{read_sheet, FileSource};
use bulkload_common::{ParsedData, Record};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pause between chunk events so a slow consumer's queue is not flooded
pub const DEFAULT_EMIT_DELAY: Duration = Duration::from_millis(10);

/// Outbound events buffered before the worker waits on the consumer
pub const DEFAULT_EVENT_BUFFER: usize = 16;

/// Request to parse one file
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub file: FileSource,

    /// Rows per `chunk` event
    pub chunk_size: usize,

    /// Sheet to read; the first sheet when `None`
    pub sheet_name: Option<String>,
}

impl ParseRequest {
    pub fn new(file: FileSource, chunk_size: usize) -> Self {
        Self {
            file,
            chunk_size,
            sheet_name: None,
        }
    }

    pub fn with_sheet(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }
}

/// Event emitted by the worker while serving a [`ParseRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ParserEvent {
    Start {
        total_rows: usize,
        headers: Vec<String>,
    },
    Chunk {
        data: Vec<Record>,
        chunk_index: usize,
        /// Rounded percentage of rows emitted so far, 0-100
        progress: u8,
    },
    Complete {
        total_rows: usize,
    },
    Error {
        error: String,
    },
}

impl ParserEvent {
    /// Whether this event ends the stream for its request
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParserEvent::Complete { .. } | ParserEvent::Error { .. })
    }
}

/// Tuning knobs for a spawned worker
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub emit_delay: Duration,
    pub event_buffer: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            emit_delay: DEFAULT_EMIT_DELAY,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

struct ParserWorker {
    requests: mpsc::Receiver<ParseRequest>,
    events: mpsc::Sender<ParserEvent>,
    emit_delay: Duration,
}

/// The consumer dropped its event receiver
struct ConsumerGone;

impl ParserWorker {
    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            if self.serve(request).await.is_err() {
                debug!("Parser event receiver dropped, stopping worker");
                break;
            }
        }
        debug!("Parser worker stopped");
    }

    async fn serve(&self, request: ParseRequest) -> std::result::Result<(), ConsumerGone> {
        let file_name = request.file.name();
        let chunk_size = request.chunk_size;
        info!(file = %file_name, chunk_size, sheet = ?request.sheet_name, "Parsing file");

        let parsed = match decode(request).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Parse failed");
                return self
                    .send(ParserEvent::Error {
                        error: e.to_string(),
                    })
                    .await;
            },
        };

        let total_rows = parsed.total_rows;
        self.send(ParserEvent::Start {
            total_rows,
            headers: parsed.headers,
        })
        .await?;

        let mut rows = parsed.rows.into_iter();
        let mut emitted = 0usize;
        let mut chunk_index = 0usize;

        loop {
            let data: Vec<Record> = rows.by_ref().take(chunk_size).collect();
            if data.is_empty() {
                break;
            }

            if chunk_index > 0 && !self.emit_delay.is_zero() {
                tokio::time::sleep(self.emit_delay).await;
            }

            emitted += data.len();
            self.send(ParserEvent::Chunk {
                data,
                chunk_index,
                progress: progress_percent(emitted, total_rows),
            })
            .await?;
            chunk_index += 1;
        }

        info!(file = %file_name, total_rows, chunks = chunk_index, "Parse complete");
        self.send(ParserEvent::Complete { total_rows }).await
    }

    async fn send(&self, event: ParserEvent) -> std::result::Result<(), ConsumerGone> {
        self.events.send(event).await.map_err(|_| ConsumerGone)
    }
}

async fn decode(request: ParseRequest) -> Result<ParsedData> {
    if request.chunk_size == 0 {
        return Err(DecodeError::InvalidChunkSize);
    }

    let ParseRequest {
        file, sheet_name, ..
    } = request;

    tokio::task::spawn_blocking(move || {
        read_sheet(file, sheet_name.as_deref()).and_then(sheet_to_parsed)
    })
    .await
    .map_err(|e| DecodeError::Reported(format!("Parser task failed: {}", e)))?
}

fn progress_percent(emitted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((emitted as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Caller side of a running parser worker
pub struct ParserHandle {
    requests: mpsc::Sender<ParseRequest>,
    events: mpsc::Receiver<ParserEvent>,
    task: JoinHandle<()>,
}

impl ParserHandle {
    /// Spawn a worker on the current tokio runtime
    pub fn spawn(options: WorkerOptions) -> Self {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::channel(options.event_buffer.max(1));

        let worker = ParserWorker {
            requests: request_rx,
            events: event_tx,
            emit_delay: options.emit_delay,
        };

        Self {
            requests: request_tx,
            events: event_rx,
            task: tokio::spawn(worker.run()),
        }
    }

    /// Queue a parse; its events arrive through [`ParserHandle::next_event`]
    pub async fn parse(&self, request: ParseRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| DecodeError::WorkerClosed)
    }

    /// Next event from the worker, `None` once the worker has stopped
    pub async fn next_event(&mut self) -> Option<ParserEvent> {
        self.events.recv().await
    }

    /// Parse a file and accumulate its chunks into a [`ParsedData`]
    pub async fn parse_to_end(&mut self, request: ParseRequest) -> Result<ParsedData> {
        self.parse_with(request, |_| {}).await
    }

    /// Like [`ParserHandle::parse_to_end`], calling `on_event` for every event
    pub async fn parse_with<F>(&mut self, request: ParseRequest, mut on_event: F) -> Result<ParsedData>
    where
        F: FnMut(&ParserEvent),
    {
        self.parse(request).await?;

        let mut headers = Vec::new();
        let mut rows = Vec::new();

        loop {
            let event = self.next_event().await.ok_or(DecodeError::WorkerClosed)?;
            on_event(&event);

            match event {
                ParserEvent::Start {
                    total_rows,
                    headers: h,
                } => {
                    headers = h;
                    rows.reserve(total_rows);
                },
                ParserEvent::Chunk { data, .. } => rows.extend(data),
                ParserEvent::Complete { .. } => return Ok(ParsedData::new(headers, rows)),
                ParserEvent::Error { error } => return Err(DecodeError::Reported(error)),
            }
        }
    }

    /// Stop accepting requests and wait for the worker to finish
    pub async fn shutdown(self) {
        let Self { requests, events, task } = self;
        drop(requests);
        drop(events);
        if let Err(e) = task.await {
            warn!(error = %e, "Parser worker ended abnormally");
        }
    }
}
