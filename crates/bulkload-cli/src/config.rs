//! Configuration management for the bulkload CLI
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `BULKLOAD_*` environment variables (a `.env` file is loaded first), then
//! command-line flags applied by the caller.

use crate::error::{CliError, Result};
use crate::transport::RetryPolicy;
use crate::upload::validate_api_endpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default chunk endpoint when none is configured
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:8000/api/v1/uploads/chunks";

/// Rows per uploaded chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Rows per parser event
pub const DEFAULT_PARSE_CHUNK_SIZE: usize = 1000;

/// 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub const DEFAULT_DELAY_BETWEEN_CHUNKS_MS: u64 = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Absolute URL chunks are POSTed to
    pub api_endpoint: String,

    /// Rows per uploaded chunk
    pub chunk_size: usize,

    /// Rows per parser event while reading the source file
    pub parse_chunk_size: usize,

    /// Largest accepted source file, in bytes
    pub max_file_size: u64,

    /// Accepted file extensions, without the dot
    pub allowed_file_types: Vec<String>,

    /// Idle time between sequential chunks
    pub delay_between_chunks_ms: u64,

    /// Attempts per chunk before it is recorded as failed
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts
    pub retry_delay_ms: u64,

    /// Chunks in flight per batch in parallel mode
    pub concurrency: usize,

    /// Per-request timeout; unset means the HTTP client default (none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Where the upload queue is persisted
    pub queue_path: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parse_chunk_size: DEFAULT_PARSE_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_file_types: vec!["xlsx".to_string(), "xls".to_string(), "csv".to_string()],
            delay_between_chunks_ms: DEFAULT_DELAY_BETWEEN_CHUNKS_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout_secs: None,
            queue_path: default_queue_path(),
        }
    }
}

/// `<data dir>/bulkload/queue.json`, or `.bulkload/queue.json` without a data dir
pub fn default_queue_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("bulkload"))
        .unwrap_or_else(|| PathBuf::from(".bulkload"))
        .join("queue.json")
}

/// `<config dir>/bulkload/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bulkload").join("config.toml"))
}

impl UploadConfig {
    /// Load defaults, then `path` (or the default config file if it exists),
    /// then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        // A missing .env is fine; a malformed one is not
        match dotenvy::dotenv() {
            Ok(_) => {},
            Err(e) if e.not_found() => {},
            Err(e) => return Err(CliError::config(format!("Failed to load .env: {}", e))),
        }

        config.merge_env()
    }

    /// Read a TOML config file; keys it omits keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override fields with any `BULKLOAD_*` variables that are set
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(endpoint) = std::env::var("BULKLOAD_API_ENDPOINT") {
            self.api_endpoint = endpoint;
        }
        if let Some(v) = env_parse("BULKLOAD_CHUNK_SIZE")? {
            self.chunk_size = v;
        }
        if let Some(v) = env_parse("BULKLOAD_PARSE_CHUNK_SIZE")? {
            self.parse_chunk_size = v;
        }
        if let Some(v) = env_parse("BULKLOAD_MAX_FILE_SIZE")? {
            self.max_file_size = v;
        }
        if let Ok(types) = std::env::var("BULKLOAD_ALLOWED_FILE_TYPES") {
            self.allowed_file_types = types
                .split(',')
                .map(|t| t.trim().trim_start_matches('.').to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(v) = env_parse("BULKLOAD_DELAY_BETWEEN_CHUNKS_MS")? {
            self.delay_between_chunks_ms = v;
        }
        if let Some(v) = env_parse("BULKLOAD_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("BULKLOAD_RETRY_DELAY_MS")? {
            self.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("BULKLOAD_CONCURRENCY")? {
            self.concurrency = v;
        }
        if let Some(v) = env_parse("BULKLOAD_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = Some(v);
        }
        if let Ok(path) = std::env::var("BULKLOAD_QUEUE_PATH") {
            self.queue_path = PathBuf::from(path);
        }

        Ok(self)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !validate_api_endpoint(&self.api_endpoint) || !is_http_url(&self.api_endpoint) {
            return Err(CliError::InvalidEndpoint(self.api_endpoint.clone()));
        }
        if self.chunk_size == 0 || self.parse_chunk_size == 0 {
            return Err(CliError::config("chunk sizes must be greater than zero"));
        }
        if self.max_retries == 0 {
            return Err(CliError::config("max_retries must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(CliError::config("concurrency must be at least 1"));
        }
        if self.allowed_file_types.is_empty() {
            return Err(CliError::config("allowed_file_types must not be empty"));
        }
        Ok(())
    }

    /// Check a source file against the size limit and allowed types.
    ///
    /// Returns the file size in bytes.
    pub fn validate_file(&self, path: &Path) -> Result<u64> {
        let file = path.display().to_string();
        let metadata = std::fs::metadata(path).map_err(|_| CliError::FileNotFound(file.clone()))?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self
            .allowed_file_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&extension))
        {
            return Err(CliError::UnsupportedFileType {
                file,
                extension,
                allowed: self.allowed_file_types.join(", "),
            });
        }

        if metadata.len() > self.max_file_size {
            return Err(CliError::FileTooLarge {
                file,
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        Ok(metadata.len())
    }

    pub fn delay_between_chunks(&self) -> Duration {
        Duration::from_millis(self.delay_between_chunks_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Render as TOML, as shown by `bulkload config show`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// The transport only speaks HTTP
fn is_http_url(endpoint: &str) -> bool {
    url::Url::parse(endpoint)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CliError::config(format!("{}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
