//! Common types used across bulkload
//!
//! These are the payloads that flow between the parser worker, the batch
//! orchestrator and the upload endpoint. Everything that crosses the wire
//! is serialized in camelCase to match the endpoint contract.

use serde::{Deserialize, Serialize};

/// One parsed row, keyed by header name in header order
pub type Record = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Parsed Data
// ============================================================================

/// A fully parsed sheet.
///
/// Produced once per parse and never mutated afterwards. Rows carry every
/// header as a key; cells missing from the source are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedData {
    /// Column names taken from the header row
    pub headers: Vec<String>,

    /// Data rows in source order
    pub rows: Vec<Record>,

    /// Number of data rows (excludes the header row)
    pub total_rows: usize,
}

impl ParsedData {
    pub fn new(headers: Vec<String>, rows: Vec<Record>) -> Self {
        let total_rows = rows.len();
        Self {
            headers,
            rows,
            total_rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Upload Chunks
// ============================================================================

/// A bounded slice of a row set, tagged with its position for reassembly.
///
/// `end_index - start_index == data.len()` for every chunk produced by
/// chunking a contiguous row set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    /// Zero-based position of this chunk within the upload
    pub chunk_index: usize,

    /// Rows carried by this chunk
    pub data: Vec<Record>,

    /// Identifier grouping every chunk of one upload attempt
    pub session_id: String,

    /// Number of chunks in the upload, embedded for receiver-side checks
    pub total_chunks: usize,

    /// Index of the first row in the source row set
    pub start_index: usize,

    /// One past the index of the last row in the source row set
    pub end_index: usize,
}

impl ChunkData {
    /// Number of records carried by this chunk
    pub fn record_count(&self) -> usize {
        self.data.len()
    }
}

/// Outcome of uploading one chunk, after any retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResult {
    pub chunk_index: usize,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Records accepted by the endpoint; always 0 for a failed chunk
    pub records_processed: usize,

    /// Attempts that preceded the final outcome
    pub retry_count: u32,
}

impl ChunkResult {
    /// A successful first-attempt result
    pub fn succeeded(chunk_index: usize, records_processed: usize) -> Self {
        Self {
            chunk_index,
            success: true,
            error: None,
            records_processed,
            retry_count: 0,
        }
    }

    /// A failed first-attempt result
    pub fn failed(chunk_index: usize, error: impl Into<String>) -> Self {
        Self {
            chunk_index,
            success: false,
            error: Some(error.into()),
            records_processed: 0,
            retry_count: 0,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Aggregate counts over a set of chunk results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64) -> Record {
        let mut row = Record::new();
        row.insert("id".to_string(), json!(id));
        row
    }

    #[test]
    fn test_chunk_data_wire_format_is_camel_case() {
        let chunk = ChunkData {
            chunk_index: 2,
            data: vec![record(1)],
            session_id: "session-1".to_string(),
            total_chunks: 4,
            start_index: 10,
            end_index: 11,
        };

        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["chunkIndex"], 2);
        assert_eq!(value["sessionId"], "session-1");
        assert_eq!(value["totalChunks"], 4);
        assert_eq!(value["startIndex"], 10);
        assert_eq!(value["endIndex"], 11);
        assert_eq!(value["data"][0]["id"], 1);
    }

    #[test]
    fn test_chunk_result_omits_missing_error() {
        let value = serde_json::to_value(ChunkResult::succeeded(0, 5)).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["recordsProcessed"], 5);

        let failed = ChunkResult::failed(1, "boom").with_retry_count(3);
        assert_eq!(failed.records_processed, 0);
        assert_eq!(failed.retry_count, 3);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_parsed_data_counts_rows() {
        let parsed = ParsedData::new(vec!["id".to_string()], vec![record(1), record(2)]);
        assert_eq!(parsed.total_rows, 2);
        assert!(!parsed.is_empty());
    }
}
