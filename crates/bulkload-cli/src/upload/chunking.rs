//! Chunk construction and result aggregation

use bulkload_common::{BulkError, ChunkData, ChunkResult, Record, UploadStats};
use url::Url;

/// Split `data` into consecutive windows of `chunk_size` rows.
///
/// The last window may be shorter. Every chunk carries the same
/// `session_id` and `total_chunks == ceil(data.len() / chunk_size)`.
pub fn create_chunks(
    data: &[Record],
    chunk_size: usize,
    session_id: &str,
) -> Result<Vec<ChunkData>, BulkError> {
    if chunk_size == 0 {
        return Err(BulkError::InvalidChunkSize(chunk_size));
    }

    let total_chunks = data.len().div_ceil(chunk_size);
    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(chunk_index, window)| {
            let start_index = chunk_index * chunk_size;
            ChunkData {
                chunk_index,
                data: window.to_vec(),
                session_id: session_id.to_string(),
                total_chunks,
                start_index,
                end_index: start_index + window.len(),
            }
        })
        .collect())
}

/// Aggregate counts over `results`.
///
/// Failed chunks process zero records, so `failed_records` only differs
/// from zero when a transport reports partial counts on failure.
pub fn calculate_upload_stats(results: &[ChunkResult]) -> UploadStats {
    let successful_chunks = results.iter().filter(|r| r.success).count();
    let total_records: usize = results.iter().map(|r| r.records_processed).sum();
    let successful_records: usize = results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.records_processed)
        .sum();

    UploadStats {
        total_chunks: results.len(),
        successful_chunks,
        failed_chunks: results.len() - successful_chunks,
        total_records,
        successful_records,
        failed_records: total_records - successful_records,
    }
}

/// Whether `endpoint` parses as a well-formed absolute URL
pub fn validate_api_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint).is_ok()
}
