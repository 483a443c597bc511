//! HTTP chunk transport

use super::ChunkTransport;
use crate::error::Result;
use async_trait::async_trait;
use bulkload_common::{ChunkData, ChunkResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// POSTs chunks as JSON with reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport; `timeout` bounds each request, not the whole retry sequence
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("bulkload/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Use an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkTransport for HttpTransport {
    async fn upload_chunk(&self, chunk: &ChunkData, endpoint: &str) -> ChunkResult {
        let index = chunk.chunk_index;

        let response = match self.client.post(endpoint).json(chunk).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(session_id = %chunk.session_id, chunk_index = index, error = %e, "Chunk request failed");
                return ChunkResult::failed(index, e.to_string());
            },
        };

        let status = response.status();
        if !status.is_success() {
            warn!(session_id = %chunk.session_id, chunk_index = index, status = %status, "Chunk rejected");
            return ChunkResult::failed(index, format!("HTTP {}", status));
        }

        // The body is not inspected, but it has to be JSON
        match response.json::<serde_json::Value>().await {
            Ok(_) => {
                debug!(session_id = %chunk.session_id, chunk_index = index, records = chunk.record_count(), "Chunk accepted");
                ChunkResult::succeeded(index, chunk.record_count())
            },
            Err(e) => ChunkResult::failed(index, format!("Invalid response body: {}", e)),
        }
    }
}
