//! Bulk indexing operations for Elasticsearch.

use anyhow::{Context, Result};
use elasticsearch::http::request::JsonBody;
use elasticsearch::BulkParts;
use serde_json::Value;
use tracing::{debug, warn};

use super::EsClient;
use crate::persistence::QuadrantDocument;
use crate::upload::{with_retry, RetryPolicy};

/// Bulk indexer for efficient document insertion
pub struct BulkIndexer {
    client: EsClient,
    batch_size: usize,
    policy: RetryPolicy,
    buffer: Vec<QuadrantDocument>,
    total_indexed: usize,
}

impl BulkIndexer {
    /// Create a new bulk indexer
    pub fn new(client: EsClient, batch_size: usize, policy: RetryPolicy) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            client,
            batch_size,
            policy,
            buffer: Vec::with_capacity(batch_size),
            total_indexed: 0,
        }
    }

    /// Add a document to the buffer, flushing if batch is full
    pub async fn add(&mut self, doc: QuadrantDocument) -> Result<()> {
        self.buffer.push(doc);

        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }

        Ok(())
    }

    /// Flush the buffer to Elasticsearch. A request with any rejected item
    /// is resent as a whole batch.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let docs = std::mem::take(&mut self.buffer);
        let count = docs.len();

        debug!("Flushing {} documents to Elasticsearch", count);

        let client = &self.client;
        with_retry(self.policy, "Bulk request", || send_bulk(client, &docs)).await?;

        self.total_indexed += count;
        self.buffer = Vec::with_capacity(self.batch_size);

        Ok(())
    }

    /// Flush what is left and return the number of documents indexed
    pub async fn finish(mut self) -> Result<usize> {
        self.flush().await?;
        Ok(self.total_indexed)
    }
}

/// Send one bulk request. Fails if any item was rejected.
async fn send_bulk(client: &EsClient, docs: &[QuadrantDocument]) -> Result<()> {
    let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(docs.len() * 2);

    for doc in docs {
        // Action line
        body.push(
            serde_json::json!({
                "index": {
                    "_id": &doc.id
                }
            })
            .into(),
        );
        // Document line
        body.push(serde_json::to_value(doc)?.into());
    }

    let response = client
        .client()
        .bulk(BulkParts::Index(&client.index_name))
        .body(body)
        .send()
        .await
        .context("Bulk request failed")?;

    if !response.status_code().is_success() {
        let error_body = response.text().await?;
        anyhow::bail!("Bulk request rejected: {}", error_body);
    }

    let response_body = response.json::<Value>().await?;
    check_bulk_response(&response_body)
}

/// Turn item-level failures in a bulk response into an error.
fn check_bulk_response(body: &Value) -> Result<()> {
    if !body["errors"].as_bool().unwrap_or(false) {
        return Ok(());
    }

    let failed: Vec<&Value> = body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item["index"]["error"].is_object())
                .collect()
        })
        .unwrap_or_default();

    let reason = failed
        .first()
        .and_then(|item| item["index"]["error"]["reason"].as_str())
        .unwrap_or("unknown");
    warn!("Bulk request had {} rejected documents", failed.len());
    anyhow::bail!(
        "{} documents rejected in bulk request (first: {})",
        failed.len(),
        reason
    )
}
