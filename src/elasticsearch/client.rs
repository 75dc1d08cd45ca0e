//! Elasticsearch client wrapper.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::IndicesRefreshParts,
    DeleteByQueryParts, Elasticsearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::persistence::QuadrantDocument;

/// Page size when reading the index back
const SCAN_PAGE_SIZE: usize = 500;

/// Elasticsearch client wrapper with connection configuration
#[derive(Clone)]
pub struct EsClient {
    client: Elasticsearch,
    pub index_name: String,
}

impl EsClient {
    /// Create a new Elasticsearch client
    pub async fn new(es_url: &str, index_name: &str) -> Result<Self> {
        let url = Url::parse(es_url)?;
        let conn_pool = SingleNodeConnectionPool::new(url);
        let transport = TransportBuilder::new(conn_pool).disable_proxy().build()?;

        let client = Elasticsearch::new(transport);

        Ok(Self {
            client,
            index_name: index_name.to_string(),
        })
    }

    /// Get the underlying Elasticsearch client
    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Check if cluster is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .cluster()
            .health(elasticsearch::cluster::ClusterHealthParts::None)
            .send()
            .await?;

        Ok(response.status_code().is_success())
    }

    /// Get document count in index
    pub async fn doc_count(&self) -> Result<u64> {
        let response = self
            .client
            .count(elasticsearch::CountParts::Index(&[&self.index_name]))
            .send()
            .await?;

        let body = response.json::<serde_json::Value>().await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }

    /// Read every quadrant document, ordered by id.
    pub async fn fetch_all(&self) -> Result<Vec<QuadrantDocument>> {
        let mut docs = Vec::new();
        let mut search_after: Option<Value> = None;

        loop {
            let mut body = json!({
                "size": SCAN_PAGE_SIZE,
                "sort": [{ "id": "asc" }],
                "query": { "match_all": {} }
            });
            if let Some(after) = &search_after {
                body["search_after"] = after.clone();
            }

            let response = self
                .client
                .search(SearchParts::Index(&[&self.index_name]))
                .body(body)
                .send()
                .await
                .context("Search request failed")?;

            if !response.status_code().is_success() {
                let error_body = response.text().await?;
                anyhow::bail!("Failed to read quadrants: {}", error_body);
            }

            let body = response.json::<Value>().await?;
            let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();
            if hits.is_empty() {
                break;
            }

            for hit in &hits {
                let doc: QuadrantDocument = serde_json::from_value(hit["_source"].clone())
                    .context("Malformed quadrant document")?;
                docs.push(doc);
            }
            debug!("Fetched {} quadrant documents so far", docs.len());

            search_after = hits.last().map(|hit| hit["sort"].clone());
        }

        info!("Loaded {} quadrant documents from {}", docs.len(), self.index_name);
        Ok(docs)
    }

    /// Make every write so far visible to search.
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[&self.index_name]))
            .send()
            .await
            .context("Refresh request failed")?;

        if !response.status_code().is_success() {
            let error_body = response.text().await?;
            anyhow::bail!("Failed to refresh {}: {}", self.index_name, error_body);
        }
        Ok(())
    }

    /// Delete documents written by imports older than `import_start`.
    pub async fn delete_stale(&self, import_start: DateTime<Utc>) -> Result<u64> {
        self.refresh().await?;

        let query = json!({
            "query": {
                "range": {
                    "import_timestamp": { "lt": import_start.to_rfc3339() }
                }
            }
        });

        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[&self.index_name]))
            .body(query)
            .send()
            .await
            .context("Delete by query failed")?;

        if !response.status_code().is_success() {
            let error_body = response.text().await?;
            anyhow::bail!("Failed to delete stale quadrants: {}", error_body);
        }

        let body = response.json::<Value>().await?;
        stale_deleted(&body)
    }
}

/// Deleted count from a `_delete_by_query` response. Version conflicts or
/// per-document failures mean stale quadrants survived.
fn stale_deleted(body: &Value) -> Result<u64> {
    let conflicts = body["version_conflicts"].as_u64().unwrap_or(0);
    let failures = body["failures"].as_array().map(Vec::len).unwrap_or(0);
    if conflicts > 0 || failures > 0 {
        anyhow::bail!(
            "Stale cleanup incomplete: {} version conflicts, {} failures",
            conflicts,
            failures
        );
    }

    let deleted = body["deleted"].as_u64().unwrap_or(0);
    info!("Deleted {} stale quadrant documents", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_deleted_count() {
        let body = json!({ "deleted": 12, "version_conflicts": 0, "failures": [] });
        assert_eq!(stale_deleted(&body).unwrap(), 12);
    }

    #[test]
    fn test_stale_cleanup_conflicts_fail() {
        let body = json!({ "deleted": 3, "version_conflicts": 2, "failures": [] });
        assert!(stale_deleted(&body).is_err());

        let body = json!({ "deleted": 0, "failures": [{ "cause": { "reason": "shard" } }] });
        assert!(stale_deleted(&body).is_err());
    }
}
