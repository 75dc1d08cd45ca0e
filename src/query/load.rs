use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use quadrant_index::config::StorageConfig;
use quadrant_index::elasticsearch::EsClient;
use quadrant_index::models::QuadrantIndex;
use quadrant_index::persistence::{DocumentMapper, RecordMapper, RelationalMapper};
use quadrant_index::scylla::ScyllaClient;

pub fn from_snapshot(path: &Path) -> Result<QuadrantIndex> {
    info!("Loading index snapshot from {}", path.display());
    let file = File::open(path).context("Failed to open snapshot")?;
    let index: QuadrantIndex =
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse snapshot")?;
    Ok(index)
}

pub async fn from_elasticsearch(storage: &StorageConfig) -> Result<QuadrantIndex> {
    info!("Connecting to Elasticsearch at {}", storage.es_url);
    let es_client = EsClient::new(&storage.es_url, &storage.es_index).await?;

    if !es_client.health_check().await? {
        anyhow::bail!("Elasticsearch cluster is not healthy");
    }

    let docs = es_client.fetch_all().await?;
    let mut quadrants = DocumentMapper::default().from_records(docs).into_quadrants();
    quadrants.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
    Ok(QuadrantIndex::from_quadrants(quadrants))
}

pub async fn from_scylla(storage: &StorageConfig) -> Result<QuadrantIndex> {
    info!("Connecting to ScyllaDB at {}", storage.scylla_url);
    let client = ScyllaClient::new(&storage.scylla_url, &storage.keyspace).await?;
    let tables = client.load_tables().await?;
    Ok(RelationalMapper.from_records(tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadrant_index::config::IndexConfig;
    use quadrant_index::models::{KeyedPoint, SchoolPoint};
    use quadrant_index::QuadrantIndexBuilder;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_round_trip() {
        let points: Vec<_> = (0..70)
            .map(|i| {
                Arc::new(SchoolPoint {
                    id: i.to_string(),
                    name: format!("School {}", i),
                    location: KeyedPoint::new(52.0 + (i % 7) as f64 * 0.1, 0.2 + (i / 7) as f64 * 0.1, "u1"),
                })
            })
            .collect();
        let index = QuadrantIndexBuilder::from_config(&IndexConfig::default())
            .build(&points)
            .unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(File::create(file.path()).unwrap(), &index).unwrap();

        let restored = from_snapshot(file.path()).unwrap();
        assert_eq!(restored.quadrants(), index.quadrants());
    }
}
