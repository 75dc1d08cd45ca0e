//! ScyllaDB storage for the normalized quadrant tables.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::{Batch, BatchType};
use std::sync::Arc;
use tracing::info;

use crate::persistence::{BoundingBoxRow, QuadrantPointRow, QuadrantRow, RelationalTables};
use crate::upload::{upload_in_batches, RetryPolicy};

const TABLES: [&str; 3] = ["bounding_boxes", "quadrants", "quadrant_points"];

#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaClient {
    pub async fn new(uri: &str, keyspace: &str) -> Result<Self> {
        if keyspace.is_empty()
            || !keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!("Invalid keyspace name: {:?}", keyspace);
        }

        info!("Connecting to ScyllaDB at {}...", uri);
        let session: Session = SessionBuilder::new()
            .known_node(uri)
            .build()
            .await
            .context("Failed to connect to ScyllaDB")?;

        let client = Self {
            session: Arc::new(session),
            keyspace: keyspace.to_string(),
        };

        client.init_schema().await?;
        Ok(client)
    }

    async fn init_schema(&self) -> Result<()> {
        let ks = &self.keyspace;

        // Create keyspace if not exists
        self.session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {ks}
                     WITH REPLICATION = {{
                        'class' : 'SimpleStrategy',
                        'replication_factor' : 1
                     }}"
                ),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {ks}.bounding_boxes (
                        id text PRIMARY KEY,
                        ne_lat double,
                        ne_lng double,
                        ne_key text,
                        sw_lat double,
                        sw_lng double,
                        sw_key text
                    )"
                ),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {ks}.quadrants (
                        id text PRIMARY KEY,
                        level int,
                        bounding_box_id text,
                        point_count int
                    )"
                ),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {ks}.quadrant_points (
                        quadrant_id text,
                        point_id text,
                        name text,
                        lat double,
                        lng double,
                        key text,
                        PRIMARY KEY (quadrant_id, point_id)
                    )"
                ),
                (),
            )
            .await?;

        Ok(())
    }

    /// Remove rows from a previous import.
    pub async fn truncate(&self) -> Result<()> {
        for table in TABLES {
            info!("Truncating {}.{}", self.keyspace, table);
            self.session
                .query_unpaged(format!("TRUNCATE {}.{}", self.keyspace, table), ())
                .await
                .with_context(|| format!("Failed to truncate {}", table))?;
        }
        Ok(())
    }

    /// Write all three tables in unlogged batches of `batch_size` rows.
    pub async fn write_tables(
        &self,
        tables: &RelationalTables,
        batch_size: usize,
        policy: RetryPolicy,
    ) -> Result<()> {
        let ks = &self.keyspace;

        let insert = format!(
            "INSERT INTO {ks}.bounding_boxes (id, ne_lat, ne_lng, ne_key, sw_lat, sw_lng, sw_key) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        );
        upload_in_batches(
            "bounding_boxes",
            &tables.bounding_boxes,
            batch_size,
            policy,
            |chunk: &[BoundingBoxRow]| {
                let values: Vec<_> = chunk
                    .iter()
                    .map(|r| {
                        (
                            r.id.clone(),
                            r.ne_lat,
                            r.ne_lng,
                            r.ne_key.clone(),
                            r.sw_lat,
                            r.sw_lng,
                            r.sw_key.clone(),
                        )
                    })
                    .collect();
                self.execute_batch(insert.clone(), values)
            },
        )
        .await?;

        let insert = format!(
            "INSERT INTO {ks}.quadrants (id, level, bounding_box_id, point_count) VALUES (?, ?, ?, ?)"
        );
        upload_in_batches(
            "quadrants",
            &tables.quadrants,
            batch_size,
            policy,
            |chunk: &[QuadrantRow]| {
                let values: Vec<_> = chunk
                    .iter()
                    .map(|r| (r.id.clone(), r.level, r.bounding_box_id.clone(), r.point_count))
                    .collect();
                self.execute_batch(insert.clone(), values)
            },
        )
        .await?;

        let insert = format!(
            "INSERT INTO {ks}.quadrant_points (quadrant_id, point_id, name, lat, lng, key) \
             VALUES (?, ?, ?, ?, ?, ?)"
        );
        upload_in_batches(
            "quadrant_points",
            &tables.quadrant_points,
            batch_size,
            policy,
            |chunk: &[QuadrantPointRow]| {
                let values: Vec<_> = chunk
                    .iter()
                    .map(|r| {
                        (
                            r.quadrant_id.clone(),
                            r.point_id.clone(),
                            r.name.clone(),
                            r.lat,
                            r.lng,
                            r.key.clone(),
                        )
                    })
                    .collect();
                self.execute_batch(insert.clone(), values)
            },
        )
        .await?;

        Ok(())
    }

    fn execute_batch<V>(
        &self,
        statement: String,
        values: Vec<V>,
    ) -> impl std::future::Future<Output = Result<()>> + 'static
    where
        V: scylla::serialize::row::SerializeRow + Send + Sync + 'static,
    {
        let session = Arc::clone(&self.session);
        async move {
            let mut batch = Batch::new(BatchType::Unlogged);
            for _ in &values {
                batch.append_statement(statement.as_str());
            }
            session
                .batch(&batch, values)
                .await
                .context("Batch insert failed")?;
            Ok(())
        }
    }

    /// Read all three tables back. Quadrants come back ordered by level, then id.
    pub async fn load_tables(&self) -> Result<RelationalTables> {
        let ks = &self.keyspace;
        let mut tables = RelationalTables::default();

        let mut rows = self
            .session
            .query_iter(
                format!("SELECT id, ne_lat, ne_lng, ne_key, sw_lat, sw_lng, sw_key FROM {ks}.bounding_boxes"),
                (),
            )
            .await?
            .rows_stream::<(String, f64, f64, String, f64, f64, String)>()?;
        while let Some((id, ne_lat, ne_lng, ne_key, sw_lat, sw_lng, sw_key)) = rows.try_next().await? {
            tables.bounding_boxes.push(BoundingBoxRow {
                id,
                ne_lat,
                ne_lng,
                ne_key,
                sw_lat,
                sw_lng,
                sw_key,
            });
        }

        let mut rows = self
            .session
            .query_iter(
                format!("SELECT id, level, bounding_box_id, point_count FROM {ks}.quadrants"),
                (),
            )
            .await?
            .rows_stream::<(String, i32, String, i32)>()?;
        while let Some((id, level, bounding_box_id, point_count)) = rows.try_next().await? {
            tables.quadrants.push(QuadrantRow {
                id,
                level,
                bounding_box_id,
                point_count,
            });
        }
        tables
            .quadrants
            .sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));

        let mut rows = self
            .session
            .query_iter(
                format!("SELECT quadrant_id, point_id, name, lat, lng, key FROM {ks}.quadrant_points"),
                (),
            )
            .await?
            .rows_stream::<(String, String, String, f64, f64, String)>()?;
        while let Some((quadrant_id, point_id, name, lat, lng, key)) = rows.try_next().await? {
            tables.quadrant_points.push(QuadrantPointRow {
                quadrant_id,
                point_id,
                name,
                lat,
                lng,
                key,
            });
        }

        info!(
            "Loaded {} bounding boxes, {} quadrants, {} quadrant points from {}",
            tables.bounding_boxes.len(),
            tables.quadrants.len(),
            tables.quadrant_points.len(),
            ks
        );
        Ok(tables)
    }
}
