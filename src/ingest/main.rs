//! Schools CSV ingest pipeline.
//!
//! Projects school coordinates, builds the quadrant index and writes it to
//! Elasticsearch, ScyllaDB and/or a JSON snapshot.

mod source;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use quadrant_index::config::Config;
use quadrant_index::elasticsearch::{create_index, BulkIndexer, EsClient};
use quadrant_index::index::QuadrantIndexBuilder;
use quadrant_index::models::QuadrantIndex;
use quadrant_index::persistence::{
    ensure_unique_ids, DocumentMapper, RecordMapper, RelationalMapper,
};
use quadrant_index::scylla::ScyllaClient;
use quadrant_index::spatial::{CoordinateProjector, PointBuilder, SpatialKeyEncoder};
use quadrant_index::upload::{progress_bar, RetryPolicy};

use crate::source::load_schools;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    None,
    Elasticsearch,
    Scylla,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build the schools quadrant index and store it")]
struct Args {
    /// Schools CSV to import
    #[arg(short, long)]
    file: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the index
    #[arg(long, value_enum, default_value = "none")]
    backend: Backend,

    /// Also write the index as a JSON snapshot
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Elasticsearch URL
    #[arg(long)]
    es_url: Option<String>,

    /// Elasticsearch index name
    #[arg(long)]
    index: Option<String>,

    /// ScyllaDB node
    #[arg(long)]
    scylla_url: Option<String>,

    /// ScyllaDB keyspace
    #[arg(long)]
    keyspace: Option<String>,

    /// Create/recreate the Elasticsearch index before import
    #[arg(long)]
    create_index: bool,

    /// Batch size for bulk writes
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = apply_overrides(Config::load_or_default(args.config.as_ref())?, &args);

    info!("Quadrant Ingest Pipeline");
    info!("File: {}", args.file.display());

    let source = load_schools(&args.file, &config.source)?;
    if source.rejected > 0 {
        warn!("Skipped {} rows with an unparsable URN", source.rejected);
    }

    let projector = CoordinateProjector::new(&config.projection)?;
    let encoder = SpatialKeyEncoder::new(config.index.key_precision);
    let points = PointBuilder::new(projector, encoder).build_all(&source.rows);

    // Pre-flight: an import with no usable coordinates would collapse the root box.
    let valid = points
        .iter()
        .filter(|p| config.index.validity.is_valid(p.lat(), p.lng()))
        .count();
    if valid == 0 {
        anyhow::bail!(
            "No spatial index available for this import: none of {} schools has valid coordinates",
            points.len()
        );
    }
    info!("{} of {} schools have valid coordinates", valid, points.len());

    let index = QuadrantIndexBuilder::from_config(&config.index)
        .build(&points)
        .context("Failed to build quadrant index")?;
    for (level, count) in index.level_counts().iter().enumerate() {
        info!("  level {}: {} quadrants", level, count);
    }

    if let Some(path) = &args.output {
        write_snapshot(&index, path)?;
    }

    let policy = RetryPolicy::from(&config.storage);

    if matches!(args.backend, Backend::Elasticsearch | Backend::Both) {
        write_elasticsearch(&index, &config, policy, args.create_index).await?;
    }

    if matches!(args.backend, Backend::Scylla | Backend::Both) {
        write_scylla(&index, &config, policy).await?;
    }

    info!("Import complete: {} quadrants", index.len());
    Ok(())
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(url) = &args.es_url {
        config.storage.es_url = url.clone();
    }
    if let Some(index) = &args.index {
        config.storage.es_index = index.clone();
    }
    if let Some(url) = &args.scylla_url {
        config.storage.scylla_url = url.clone();
    }
    if let Some(keyspace) = &args.keyspace {
        config.storage.keyspace = keyspace.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.storage.batch_size = batch_size;
    }
    config
}

fn write_snapshot(index: &QuadrantIndex, path: &PathBuf) -> Result<()> {
    info!("Writing index snapshot to {}", path.display());
    let file = File::create(path).context("Failed to create snapshot file")?;
    serde_json::to_writer(BufWriter::new(file), index).context("Failed to write snapshot")?;
    Ok(())
}

async fn write_elasticsearch(
    index: &QuadrantIndex,
    config: &Config,
    policy: RetryPolicy,
    recreate: bool,
) -> Result<()> {
    let storage = &config.storage;

    // Connect to Elasticsearch
    let es_client = EsClient::new(&storage.es_url, &storage.es_index)
        .await
        .context("Failed to connect to Elasticsearch")?;

    if !es_client.health_check().await? {
        anyhow::bail!("Elasticsearch cluster is not healthy");
    }
    info!("Connected to Elasticsearch");

    create_index(&es_client, recreate).await?;

    let import_start = Utc::now();
    let mapper = DocumentMapper::new(import_start);
    let mut indexer = BulkIndexer::new(es_client.clone(), storage.batch_size, policy);

    let pb = progress_bar(index.len() as u64, "documents")?;
    for quadrant in index.iter() {
        indexer.add(mapper.to_document(quadrant)).await?;
        pb.inc(1);
    }
    pb.finish_with_message("Documents sent");

    // Any batch still failing after its retries has already aborted the import.
    let indexed = indexer.finish().await?;
    if indexed != index.len() {
        anyhow::bail!(
            "Indexed {} of {} quadrants; keeping the previous import",
            indexed,
            index.len()
        );
    }
    info!("Indexed {} documents", indexed);

    // Drop quadrants left over from earlier imports
    es_client.delete_stale(import_start).await?;

    let doc_count = es_client.doc_count().await?;
    info!("Total documents in index: {}", doc_count);
    Ok(())
}

async fn write_scylla(index: &QuadrantIndex, config: &Config, policy: RetryPolicy) -> Result<()> {
    // Quadrant ids are primary keys here
    ensure_unique_ids(index)?;

    let storage = &config.storage;
    let client = ScyllaClient::new(&storage.scylla_url, &storage.keyspace).await?;
    client.truncate().await?;

    let tables = RelationalMapper.to_records(index);
    info!(
        "Writing {} bounding boxes, {} quadrants, {} quadrant points",
        tables.bounding_boxes.len(),
        tables.quadrants.len(),
        tables.quadrant_points.len()
    );
    client
        .write_tables(&tables, storage.batch_size, policy)
        .await?;

    Ok(())
}
