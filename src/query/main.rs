//! Query server for viewport lookups.
//!
//! Loads a built quadrant index once at startup and answers, for any
//! viewport, with the most specific quadrant that covers it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quadrant_index::config::Config;
use quadrant_index::models::Quadrant;
use quadrant_index::spatial::SpatialKeyEncoder;
use quadrant_index::{IndexError, QuadrantQueryService};

mod load;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    Snapshot,
    Elasticsearch,
    Scylla,
}

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Quadrant viewport query server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to load the index from
    #[arg(long, value_enum, default_value = "snapshot")]
    source: Source,

    /// JSON snapshot written by `ingest --output`
    #[arg(long, default_value = "index.json")]
    snapshot: PathBuf,

    /// Elasticsearch URL
    #[arg(long)]
    es_url: Option<String>,

    /// Elasticsearch index name
    #[arg(long)]
    index: Option<String>,

    /// ScyllaDB URL
    #[arg(long)]
    scylla_url: Option<String>,
}

/// Application state shared across handlers
struct AppState {
    service: QuadrantQueryService,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_ref())?;
    if let Some(url) = &args.es_url {
        config.storage.es_url = url.clone();
    }
    if let Some(index) = &args.index {
        config.storage.es_index = index.clone();
    }
    if let Some(url) = &args.scylla_url {
        config.storage.scylla_url = url.clone();
    }

    info!("Quadrant Query Server");

    let index = match args.source {
        Source::Snapshot => load::from_snapshot(&args.snapshot)?,
        Source::Elasticsearch => load::from_elasticsearch(&config.storage).await?,
        Source::Scylla => load::from_scylla(&config.storage).await?,
    };
    info!(
        "Serving {} quadrants across {} levels",
        index.len(),
        index.levels()
    );

    let state = Arc::new(AppState {
        service: QuadrantQueryService::new(
            Arc::new(index),
            SpatialKeyEncoder::new(config.index.key_precision),
        ),
    });

    let app = router(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/quadrant", get(quadrant_handler))
        .route("/v1/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ready = state.service.index().root().is_some();

    Json(HealthResponse {
        status: if ready { "ok" } else { "degraded" },
        quadrants: state.service.index().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    quadrants: usize,
}

#[derive(Deserialize)]
struct QuadrantQueryParams {
    /// Viewport: "minLng,minLat,maxLng,maxLat"
    bbox: Option<String>,
}

/// Most specific quadrant covering the viewport
async fn quadrant_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuadrantQueryParams>,
) -> Result<Json<Quadrant>, (StatusCode, String)> {
    let [min_lng, min_lat, max_lng, max_lat] = parse_bbox(&params.bbox).ok_or((
        StatusCode::BAD_REQUEST,
        "bbox must be \"minLng,minLat,maxLng,maxLat\" with min <= max".to_string(),
    ))?;

    let quadrant = state
        .service
        .query_extent(min_lng, min_lat, max_lng, max_lat)
        .map_err(|e| match e {
            IndexError::NoRootQuadrant => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            IndexError::MalformedViewport { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                tracing::error!("Quadrant query failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;

    Ok(Json(quadrant.clone()))
}

#[derive(Serialize)]
struct StatsResponse {
    quadrants: usize,
    levels: Vec<usize>,
    root_point_count: Option<usize>,
}

/// Per-level quadrant counts
async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let index = state.service.index();
    Json(StatsResponse {
        quadrants: index.len(),
        levels: index.level_counts(),
        root_point_count: index.root().map(|q| q.point_count),
    })
}

/// Parse bbox string "minLng,minLat,maxLng,maxLat"
fn parse_bbox(bbox: &Option<String>) -> Option<[f64; 4]> {
    bbox.as_ref().and_then(|s| {
        let parts: Vec<f64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
        if parts.len() == 4 && parts[0] <= parts[2] && parts[1] <= parts[3] {
            Some([parts[0], parts[1], parts[2], parts[3]])
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadrant_index::config::IndexConfig;
    use quadrant_index::models::{KeyedPoint, QuadrantIndex, SchoolPoint};
    use quadrant_index::QuadrantIndexBuilder;

    fn state(index: QuadrantIndex) -> Arc<AppState> {
        Arc::new(AppState {
            service: QuadrantQueryService::new(Arc::new(index), SpatialKeyEncoder::default()),
        })
    }

    fn built() -> QuadrantIndex {
        let points: Vec<_> = (0..100)
            .map(|i| {
                Arc::new(SchoolPoint {
                    id: i.to_string(),
                    name: format!("School {}", i),
                    location: KeyedPoint::new(
                        52.05 + (i % 10) as f64 * 0.09,
                        0.05 + (i / 10) as f64 * 0.09,
                        "u1",
                    ),
                })
            })
            .collect();
        QuadrantIndexBuilder::from_config(&IndexConfig::default())
            .build(&points)
            .unwrap()
    }

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox(&Some("0.1, 52.1,0.2,52.2".to_string())),
            Some([0.1, 52.1, 0.2, 52.2])
        );
        assert_eq!(parse_bbox(&Some("0.1,52.1,0.2".to_string())), None);
        assert_eq!(parse_bbox(&Some("0.3,52.1,0.2,52.2".to_string())), None);
        assert_eq!(parse_bbox(&None), None);
    }

    #[tokio::test]
    async fn test_quadrant_handler_descends() {
        let params = QuadrantQueryParams {
            bbox: Some("0.06,52.06,0.1,52.1".to_string()),
        };
        let Json(quadrant) = quadrant_handler(State(state(built())), Query(params))
            .await
            .unwrap();
        assert_eq!(quadrant.level, 1);
        assert!(quadrant.point_count <= 50);
    }

    #[tokio::test]
    async fn test_quadrant_handler_bad_bbox() {
        let params = QuadrantQueryParams {
            bbox: Some("nope".to_string()),
        };
        let err = quadrant_handler(State(state(built())), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_quadrant_handler_empty_index() {
        let params = QuadrantQueryParams {
            bbox: Some("0.06,52.06,0.1,52.1".to_string()),
        };
        let err = quadrant_handler(State(state(QuadrantIndex::default())), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let Json(stats) = stats_handler(State(state(built()))).await;
        assert_eq!(stats.quadrants, 5);
        assert_eq!(stats.levels, vec![1, 4]);
        assert_eq!(stats.root_point_count, Some(100));
    }
}
