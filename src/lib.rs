//! Quadrant index - hierarchical spatial buckets for a national schools map.
//!
//! This library provides shared types and modules for the ingest and query binaries.

pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod index;
pub mod models;
pub mod persistence;
pub mod scylla;
pub mod spatial;
pub mod upload;

pub use error::IndexError;
pub use index::{query, QuadrantIndexBuilder, QuadrantQueryService};
pub use models::{BoundingBox, Corner, GeoPoint, Quadrant, QuadrantIndex, RawSchoolRow, SchoolPoint};
