//! Structural errors raised by the index core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Bounds or an index were requested over zero points.
    #[error("cannot compute bounds of an empty dataset")]
    EmptyDataset,

    /// A query ran against an index without a level-0 quadrant.
    #[error("index has no root quadrant; build it before querying")]
    NoRootQuadrant,

    /// Viewport corners are inverted or not numbers.
    #[error("malformed viewport: sw=({sw_lat}, {sw_lng}) ne=({ne_lat}, {ne_lng})")]
    MalformedViewport {
        sw_lat: f64,
        sw_lng: f64,
        ne_lat: f64,
        ne_lng: f64,
    },

    #[error("invalid projection definition `{definition}`: {reason}")]
    InvalidProjection { definition: String, reason: String },

    /// Relational storage keys quadrants by id, so collisions must be caught before writing.
    #[error("{} quadrant ids are not unique (first: {})", .0.len(), .0.first().map(String::as_str).unwrap_or("-"))]
    DuplicateQuadrantIds(Vec<String>),
}

pub type Result<T> = std::result::Result<T, IndexError>;
