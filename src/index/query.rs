//! Viewport lookup over a built index.

use std::sync::Arc;

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::models::{BoundingBox, Quadrant, QuadrantIndex};
use crate::spatial::SpatialKeyEncoder;

/// Most specific quadrant whose bounds cover `viewport`.
///
/// Starts at the root and descends one level at a time while some quadrant
/// on the next level fully contains the viewport. An inverted viewport is
/// rejected with [`IndexError::MalformedViewport`].
pub fn query<'a>(viewport: &BoundingBox, index: &'a QuadrantIndex) -> Result<&'a Quadrant> {
    if !viewport.is_well_formed() {
        return Err(IndexError::MalformedViewport {
            sw_lat: viewport.sw.lat,
            sw_lng: viewport.sw.lng,
            ne_lat: viewport.ne.lat,
            ne_lng: viewport.ne.lng,
        });
    }

    let mut best = index.root().ok_or(IndexError::NoRootQuadrant)?;

    while let Some(candidate) = index
        .at_level(best.level + 1)
        .find(|q| q.bounds.contains_box(viewport))
    {
        best = candidate;
    }

    debug!(
        "Viewport sw=({}, {}) ne=({}, {}) resolved to {} ({} points)",
        viewport.sw.lat, viewport.sw.lng, viewport.ne.lat, viewport.ne.lng, best.id, best.point_count
    );
    Ok(best)
}

/// Read-only query front for a shared index.
#[derive(Clone)]
pub struct QuadrantQueryService {
    index: Arc<QuadrantIndex>,
    encoder: SpatialKeyEncoder,
}

impl QuadrantQueryService {
    pub fn new(index: Arc<QuadrantIndex>, encoder: SpatialKeyEncoder) -> Self {
        Self { index, encoder }
    }

    pub fn query(&self, viewport: &BoundingBox) -> Result<&Quadrant> {
        query(viewport, &self.index)
    }

    /// Query by raw extent; corners are encoded with the service's key precision.
    pub fn query_extent(
        &self,
        min_lng: f64,
        min_lat: f64,
        max_lng: f64,
        max_lat: f64,
    ) -> Result<&Quadrant> {
        let viewport = BoundingBox::new(
            self.encoder.keyed(max_lat, max_lng),
            self.encoder.keyed(min_lat, min_lng),
        );
        self.query(&viewport)
    }

    pub fn index(&self) -> &QuadrantIndex {
        &self.index
    }
}
