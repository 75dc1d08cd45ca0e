//! Padded bounding box of a point set.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PointValidity;
use crate::error::{IndexError, Result};
use crate::models::{BoundingBox, SchoolPoint};
use crate::spatial::SpatialKeyEncoder;

pub struct BoundsCalculator {
    encoder: SpatialKeyEncoder,
    padding_ratio: f64,
    validity: PointValidity,
}

impl BoundsCalculator {
    pub fn new(encoder: SpatialKeyEncoder, padding_ratio: f64, validity: PointValidity) -> Self {
        Self {
            encoder,
            padding_ratio,
            validity,
        }
    }

    /// Minimal box around all valid points, grown by `padding_ratio` of the
    /// extent on each side.
    ///
    /// The running min/max is seeded from the first valid point, or from the
    /// first point when none is valid; in that case the box collapses onto it.
    pub fn compute(&self, points: &[Arc<SchoolPoint>]) -> Result<BoundingBox> {
        let first = points.first().ok_or(IndexError::EmptyDataset)?;
        let seed = points
            .iter()
            .find(|p| self.validity.is_valid(p.lat(), p.lng()))
            .unwrap_or(first);

        let (mut min_lat, mut max_lat) = (seed.lat(), seed.lat());
        let (mut min_lng, mut max_lng) = (seed.lng(), seed.lng());
        let mut valid = 0usize;

        for point in points {
            let (lat, lng) = (point.lat(), point.lng());
            if !self.validity.is_valid(lat, lng) {
                continue;
            }
            valid += 1;
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lng = min_lng.min(lng);
            max_lng = max_lng.max(lng);
        }

        if valid == 0 {
            warn!(
                "None of {} points passed the validity test; bounds collapse onto ({}, {})",
                points.len(),
                seed.lat(),
                seed.lng()
            );
        }

        let lat_pad = (max_lat - min_lat) * self.padding_ratio;
        let lng_pad = (max_lng - min_lng) * self.padding_ratio;

        let bounds = BoundingBox::new(
            self.encoder.keyed(max_lat + lat_pad, max_lng + lng_pad),
            self.encoder.keyed(min_lat - lat_pad, min_lng - lng_pad),
        );
        debug!(
            "Bounds over {} valid points: sw=({}, {}) ne=({}, {})",
            valid, bounds.sw.lat, bounds.sw.lng, bounds.ne.lat, bounds.ne.lng
        );

        Ok(bounds)
    }
}
