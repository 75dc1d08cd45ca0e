//! National grid -> WGS84 conversion.

use proj4rs::{proj::Proj, transform::transform};
use tracing::warn;

use crate::config::ProjectionConfig;
use crate::error::{IndexError, Result};
use crate::models::GeoPoint;

/// Converts easting/northing pairs into latitude/longitude.
///
/// The two reference systems are fixed at construction; conversion itself
/// never fails and degrades to [`GeoPoint::SENTINEL`] instead.
pub struct CoordinateProjector {
    source: Proj,
    target: Proj,
    scale: f64,
}

impl CoordinateProjector {
    pub fn new(config: &ProjectionConfig) -> Result<Self> {
        Ok(Self {
            source: parse_proj(&config.source)?,
            target: parse_proj(&config.target)?,
            scale: 10f64.powi(config.decimals as i32),
        })
    }

    /// Project `(easting, northing)`. Missing or zero inputs yield the sentinel.
    pub fn project(&self, easting: Option<f64>, northing: Option<f64>) -> GeoPoint {
        let (easting, northing) = match (easting, northing) {
            (Some(e), Some(n)) if e != 0.0 && n != 0.0 && e.is_finite() && n.is_finite() => (e, n),
            _ => return GeoPoint::SENTINEL,
        };

        let mut point = (easting, northing, 0.0);
        if let Err(e) = transform(&self.source, &self.target, &mut point) {
            warn!(
                "Projection failed for ({}, {}): {}; using sentinel",
                easting, northing, e
            );
            return GeoPoint::SENTINEL;
        }

        let lng = self.round(point.0.to_degrees());
        let lat = self.round(point.1.to_degrees());
        if !lat.is_finite() || !lng.is_finite() {
            warn!(
                "Projection of ({}, {}) produced non-finite output; using sentinel",
                easting, northing
            );
            return GeoPoint::SENTINEL;
        }

        GeoPoint::new(lat, lng)
    }

    fn round(&self, value: f64) -> f64 {
        (value * self.scale).round() / self.scale
    }
}

fn parse_proj(definition: &str) -> Result<Proj> {
    Proj::from_proj_string(definition).map_err(|e| IndexError::InvalidProjection {
        definition: definition.to_string(),
        reason: e.to_string(),
    })
}
