//! Geohash spatial keys.

use geohash::{encode, Coord};

use crate::models::{GeoPoint, KeyedPoint};

pub const DEFAULT_KEY_PRECISION: usize = 9;

/// Encodes positions as fixed-length geohash strings.
#[derive(Debug, Clone, Copy)]
pub struct SpatialKeyEncoder {
    precision: usize,
}

impl Default for SpatialKeyEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PRECISION)
    }
}

impl SpatialKeyEncoder {
    /// Precision is clamped to the 1..=12 range geohash supports.
    pub fn new(precision: usize) -> Self {
        Self {
            precision: precision.clamp(1, 12),
        }
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Total for finite input: coordinates outside the valid range are
    /// clamped to the nearest edge of the world before encoding.
    pub fn encode(&self, point: GeoPoint) -> String {
        let coord = Coord {
            x: clamp_finite(point.lng, 180.0),
            y: clamp_finite(point.lat, 90.0),
        };
        encode(coord, self.precision).unwrap_or_default()
    }

    pub fn keyed(&self, lat: f64, lng: f64) -> KeyedPoint {
        let key = self.encode(GeoPoint::new(lat, lng));
        KeyedPoint::new(lat, lng, key)
    }
}

fn clamp_finite(value: f64, limit: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-limit, limit)
    } else {
        0.0
    }
}
