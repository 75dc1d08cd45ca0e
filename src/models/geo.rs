//! Geographic primitives shared by the index and the storage adapters.

use serde::{Deserialize, Serialize};

/// WGS84 position in degrees.
///
/// `(0, 0)` is the sentinel for "conversion failed / source coordinates absent".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const SENTINEL: GeoPoint = GeoPoint { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_sentinel(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// A position together with its encoded spatial key.
///
/// Used for school locations and for bounding box corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedPoint {
    pub lat: f64,
    pub lng: f64,
    pub key: String,
}

/// Box corner. Same shape as a keyed location.
pub type Corner = KeyedPoint;

impl KeyedPoint {
    pub fn new(lat: f64, lng: f64, key: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            key: key.into(),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Axis-aligned box given by its north-east and south-west corners.
///
/// Invariant: `ne.lat >= sw.lat` and `ne.lng >= sw.lng`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub ne: Corner,
    pub sw: Corner,
}

impl BoundingBox {
    pub fn new(ne: Corner, sw: Corner) -> Self {
        Self { ne, sw }
    }

    /// Inclusive on all four edges, so a point on a shared median
    /// belongs to both neighbouring boxes.
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        lat <= self.ne.lat && lat >= self.sw.lat && lng <= self.ne.lng && lng >= self.sw.lng
    }

    /// True when `other` lies entirely inside this box (edges may touch).
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.ne.lat >= other.ne.lat
            && self.ne.lng >= other.ne.lng
            && self.sw.lat <= other.sw.lat
            && self.sw.lng <= other.sw.lng
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.ne.lat + self.sw.lat) / 2.0,
            (self.ne.lng + self.sw.lng) / 2.0,
        )
    }

    pub fn is_well_formed(&self) -> bool {
        self.ne.lat >= self.sw.lat && self.ne.lng >= self.sw.lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(sw: (f64, f64), ne: (f64, f64)) -> BoundingBox {
        BoundingBox::new(
            Corner::new(ne.0, ne.1, "ne"),
            Corner::new(sw.0, sw.1, "sw"),
        )
    }

    #[test]
    fn test_contains_point_is_inclusive() {
        let b = bbox((51.0, -1.0), (52.0, 0.0));
        assert!(b.contains_point(51.0, -1.0));
        assert!(b.contains_point(52.0, 0.0));
        assert!(b.contains_point(51.5, -0.5));
        assert!(!b.contains_point(52.000001, -0.5));
        assert!(!b.contains_point(51.5, 0.1));
    }

    #[test]
    fn test_contains_box() {
        let outer = bbox((51.0, -1.0), (52.0, 0.0));
        let inner = bbox((51.2, -0.8), (51.4, -0.6));
        assert!(outer.contains_box(&inner));
        assert!(outer.contains_box(&outer));
        assert!(!inner.contains_box(&outer));
    }

    #[test]
    fn test_sentinel() {
        assert!(GeoPoint::SENTINEL.is_sentinel());
        assert!(!GeoPoint::new(51.5, -0.1).is_sentinel());
    }
}
