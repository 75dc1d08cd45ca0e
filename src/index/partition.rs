//! Quartering of boxes and inclusive point assignment.

use std::sync::Arc;

use crate::models::{BoundingBox, SchoolPoint};
use crate::spatial::SpatialKeyEncoder;

pub struct QuadrantPartitioner {
    encoder: SpatialKeyEncoder,
}

impl QuadrantPartitioner {
    pub fn new(encoder: SpatialKeyEncoder) -> Self {
        Self { encoder }
    }

    /// Split a box at its center into `[NW, NE, SW, SE]`.
    ///
    /// The children tile the parent exactly; they share edges along the two
    /// median lines.
    pub fn split_box(&self, bounds: &BoundingBox) -> [BoundingBox; 4] {
        let center = bounds.center();
        let center = self.encoder.keyed(center.lat, center.lng);

        let nw = BoundingBox::new(
            self.encoder.keyed(bounds.ne.lat, center.lng),
            self.encoder.keyed(center.lat, bounds.sw.lng),
        );
        let ne = BoundingBox::new(bounds.ne.clone(), center.clone());
        let sw = BoundingBox::new(center.clone(), bounds.sw.clone());
        let se = BoundingBox::new(
            self.encoder.keyed(center.lat, bounds.ne.lng),
            self.encoder.keyed(bounds.sw.lat, center.lng),
        );

        [nw, ne, sw, se]
    }
}

/// Points inside `bounds`, edges included.
pub fn assign(points: &[Arc<SchoolPoint>], bounds: &BoundingBox) -> Vec<Arc<SchoolPoint>> {
    points
        .iter()
        .filter(|p| bounds.contains_point(p.lat(), p.lng()))
        .cloned()
        .collect()
}
