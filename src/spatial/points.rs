//! Raw rows -> normalized school points.

use std::sync::Arc;

use tracing::{debug, info};

use super::{CoordinateProjector, SpatialKeyEncoder};
use crate::models::{KeyedPoint, RawSchoolRow, SchoolPoint};

pub struct PointBuilder {
    projector: CoordinateProjector,
    encoder: SpatialKeyEncoder,
}

impl PointBuilder {
    pub fn new(projector: CoordinateProjector, encoder: SpatialKeyEncoder) -> Self {
        Self { projector, encoder }
    }

    pub fn build(&self, row: &RawSchoolRow) -> SchoolPoint {
        let position = self.projector.project(row.easting, row.northing);
        if position.is_sentinel() {
            debug!("School {} has no usable coordinates", row.urn);
        }

        SchoolPoint {
            id: row.urn.to_string(),
            name: row.name.clone(),
            location: KeyedPoint::new(
                position.lat,
                position.lng,
                self.encoder.encode(position),
            ),
        }
    }

    pub fn build_all<'a, I>(&self, rows: I) -> Vec<Arc<SchoolPoint>>
    where
        I: IntoIterator<Item = &'a RawSchoolRow>,
    {
        let points: Vec<Arc<SchoolPoint>> = rows
            .into_iter()
            .map(|row| Arc::new(self.build(row)))
            .collect();

        let unlocated = points
            .iter()
            .filter(|p| p.geo_point().is_sentinel())
            .count();
        info!(
            "Built {} school points ({} without coordinates)",
            points.len(),
            unlocated
        );

        points
    }
}
