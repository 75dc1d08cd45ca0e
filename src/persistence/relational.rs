//! Normalized rows: bounding boxes, quadrants and quadrant membership.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{PointInterner, RecordMapper};
use crate::models::{BoundingBox, Corner, KeyedPoint, Quadrant, QuadrantIndex, SchoolPoint};

/// Boxes are keyed by their encoded corners, so quadrants with identical
/// bounds share a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxRow {
    pub id: String,
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub ne_key: String,
    pub sw_lat: f64,
    pub sw_lng: f64,
    pub sw_key: String,
}

impl BoundingBoxRow {
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        Self {
            id: bounding_box_id(bounds),
            ne_lat: bounds.ne.lat,
            ne_lng: bounds.ne.lng,
            ne_key: bounds.ne.key.clone(),
            sw_lat: bounds.sw.lat,
            sw_lng: bounds.sw.lng,
            sw_key: bounds.sw.key.clone(),
        }
    }

    pub fn to_bounds(&self) -> BoundingBox {
        BoundingBox::new(
            Corner::new(self.ne_lat, self.ne_lng, self.ne_key.clone()),
            Corner::new(self.sw_lat, self.sw_lng, self.sw_key.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantRow {
    pub id: String,
    pub level: i32,
    pub bounding_box_id: String,
    pub point_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantPointRow {
    pub quadrant_id: String,
    pub point_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalTables {
    pub bounding_boxes: Vec<BoundingBoxRow>,
    pub quadrants: Vec<QuadrantRow>,
    pub quadrant_points: Vec<QuadrantPointRow>,
}

pub fn bounding_box_id(bounds: &BoundingBox) -> String {
    format!("{}_{}", bounds.sw.key, bounds.ne.key)
}

#[derive(Debug, Default)]
pub struct RelationalMapper;

impl RecordMapper for RelationalMapper {
    type Records = RelationalTables;

    fn to_records(&self, index: &QuadrantIndex) -> RelationalTables {
        let mut tables = RelationalTables::default();
        let mut seen_boxes: HashSet<String> = HashSet::new();

        for quadrant in index.iter() {
            let bbox = BoundingBoxRow::from_bounds(&quadrant.bounds);
            let bounding_box_id = bbox.id.clone();
            if seen_boxes.insert(bbox.id.clone()) {
                tables.bounding_boxes.push(bbox);
            }

            tables.quadrants.push(QuadrantRow {
                id: quadrant.id.clone(),
                level: quadrant.level as i32,
                bounding_box_id,
                point_count: quadrant.point_count as i32,
            });

            tables
                .quadrant_points
                .extend(quadrant.points.iter().map(|p| QuadrantPointRow {
                    quadrant_id: quadrant.id.clone(),
                    point_id: p.id.clone(),
                    name: p.name.clone(),
                    lat: p.location.lat,
                    lng: p.location.lng,
                    key: p.location.key.clone(),
                }));
        }

        tables
    }

    /// Rebuild quadrants in the order of `records.quadrants`. Quadrants whose
    /// bounding box row is missing are dropped.
    fn from_records(&self, records: RelationalTables) -> QuadrantIndex {
        let boxes: HashMap<String, BoundingBox> = records
            .bounding_boxes
            .iter()
            .map(|row| (row.id.clone(), row.to_bounds()))
            .collect();

        let mut interner = PointInterner::default();
        let mut members: HashMap<String, Vec<_>> = HashMap::new();
        for row in records.quadrant_points {
            let point = interner.intern(SchoolPoint {
                id: row.point_id,
                name: row.name,
                location: KeyedPoint::new(row.lat, row.lng, row.key),
            });
            members.entry(row.quadrant_id).or_default().push(point);
        }

        let mut quadrants = Vec::with_capacity(records.quadrants.len());
        for row in records.quadrants {
            let Some(bounds) = boxes.get(&row.bounding_box_id) else {
                warn!(
                    "Quadrant {} references missing bounding box {}",
                    row.id, row.bounding_box_id
                );
                continue;
            };

            let points = members.remove(&row.id).unwrap_or_default();
            if points.len() != row.point_count as usize {
                warn!(
                    "Quadrant {} stores point_count {} but has {} point rows",
                    row.id,
                    row.point_count,
                    points.len()
                );
            }

            quadrants.push(Quadrant {
                id: row.id,
                level: row.level.max(0) as u32,
                bounds: bounds.clone(),
                point_count: row.point_count.max(0) as usize,
                points,
            });
        }

        QuadrantIndex::from_quadrants(quadrants)
    }
}
