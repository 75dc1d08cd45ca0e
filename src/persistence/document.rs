//! One document per quadrant with its points embedded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PointInterner, RecordMapper};
use crate::models::{BoundingBox, KeyedPoint, Quadrant, QuadrantIndex, SchoolPoint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDocument {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub key: String,
}

/// Quadrant document as stored in the document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadrantDocument {
    pub id: String,
    pub level: u32,
    pub bounds: BoundingBox,
    pub point_count: usize,
    pub points: Vec<PointDocument>,

    /// Import timestamp for refresh tracking
    pub import_timestamp: DateTime<Utc>,
}

pub struct DocumentMapper {
    import_timestamp: DateTime<Utc>,
}

impl Default for DocumentMapper {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl DocumentMapper {
    pub fn new(import_timestamp: DateTime<Utc>) -> Self {
        Self { import_timestamp }
    }

    pub fn to_document(&self, quadrant: &Quadrant) -> QuadrantDocument {
        QuadrantDocument {
            id: quadrant.id.clone(),
            level: quadrant.level,
            bounds: quadrant.bounds.clone(),
            point_count: quadrant.point_count,
            points: quadrant
                .points
                .iter()
                .map(|p| PointDocument {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    lat: p.location.lat,
                    lng: p.location.lng,
                    key: p.location.key.clone(),
                })
                .collect(),
            import_timestamp: self.import_timestamp,
        }
    }
}

impl RecordMapper for DocumentMapper {
    type Records = Vec<QuadrantDocument>;

    fn to_records(&self, index: &QuadrantIndex) -> Vec<QuadrantDocument> {
        index.iter().map(|q| self.to_document(q)).collect()
    }

    fn from_records(&self, records: Vec<QuadrantDocument>) -> QuadrantIndex {
        let mut interner = PointInterner::default();

        let quadrants = records
            .into_iter()
            .map(|doc| Quadrant {
                id: doc.id,
                level: doc.level,
                bounds: doc.bounds,
                point_count: doc.point_count,
                points: doc
                    .points
                    .into_iter()
                    .map(|p| {
                        interner.intern(SchoolPoint {
                            id: p.id,
                            name: p.name,
                            location: KeyedPoint::new(p.lat, p.lng, p.key),
                        })
                    })
                    .collect(),
            })
            .collect();

        QuadrantIndex::from_quadrants(quadrants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, PointValidity};
    use crate::index::QuadrantIndexBuilder;
    use std::sync::Arc;

    fn index() -> QuadrantIndex {
        let points: Vec<Arc<SchoolPoint>> = (0..120)
            .map(|i| {
                Arc::new(SchoolPoint {
                    id: (100000 + i).to_string(),
                    name: format!("School {}", i),
                    location: KeyedPoint::new(
                        51.0 + (i % 12) as f64 / 12.0,
                        -1.0 + (i / 12) as f64 / 10.0,
                        "gcpsw0000",
                    ),
                })
            })
            .collect();
        let config = IndexConfig {
            validity: PointValidity::NonSentinel,
            ..IndexConfig::default()
        };
        QuadrantIndexBuilder::from_config(&config).build(&points).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let index = index();
        let docs = DocumentMapper::default().to_records(&index);
        assert_eq!(docs.len(), index.len());

        let json = serde_json::to_value(&docs[0]).unwrap();
        assert_eq!(json["level"], 0);
        assert_eq!(json["point_count"], 120);
        assert_eq!(json["points"].as_array().unwrap().len(), 120);
        assert!(json["bounds"]["ne"]["key"].is_string());
        assert!(json["import_timestamp"].is_string());
    }

    #[test]
    fn test_round_trip() {
        let index = index();
        let mapper = DocumentMapper::default();
        let restored = mapper.from_records(mapper.to_records(&index));
        assert_eq!(restored.quadrants(), index.quadrants());
    }

    #[test]
    fn test_restored_points_are_shared() {
        let index = index();
        let mapper = DocumentMapper::default();
        let restored = mapper.from_records(mapper.to_records(&index));

        let root = restored.root().unwrap();
        let child = restored.at_level(1).next().unwrap();
        let shared = child.points[0].clone();
        let in_root = root.points.iter().find(|p| p.id == shared.id).unwrap();
        assert!(Arc::ptr_eq(in_root, &shared));
    }
}
