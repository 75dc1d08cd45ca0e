//! Mapping between the quadrant index and storage record shapes.
//!
//! Each storage shape implements [`RecordMapper`]; the index types stay the
//! single source of truth and mappers never alter what they are given.

mod document;
mod relational;

pub use document::{DocumentMapper, PointDocument, QuadrantDocument};
pub use relational::{
    BoundingBoxRow, QuadrantPointRow, QuadrantRow, RelationalMapper, RelationalTables,
};

use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::IndexError;
use crate::models::{QuadrantIndex, SchoolPoint};

pub trait RecordMapper {
    type Records;

    fn to_records(&self, index: &QuadrantIndex) -> Self::Records;

    fn from_records(&self, records: Self::Records) -> QuadrantIndex;
}

/// Write-time uniqueness check for stores that key quadrants by id.
pub fn ensure_unique_ids(index: &QuadrantIndex) -> Result<(), IndexError> {
    let duplicates = index.duplicate_ids();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(IndexError::DuplicateQuadrantIds(duplicates))
    }
}

/// Shares one allocation per school across all quadrants that contain it.
#[derive(Default)]
pub(crate) struct PointInterner {
    points: HashMap<String, Arc<SchoolPoint>>,
}

impl PointInterner {
    pub(crate) fn intern(&mut self, point: SchoolPoint) -> Arc<SchoolPoint> {
        match self.points.get(&point.id) {
            Some(existing) if **existing == point => Arc::clone(existing),
            _ => {
                let shared = Arc::new(point);
                self.points
                    .insert(shared.id.clone(), Arc::clone(&shared));
                shared
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::QuadrantIndexBuilder;
    use crate::models::KeyedPoint;

    fn school(id: usize, lat: f64, lng: f64) -> Arc<SchoolPoint> {
        Arc::new(SchoolPoint {
            id: id.to_string(),
            name: format!("School {}", id),
            location: KeyedPoint::new(lat, lng, ""),
        })
    }

    #[test]
    fn test_unique_ids_pass() {
        let points: Vec<_> = (0..80)
            .map(|i| school(i, 52.0 + (i % 9) as f64 / 10.0, 0.5 + (i / 9) as f64 / 10.0))
            .collect();
        let index = QuadrantIndexBuilder::default().build(&points).unwrap();
        assert!(ensure_unique_ids(&index).is_ok());
    }

    #[test]
    fn test_collapsed_boxes_rejected() {
        let config = IndexConfig {
            max_level: 1,
            ..IndexConfig::default()
        };
        let points: Vec<_> = (0..60).map(|i| school(i, 52.5, 1.5)).collect();
        let index = QuadrantIndexBuilder::from_config(&config).build(&points).unwrap();
        assert!(matches!(
            ensure_unique_ids(&index),
            Err(IndexError::DuplicateQuadrantIds(ids)) if ids.len() == 1
        ));
    }

    #[test]
    fn test_interner_shares_equal_points() {
        let mut interner = PointInterner::default();
        let a = interner.intern(SchoolPoint {
            id: "1".to_string(),
            name: "A".to_string(),
            location: KeyedPoint::new(52.0, 1.0, "u12"),
        });
        let b = interner.intern((*a).clone());
        assert!(Arc::ptr_eq(&a, &b));
    }
}
