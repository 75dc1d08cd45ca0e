//! Quadrants and the flat index that holds them.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::geo::BoundingBox;
use super::school::SchoolPoint;

/// One materialized node of the spatial index.
///
/// `point_count == points.len()` always holds for quadrants produced by the
/// builder. Points are shared between a quadrant and all of its ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quadrant {
    /// `"{level}_{sw.key}_{ne.key}"`
    pub id: String,
    pub level: u32,
    pub bounds: BoundingBox,
    pub point_count: usize,
    pub points: Vec<Arc<SchoolPoint>>,
}

impl Quadrant {
    pub fn new(level: u32, bounds: BoundingBox, points: Vec<Arc<SchoolPoint>>) -> Self {
        Self {
            id: quadrant_id(&bounds, level),
            level,
            point_count: points.len(),
            bounds,
            points,
        }
    }
}

/// Deterministic quadrant identifier.
///
/// Not guaranteed unique: two boxes whose corners encode to the same keys at
/// the same level collide.
pub fn quadrant_id(bounds: &BoundingBox, level: u32) -> String {
    format!("{}_{}_{}", level, bounds.sw.key, bounds.ne.key)
}

/// Flat, immutable collection of every materialized quadrant across all levels.
///
/// Parent/child relations are implicit in `level` and bounds containment.
/// Quadrants keep the order they were produced in (depth-first, NW, NE, SW, SE).
#[derive(Debug, Clone, Default)]
pub struct QuadrantIndex {
    quadrants: Vec<Quadrant>,
    /// First occurrence of each id
    by_id: HashMap<String, usize>,
    /// Positions of quadrants per level
    by_level: Vec<Vec<usize>>,
}

impl QuadrantIndex {
    pub fn from_quadrants(quadrants: Vec<Quadrant>) -> Self {
        let mut by_id = HashMap::with_capacity(quadrants.len());
        let mut by_level: Vec<Vec<usize>> = Vec::new();

        for (pos, quadrant) in quadrants.iter().enumerate() {
            by_id.entry(quadrant.id.clone()).or_insert(pos);

            let level = quadrant.level as usize;
            if by_level.len() <= level {
                by_level.resize_with(level + 1, Vec::new);
            }
            by_level[level].push(pos);
        }

        Self {
            quadrants,
            by_id,
            by_level,
        }
    }

    pub fn len(&self) -> usize {
        self.quadrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quadrants.is_empty()
    }

    pub fn quadrants(&self) -> &[Quadrant] {
        &self.quadrants
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quadrant> {
        self.quadrants.iter()
    }

    pub fn into_quadrants(self) -> Vec<Quadrant> {
        self.quadrants
    }

    /// Look up a quadrant by id. On id collisions the first one produced wins.
    pub fn get(&self, id: &str) -> Option<&Quadrant> {
        self.by_id.get(id).map(|&pos| &self.quadrants[pos])
    }

    /// The single level-0 quadrant, if the index has been built.
    pub fn root(&self) -> Option<&Quadrant> {
        self.at_level(0).next()
    }

    pub fn at_level(&self, level: u32) -> impl Iterator<Item = &Quadrant> {
        self.by_level
            .get(level as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&pos| &self.quadrants[pos])
    }

    /// Number of levels present (deepest level + 1).
    pub fn levels(&self) -> usize {
        self.by_level.len()
    }

    /// Quadrant count for every level, shallowest first.
    pub fn level_counts(&self) -> Vec<usize> {
        self.by_level.iter().map(Vec::len).collect()
    }

    /// Ids that occur more than once, each listed once.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(self.quadrants.len());
        for quadrant in &self.quadrants {
            *seen.entry(quadrant.id.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        duplicates.sort();
        duplicates
    }
}

impl Serialize for QuadrantIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.quadrants)
    }
}

impl<'de> Deserialize<'de> for QuadrantIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let quadrants = Vec::<Quadrant>::deserialize(deserializer)?;
        Ok(Self::from_quadrants(quadrants))
    }
}
