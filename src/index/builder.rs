//! Recursive construction of the quadrant index.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::bounds::BoundsCalculator;
use super::partition::{assign, QuadrantPartitioner};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::models::{BoundingBox, Quadrant, QuadrantIndex, SchoolPoint};
use crate::spatial::SpatialKeyEncoder;

/// Branches with at least this many matched points build their children in parallel.
const PARALLEL_CUTOFF: usize = 4096;

pub struct QuadrantIndexBuilder {
    bounds: BoundsCalculator,
    partitioner: QuadrantPartitioner,
    max_level: u32,
    split_threshold: usize,
}

impl Default for QuadrantIndexBuilder {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

impl QuadrantIndexBuilder {
    pub fn from_config(config: &IndexConfig) -> Self {
        let encoder = SpatialKeyEncoder::new(config.key_precision);
        Self {
            bounds: BoundsCalculator::new(encoder, config.padding_ratio, config.validity),
            partitioner: QuadrantPartitioner::new(encoder),
            max_level: config.max_level,
            split_threshold: config.split_threshold,
        }
    }

    /// Build the full flat index over `points`.
    ///
    /// Every quadrant with at least one point is kept, at every level, so a
    /// point appears in each ancestor of its deepest quadrant.
    pub fn build(&self, points: &[Arc<SchoolPoint>]) -> Result<QuadrantIndex> {
        info!(
            "Building quadrant index over {} points (max level {}, split above {})",
            points.len(),
            self.max_level,
            self.split_threshold
        );

        let root = self.bounds.compute(points)?;
        let mut quadrants = Vec::new();
        self.recurse(root, points, 0, &mut quadrants);

        let index = QuadrantIndex::from_quadrants(quadrants);
        info!("Quadrant index built with {} quadrants", index.len());
        for (level, count) in index.level_counts().iter().enumerate() {
            debug!("  level {}: {} quadrants", level, count);
        }

        let duplicates = index.duplicate_ids();
        if !duplicates.is_empty() {
            warn!(
                "{} quadrant ids occur more than once (e.g. {})",
                duplicates.len(),
                duplicates[0]
            );
        }

        Ok(index)
    }

    fn recurse(
        &self,
        bounds: BoundingBox,
        candidates: &[Arc<SchoolPoint>],
        level: u32,
        out: &mut Vec<Quadrant>,
    ) {
        let matched = assign(candidates, &bounds);
        if matched.is_empty() {
            return;
        }

        let children = (level < self.max_level && matched.len() > self.split_threshold)
            .then(|| self.partitioner.split_box(&bounds));

        out.push(Quadrant::new(level, bounds, matched.clone()));

        let Some(children) = children else {
            return;
        };

        // Only points of the parent can fall inside a child.
        if matched.len() >= PARALLEL_CUTOFF {
            let branches: Vec<Vec<Quadrant>> = children
                .into_par_iter()
                .map(|child| {
                    let mut local = Vec::new();
                    self.recurse(child, &matched, level + 1, &mut local);
                    local
                })
                .collect();

            for branch in branches {
                out.extend(branch);
            }
        } else {
            for child in children {
                self.recurse(child, &matched, level + 1, out);
            }
        }
    }
}
