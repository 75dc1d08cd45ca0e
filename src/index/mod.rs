//! Hierarchical quadrant index over school points.
//!
//! The root covers the padded extent of the whole dataset; any quadrant with
//! more than `split_threshold` points is quartered until `max_level`.

mod bounds;
mod builder;
mod partition;
mod query;

pub use bounds::BoundsCalculator;
pub use builder::QuadrantIndexBuilder;
pub use partition::{assign, QuadrantPartitioner};
pub use query::{query, QuadrantQueryService};
