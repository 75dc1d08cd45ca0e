//! Core data models for the quadrant index.

pub mod geo;
pub mod quadrant;
pub mod school;

pub use geo::{BoundingBox, Corner, GeoPoint, KeyedPoint};
pub use quadrant::{Quadrant, QuadrantIndex};
pub use school::{RawSchoolRow, SchoolPoint};
