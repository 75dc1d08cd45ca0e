//! Coordinate conversion, spatial keys and point normalization.

mod points;
mod projection;
mod spatial_key;

pub use points::PointBuilder;
pub use projection::CoordinateProjector;
pub use spatial_key::{SpatialKeyEncoder, DEFAULT_KEY_PRECISION};
