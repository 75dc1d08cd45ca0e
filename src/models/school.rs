//! School records before and after spatial normalization.

use serde::{Deserialize, Serialize};

use super::geo::{GeoPoint, KeyedPoint};

/// A row from the national schools dataset, still in national grid coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSchoolRow {
    /// Unique Reference Number
    pub urn: u64,
    pub name: String,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
}

/// Normalized school location. Built once per import and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolPoint {
    pub id: String,
    pub name: String,
    pub location: KeyedPoint,
}

impl SchoolPoint {
    pub fn lat(&self) -> f64 {
        self.location.lat
    }

    pub fn lng(&self) -> f64 {
        self.location.lng
    }

    pub fn geo_point(&self) -> GeoPoint {
        self.location.point()
    }
}
