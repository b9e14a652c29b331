use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Geographic position in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Unchecked constructor; use [`LatLon::validated`] at data boundaries.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn validated(lat: f64, lon: f64) -> Result<Self, GeoError> {
        Self::new(lat, lon).validate()
    }

    pub fn validate(self) -> Result<Self, GeoError> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(GeoError::NonFinite {
                lat: self.lat,
                lon: self.lon,
            });
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(GeoError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(GeoError::LongitudeOutOfRange(self.lon));
        }
        Ok(self)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// Anything that sits at a single map position.
pub trait Located {
    fn position(&self) -> LatLon;
}

impl Located for LatLon {
    fn position(&self) -> LatLon {
        *self
    }
}
