use thiserror::Error;

/// Rejections for coordinates that cannot be placed on the map.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("coordinate is not finite: lat={lat} lon={lon}")]
    NonFinite { lat: f64, lon: f64 },
    #[error("latitude out of range [-90, 90]: {0}")]
    LatitudeOutOfRange(f64),
    #[error("longitude out of range [-180, 180]: {0}")]
    LongitudeOutOfRange(f64),
    #[error("latitude or longitude is missing or not a number")]
    MissingCoordinate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("unrecognized timestamp {0:?}; expected epoch millis, RFC 3339 or YYYY-MM-DD")]
    Unrecognized(String),
}
