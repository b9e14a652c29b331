use serde::{Deserialize, Serialize};

use crate::math::LatLon;

/// Lat/lon box in degrees.
///
/// Longitude runs eastward from `west` to `east`. When `west > east` the box
/// crosses the antimeridian. A box spanning every longitude is stored as
/// `-180..180`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Folds a longitude that overshot one edge by less than a full turn.
fn wrap_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Degrees travelled eastward from `from` to `to`, in `[0, 360)`.
fn eastward(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(360.0)
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        GeoBounds {
            south,
            west,
            north,
            east,
        }
    }

    pub fn from_point(p: LatLon) -> Self {
        Self::new(p.lat, p.lon, p.lat, p.lon)
    }

    /// Box of `half_lat`/`half_lon` degrees around `center`, clamped at the
    /// poles and wrapped across the antimeridian.
    pub fn around(center: LatLon, half_lat: f64, half_lon: f64) -> Self {
        let south = (center.lat - half_lat).max(-90.0);
        let north = (center.lat + half_lat).min(90.0);
        if half_lon >= 180.0 {
            return Self::new(south, -180.0, north, 180.0);
        }
        Self::new(
            south,
            wrap_lon(center.lon - half_lon),
            north,
            wrap_lon(center.lon + half_lon),
        )
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLon>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Self::from_point(first);
        for p in iter {
            b.extend(p);
        }
        Some(b)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Grows the box to cover `p`, taking whichever longitude side needs the
    /// shorter extension.
    pub fn extend(&mut self, p: LatLon) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        if self.contains_lon(p.lon) {
            return;
        }
        let grow_east = eastward(self.east, p.lon);
        let grow_west = eastward(p.lon, self.west);
        if grow_east <= grow_west {
            self.east = p.lon;
        } else {
            self.west = p.lon;
        }
    }

    fn contains_lon(&self, lon: f64) -> bool {
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    pub fn contains(&self, p: LatLon) -> bool {
        p.lat >= self.south && p.lat <= self.north && self.contains_lon(p.lon)
    }

    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.south + self.north) * 0.5,
            wrap_lon(self.west + self.lon_span() * 0.5),
        )
    }

    pub fn lat_span(&self) -> f64 {
        (self.north - self.south).max(0.0)
    }

    pub fn lon_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.east + 360.0 - self.west
        } else {
            self.east - self.west
        }
    }

    /// A box with no extent along either axis cannot be framed by fitting.
    pub fn is_degenerate(&self) -> bool {
        self.lat_span() <= f64::EPSILON && self.lon_span() <= f64::EPSILON
    }

    /// Grows each side by `fraction` of the span, clamped at the poles.
    pub fn padded(&self, fraction: f64) -> Self {
        let dlat = self.lat_span() * fraction;
        let dlon = self.lon_span() * fraction;
        let south = (self.south - dlat).max(-90.0);
        let north = (self.north + dlat).min(90.0);
        if self.lon_span() + 2.0 * dlon >= 360.0 {
            return Self::new(south, -180.0, north, 180.0);
        }
        Self::new(south, wrap_lon(self.west - dlon), north, wrap_lon(self.east + dlon))
    }
}
