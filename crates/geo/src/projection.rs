use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::GeoCoordinate;

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Maps a local Cartesian plane (x east, y north, meters) to geographic
/// coordinates around a fixed reference point.
///
/// Equirectangular approximation tangent at the reference: accurate to well
/// under a meter within a few kilometers of it, which is the range the
/// floating origin keeps the viewpoint in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianProjection {
    origin: GeoCoordinate,
}

impl CartesianProjection {
    pub fn new(origin: GeoCoordinate) -> Self {
        Self { origin }
    }

    /// The geographic point that maps to local (0, 0).
    pub fn origin(&self) -> GeoCoordinate {
        self.origin
    }

    /// A projection around a different reference point.
    pub fn with_origin(&self, origin: GeoCoordinate) -> Self {
        Self::new(origin)
    }

    pub fn to_geo(&self, local: DVec2) -> GeoCoordinate {
        let lat0 = self.origin.latitude.to_radians();
        let latitude = self.origin.latitude + (local.y / EARTH_RADIUS_M).to_degrees();
        let longitude =
            self.origin.longitude + (local.x / (EARTH_RADIUS_M * lat0.cos())).to_degrees();
        GeoCoordinate::new(latitude, longitude).wrapped()
    }

    pub fn to_local(&self, geo: GeoCoordinate) -> DVec2 {
        let lat0 = self.origin.latitude.to_radians();
        let mut dlon = geo.longitude - self.origin.longitude;
        // Shortest way round the antimeridian.
        dlon = (dlon + 180.0).rem_euclid(360.0) - 180.0;
        DVec2::new(
            dlon.to_radians() * EARTH_RADIUS_M * lat0.cos(),
            (geo.latitude - self.origin.latitude).to_radians() * EARTH_RADIUS_M,
        )
    }
}
