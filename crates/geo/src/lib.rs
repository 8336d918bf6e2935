//! Geo math: geographic coordinates, the local Cartesian projection, and
//! quadtree (web mercator) tile addressing.
//!
//! # Invariants
//! - All geographic math runs in f64; only the local frame is handed out as f32.
//! - A projection is immutable. Re-basing builds a new one.

mod coordinate;
mod projection;
mod quadkey;

pub use coordinate::GeoCoordinate;
pub use projection::{CartesianProjection, EARTH_RADIUS_M};
pub use quadkey::{MAX_LOD, QuadKey, QuadKeyParseError, address_of};
