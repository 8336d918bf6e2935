use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GeoCoordinate;

/// Deepest level of detail an address can carry; tile indices stay in `i32`.
pub const MAX_LOD: u8 = 30;

/// Web mercator latitude cut-off; the pyramid is square between these.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Address of one tile in the quadtree pyramid.
///
/// Indices are signed so that neighbors of edge tiles can be represented
/// before they are normalized. Equality and hashing are by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuadKey {
    pub tile_x: i32,
    pub tile_y: i32,
    pub lod: u8,
}

/// Errors from parsing a tile address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuadKeyParseError {
    #[error("expected \"lod/x/y\", got {0:?}")]
    Format(String),
    #[error("invalid number in {0:?}")]
    Number(String),
    #[error("level of detail {0} exceeds {max}", max = MAX_LOD)]
    LodTooDeep(usize),
    #[error("invalid quadkey digit {0:?}")]
    Digit(char),
}

/// The tile containing `geo` at `lod` (clamped to [`MAX_LOD`]).
///
/// Latitudes beyond the mercator cut-off saturate to the top or bottom row.
pub fn address_of(geo: GeoCoordinate, lod: u8) -> QuadKey {
    let lod = lod.min(MAX_LOD);
    let n = (1u64 << lod) as f64;
    let lat = geo.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let lon = geo.wrapped().longitude;

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();
    let max = n - 1.0;

    QuadKey::new(x.clamp(0.0, max) as i32, y.clamp(0.0, max) as i32, lod)
}

impl QuadKey {
    pub const fn new(tile_x: i32, tile_y: i32, lod: u8) -> Self {
        Self {
            tile_x,
            tile_y,
            lod,
        }
    }

    /// Number of tiles along one axis at this level.
    pub fn tiles_per_axis(&self) -> i64 {
        1i64 << self.lod.min(MAX_LOD)
    }

    /// Whether both indices fall inside the pyramid at this level.
    pub fn is_valid(&self) -> bool {
        let n = self.tiles_per_axis();
        self.lod <= MAX_LOD
            && (0..n).contains(&(self.tile_x as i64))
            && (0..n).contains(&(self.tile_y as i64))
    }

    /// Wrap X across the antimeridian; `None` if Y is off the top or bottom.
    pub fn normalized(&self) -> Option<Self> {
        if self.lod > MAX_LOD {
            return None;
        }
        let n = self.tiles_per_axis();
        if !(0..n).contains(&(self.tile_y as i64)) {
            return None;
        }
        let x = (self.tile_x as i64).rem_euclid(n) as i32;
        Some(Self::new(x, self.tile_y, self.lod))
    }

    /// Self followed by N, NE, E, SE, S, SW, W, NW. North is `y - 1`.
    ///
    /// No bounds checking: neighbors of edge tiles may be out of range.
    pub fn neighborhood(&self) -> [QuadKey; 9] {
        const OFFSETS: [(i32, i32); 9] = [
            (0, 0),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
        ];
        OFFSETS.map(|(dx, dy)| {
            QuadKey::new(
                self.tile_x.wrapping_add(dx),
                self.tile_y.wrapping_add(dy),
                self.lod,
            )
        })
    }

    pub fn parent(&self) -> Option<Self> {
        if self.lod == 0 {
            return None;
        }
        Some(Self::new(
            self.tile_x.div_euclid(2),
            self.tile_y.div_euclid(2),
            self.lod - 1,
        ))
    }

    /// The four tiles one level down, in quadkey digit order (NW, NE, SW, SE).
    ///
    /// `None` at [`MAX_LOD`] or for an address outside the pyramid.
    pub fn children(&self) -> Option<[QuadKey; 4]> {
        if self.lod >= MAX_LOD || !self.is_valid() {
            return None;
        }
        let (x, y, lod) = (self.tile_x * 2, self.tile_y * 2, self.lod + 1);
        Some([
            Self::new(x, y, lod),
            Self::new(x + 1, y, lod),
            Self::new(x, y + 1, lod),
            Self::new(x + 1, y + 1, lod),
        ])
    }

    /// Standard base-4 quadkey digits, one per level. Empty at level 0.
    ///
    /// Levels beyond [`MAX_LOD`] are truncated to it.
    pub fn to_quadkey_string(&self) -> String {
        (1..=self.lod.min(MAX_LOD))
            .rev()
            .map(|i| {
                let mask = 1i32 << (i - 1);
                let mut digit = b'0';
                if self.tile_x & mask != 0 {
                    digit += 1;
                }
                if self.tile_y & mask != 0 {
                    digit += 2;
                }
                digit as char
            })
            .collect()
    }

    pub fn from_quadkey_str(digits: &str) -> Result<Self, QuadKeyParseError> {
        let lod = digits.chars().count();
        if lod > MAX_LOD as usize {
            return Err(QuadKeyParseError::LodTooDeep(lod));
        }
        let (mut x, mut y) = (0i32, 0i32);
        for c in digits.chars() {
            x <<= 1;
            y <<= 1;
            match c {
                '0' => {}
                '1' => x |= 1,
                '2' => y |= 1,
                '3' => {
                    x |= 1;
                    y |= 1;
                }
                other => return Err(QuadKeyParseError::Digit(other)),
            }
        }
        Ok(Self::new(x, y, lod as u8))
    }

    /// (south, west, north, east) in degrees.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let n = self.tiles_per_axis() as f64;
        let lon = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
        let (x, y) = (self.tile_x as f64, self.tile_y as f64);
        (lat(y + 1.0), lon(x), lat(y), lon(x + 1.0))
    }

    pub fn center(&self) -> GeoCoordinate {
        let (south, west, north, east) = self.bounds();
        GeoCoordinate::new((south + north) / 2.0, (west + east) / 2.0)
    }
}

impl std::fmt::Display for QuadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.lod, self.tile_x, self.tile_y)
    }
}

impl FromStr for QuadKey {
    type Err = QuadKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [lod, x, y] = parts.as_slice() else {
            return Err(QuadKeyParseError::Format(s.to_string()));
        };
        let number = |_: std::num::ParseIntError| QuadKeyParseError::Number(s.to_string());
        let lod: u8 = lod.parse().map_err(number)?;
        if lod > MAX_LOD {
            return Err(QuadKeyParseError::LodTooDeep(lod as usize));
        }
        Ok(Self::new(
            x.parse().map_err(number)?,
            y.parse().map_err(number)?,
            lod,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const BERLIN: GeoCoordinate = GeoCoordinate::new(52.5317429, 13.3871987);

    #[test]
    fn address_of_known_points() {
        assert_eq!(address_of(BERLIN, 16), QuadKey::new(35205, 21489, 16));
        assert_eq!(address_of(BERLIN, 14), QuadKey::new(8801, 5372, 14));
        assert_eq!(
            address_of(GeoCoordinate::new(-33.8688, 151.2093), 10),
            QuadKey::new(942, 614, 10)
        );
    }

    #[test]
    fn address_of_level_zero_is_single_tile() {
        assert_eq!(address_of(BERLIN, 0), QuadKey::new(0, 0, 0));
        assert_eq!(
            address_of(GeoCoordinate::new(-80.0, -179.0), 0),
            QuadKey::new(0, 0, 0)
        );
    }

    #[test]
    fn address_of_saturates_at_edges() {
        let top = address_of(GeoCoordinate::new(89.9, 180.0), 4);
        assert_eq!(top.tile_y, 0);
        assert!(top.is_valid());
        let bottom = address_of(GeoCoordinate::new(-90.0, 179.9999), 4);
        assert_eq!(bottom, QuadKey::new(15, 15, 4));
    }

    #[test]
    fn address_contains_its_point() {
        let key = address_of(BERLIN, 12);
        let (south, west, north, east) = key.bounds();
        assert!(south <= BERLIN.latitude && BERLIN.latitude <= north);
        assert!(west <= BERLIN.longitude && BERLIN.longitude <= east);
        assert_eq!(address_of(key.center(), 12), key);
    }

    #[test]
    fn neighborhood_is_nine_distinct_in_stable_order() {
        let q = QuadKey::new(10, 20, 8);
        let n = q.neighborhood();
        assert_eq!(n[0], q);
        assert_eq!(n[1], QuadKey::new(10, 19, 8));
        assert_eq!(n[3], QuadKey::new(11, 20, 8));
        assert_eq!(n[8], QuadKey::new(9, 19, 8));
        let distinct: HashSet<_> = n.iter().collect();
        assert_eq!(distinct.len(), 9);
        assert_eq!(q.neighborhood(), n);
    }

    #[test]
    fn neighborhood_is_unchecked_at_edges() {
        let corner = QuadKey::new(0, 0, 3);
        let n = corner.neighborhood();
        assert_eq!(n.len(), 9);
        assert_eq!(n.iter().filter(|k| !k.is_valid()).count(), 5);
    }

    #[test]
    fn normalized_wraps_x_and_drops_y() {
        assert_eq!(
            QuadKey::new(-1, 3, 3).normalized(),
            Some(QuadKey::new(7, 3, 3))
        );
        assert_eq!(
            QuadKey::new(8, 3, 3).normalized(),
            Some(QuadKey::new(0, 3, 3))
        );
        assert_eq!(QuadKey::new(2, -1, 3).normalized(), None);
        assert_eq!(QuadKey::new(2, 8, 3).normalized(), None);
    }

    #[test]
    fn parent_and_children_agree() {
        let q = QuadKey::new(35205, 21489, 16);
        for child in q.children().unwrap() {
            assert_eq!(child.parent(), Some(q));
        }
        assert_eq!(QuadKey::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn children_stop_at_deepest_level() {
        assert_eq!(QuadKey::new(0, 0, MAX_LOD).children(), None);
        assert_eq!(QuadKey::new(0, 0, u8::MAX).children(), None);
        assert_eq!(QuadKey::new(-1, 0, 4).children(), None);
        assert!(QuadKey::new(0, 0, MAX_LOD - 1).children().is_some());
    }

    #[test]
    fn quadkey_string_is_bounded_for_oversized_levels() {
        assert_eq!(QuadKey::new(0, 0, u8::MAX).to_quadkey_string().len(), MAX_LOD as usize);
        assert_eq!(QuadKey::new(1, 0, 40).to_quadkey_string(), "0".repeat(29) + "1");
    }

    #[test]
    fn quadkey_string_matches_reference_tile() {
        assert_eq!(QuadKey::new(3, 5, 3).to_quadkey_string(), "213");
        assert_eq!(QuadKey::new(0, 0, 0).to_quadkey_string(), "");
        assert_eq!(
            QuadKey::new(35205, 21489, 16).to_quadkey_string(),
            "1202102332220103"
        );
    }

    #[test]
    fn quadkey_string_parses_back() {
        let q = QuadKey::from_quadkey_str("213").unwrap();
        assert_eq!(q, QuadKey::new(3, 5, 3));
        assert_eq!(
            QuadKey::from_quadkey_str("21x"),
            Err(QuadKeyParseError::Digit('x'))
        );
    }

    #[test]
    fn display_and_parse() {
        let q = QuadKey::new(8801, 5372, 14);
        assert_eq!(q.to_string(), "14/8801/5372");
        assert_eq!("14/8801/5372".parse::<QuadKey>().unwrap(), q);
        assert!(matches!(
            "14/8801".parse::<QuadKey>(),
            Err(QuadKeyParseError::Format(_))
        ));
        assert!(matches!(
            "a/1/2".parse::<QuadKey>(),
            Err(QuadKeyParseError::Number(_))
        ));
        assert!(matches!(
            "31/1/2".parse::<QuadKey>(),
            Err(QuadKeyParseError::LodTooDeep(31))
        ));
    }
}
