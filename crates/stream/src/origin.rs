use glam::{DVec2, Vec2, Vec3};
use tilespace_geo::{CartesianProjection, GeoCoordinate};

/// Outcome of a re-base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rebase {
    /// Horizontal offset from the old origin to the viewpoint. The world
    /// root moves by the negation of this.
    pub displacement: Vec3,
    /// Geographic point now at the local origin.
    pub geo_origin: GeoCoordinate,
    /// Replacement projection built around `geo_origin`.
    pub projection: CartesianProjection,
}

/// Keeps the viewpoint near the local origin so f32 world coordinates stay
/// precise however far it travels.
///
/// The local origin's horizontal position is always zero; only its height
/// is carried.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingOrigin {
    threshold: f32,
    local_origin: Vec3,
    geo_origin: GeoCoordinate,
}

impl FloatingOrigin {
    pub fn new(geo_origin: GeoCoordinate, threshold: f32) -> Self {
        Self {
            threshold,
            local_origin: Vec3::ZERO,
            geo_origin,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn local_origin(&self) -> Vec3 {
        self.local_origin
    }

    pub fn geo_origin(&self) -> GeoCoordinate {
        self.geo_origin
    }

    /// Distance from the origin ignoring the vertical axis.
    pub fn planar_distance(&self, viewpoint: Vec3) -> f32 {
        Vec2::new(
            viewpoint.x - self.local_origin.x,
            viewpoint.z - self.local_origin.z,
        )
        .length()
    }

    /// Viewpoint in projection coordinates: x east, y north (world z).
    pub fn planar_offset(&self, viewpoint: Vec3) -> DVec2 {
        DVec2::new(
            (viewpoint.x - self.local_origin.x) as f64,
            (viewpoint.z - self.local_origin.z) as f64,
        )
    }

    /// Re-base if the viewpoint is at least `threshold` from the origin.
    ///
    /// Advances the geographic origin through `projection` and returns the
    /// replacement projection; the caller swaps it in and shifts the world.
    /// A non-finite distance never re-bases.
    pub fn check(&mut self, viewpoint: Vec3, projection: &CartesianProjection) -> Option<Rebase> {
        let distance = self.planar_distance(viewpoint);
        if !distance.is_finite() || distance < self.threshold {
            return None;
        }

        let displacement = Vec3::new(
            viewpoint.x - self.local_origin.x,
            0.0,
            viewpoint.z - self.local_origin.z,
        );
        self.local_origin.x = 0.0;
        self.local_origin.z = 0.0;

        let geo_origin =
            projection.to_geo(DVec2::new(displacement.x as f64, displacement.z as f64));
        self.geo_origin = geo_origin;

        tracing::info!(
            distance,
            dx = displacement.x,
            dz = displacement.z,
            origin = %geo_origin,
            "re-based floating origin"
        );

        Some(Rebase {
            displacement,
            geo_origin,
            projection: projection.with_origin(geo_origin),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERLIN: GeoCoordinate = GeoCoordinate::new(52.5317429, 13.3871987);

    #[test]
    fn below_threshold_does_nothing() {
        let projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        assert!(origin.check(Vec3::new(999.9, 400.0, 0.0), &projection).is_none());
        assert_eq!(origin.geo_origin(), BERLIN);
    }

    #[test]
    fn at_or_past_threshold_rebases() {
        let projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        let viewpoint = Vec3::new(1000.1, 400.0, 0.0);

        let rebase = origin.check(viewpoint, &projection).unwrap();
        assert_eq!(rebase.displacement, Vec3::new(1000.1, 0.0, 0.0));
        assert_eq!(rebase.projection.origin(), rebase.geo_origin);
        assert_eq!(origin.geo_origin(), rebase.geo_origin);

        let after = viewpoint - rebase.displacement;
        assert!(origin.planar_distance(after) < 1e-3);
        assert_eq!(after.y, 400.0);
    }

    #[test]
    fn non_finite_viewpoint_never_rebases() {
        let projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        for bad in [
            Vec3::new(f32::NAN, 100.0, 0.0),
            Vec3::new(0.0, 100.0, f32::NAN),
            Vec3::new(f32::INFINITY, 100.0, 0.0),
        ] {
            assert!(origin.check(bad, &projection).is_none());
        }
        assert_eq!(origin.geo_origin(), BERLIN);
        assert_eq!(origin.local_origin(), Vec3::ZERO);
    }

    #[test]
    fn vertical_distance_is_ignored() {
        let projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        assert!(origin.check(Vec3::new(0.0, 5000.0, 0.0), &projection).is_none());
        assert!(origin.check(Vec3::new(600.0, 0.0, 800.0), &projection).is_some());
    }

    #[test]
    fn viewpoint_geo_is_unchanged_by_rebase() {
        let projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        let viewpoint = Vec3::new(-830.5, 120.0, 1410.25);

        let before = projection.to_geo(origin.planar_offset(viewpoint));
        let rebase = origin.check(viewpoint, &projection).unwrap();
        let after = rebase
            .projection
            .to_geo(origin.planar_offset(viewpoint - rebase.displacement));

        assert!(before.approx_eq(&after, 1e-9), "{before} vs {after}");
    }

    #[test]
    fn repeated_rebases_track_travel() {
        let mut projection = CartesianProjection::new(BERLIN);
        let mut origin = FloatingOrigin::new(BERLIN, 1000.0);
        let mut viewpoint = Vec3::ZERO;
        let mut rebases = 0;

        // 20 km east in 100 m steps.
        for _ in 0..200 {
            viewpoint.x += 100.0;
            if let Some(rebase) = origin.check(viewpoint, &projection) {
                viewpoint -= rebase.displacement;
                projection = rebase.projection;
                rebases += 1;
            }
            assert!(viewpoint.x.abs() < 1000.0);
        }
        assert_eq!(rebases, 20);

        let expected = CartesianProjection::new(BERLIN).to_geo(DVec2::new(20_000.0, 0.0));
        let reached = projection.to_geo(origin.planar_offset(viewpoint));
        assert!(reached.approx_eq(&expected, 1e-6), "{reached} vs {expected}");
    }
}
