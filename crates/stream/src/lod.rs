/// Maps viewpoint height to a discrete level of detail.
///
/// Calibrated once from the first observed height: that height maps to
/// `min_lod` and `closest_distance` maps to `max_lod`, with one level per
/// `lod_step` units in between. Heights outside that range saturate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodSelector {
    min_lod: u8,
    max_lod: u8,
    closest_distance: f32,
    /// `None` when the range is degenerate; selection then pins to `max_lod`.
    lod_step: Option<f32>,
}

impl LodSelector {
    pub fn calibrate(initial_height: f32, closest_distance: f32, min_lod: u8, max_lod: u8) -> Self {
        let levels = max_lod.saturating_sub(min_lod) as f32;
        let span = initial_height - closest_distance;
        let lod_step = (levels > 0.0 && span.is_finite() && span > 0.0).then(|| span / levels);

        if lod_step.is_none() && levels > 0.0 {
            tracing::warn!(
                initial_height,
                closest_distance,
                "calibration height is not above the ground offset; pinning LOD to max"
            );
        }
        tracing::debug!(min_lod, max_lod, ?lod_step, "lod selector calibrated");

        Self {
            min_lod,
            max_lod,
            closest_distance,
            lod_step,
        }
    }

    pub fn lod_step(&self) -> Option<f32> {
        self.lod_step
    }

    pub fn min_lod(&self) -> u8 {
        self.min_lod
    }

    pub fn max_lod(&self) -> u8 {
        self.max_lod
    }

    /// `clamp(max_lod - round((height - closest_distance) / lod_step), min_lod, max_lod)`
    pub fn select(&self, height: f32) -> u8 {
        let Some(step) = self.lod_step else {
            return self.max_lod;
        };
        let lod = self.max_lod as f32 - ((height - self.closest_distance) / step).round();
        if lod.is_nan() {
            return self.max_lod;
        }
        lod.clamp(self.min_lod as f32, self.max_lod as f32) as u8
    }
}
