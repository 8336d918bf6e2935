use serde::{Deserialize, Serialize};
use std::path::Path;
use tilespace_geo::{GeoCoordinate, MAX_LOD};

use crate::ConfigError;

/// Which elevation data the tile pipeline should sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationKind {
    /// Flat ground at height zero.
    #[default]
    Flat,
    /// Regular height grid.
    Grid,
}

/// Streaming configuration. Supplied once; immutable after the driver starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Coarsest level of detail, used at the calibration height and above.
    pub min_lod: u8,
    /// Finest level of detail, used at `closest_distance` and below.
    pub max_lod: u8,
    /// Ground offset subtracted from the viewpoint height.
    pub closest_distance: f32,
    /// Planar distance from the local origin that triggers a re-base.
    pub rebase_threshold: f32,
    /// Geographic point at the local origin when streaming starts.
    pub geo_origin: GeoCoordinate,
    /// Stylesheet name handed to the tile pipeline.
    pub style: String,
    pub elevation: ElevationKind,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_lod: 14,
            max_lod: 16,
            closest_distance: 0.0,
            rebase_threshold: 1000.0,
            geo_origin: GeoCoordinate::new(52.5317429, 13.3871987),
            style: "default".into(),
            elevation: ElevationKind::Flat,
        }
    }
}

impl StreamConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&source)?,
            "json" => Self::from_json_str(&source)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        tracing::debug!(path = %path.display(), ?config, "loaded stream config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_lod > self.max_lod {
            return Err(ConfigError::InvalidLodRange {
                min: self.min_lod,
                max: self.max_lod,
            });
        }
        if self.max_lod > MAX_LOD {
            return Err(ConfigError::LodTooDeep(self.max_lod));
        }
        if !self.rebase_threshold.is_finite() || self.rebase_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.rebase_threshold));
        }
        if !self.closest_distance.is_finite() {
            return Err(ConfigError::InvalidClosestDistance(self.closest_distance));
        }
        if !self.geo_origin.is_valid() {
            return Err(ConfigError::InvalidOrigin(self.geo_origin));
        }
        Ok(())
    }
}
