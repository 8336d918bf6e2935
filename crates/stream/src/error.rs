use tilespace_geo::GeoCoordinate;

/// Errors from loading or validating a [`StreamConfig`](crate::StreamConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0:?}")]
    UnsupportedFormat(String),
    #[error("min_lod {min} is above max_lod {max}")]
    InvalidLodRange { min: u8, max: u8 },
    #[error("max_lod {0} is deeper than the tile pyramid allows")]
    LodTooDeep(u8),
    #[error("rebase threshold must be positive and finite, got {0}")]
    InvalidThreshold(f32),
    #[error("closest distance must be finite, got {0}")]
    InvalidClosestDistance(f32),
    #[error("geographic origin out of range: {0}")]
    InvalidOrigin(GeoCoordinate),
}

/// A failure reported by a tile builder. Never fatal to the lifecycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TileBuildError {
    #[error("no map data for tile: {0}")]
    NoData(String),
    #[error("elevation source failed: {0}")]
    Elevation(String),
    #[error("tile build failed: {0}")]
    Other(String),
}
