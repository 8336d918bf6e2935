//! Streaming: keeps the tile neighborhood around a moving viewpoint resident.
//!
//! Per tick the [`TileLifecycleDriver`] applies finished tile builds, picks a
//! level of detail from the viewpoint height, reconciles the resident tile
//! set against the 3x3 neighborhood of the viewpoint's tile, and re-bases the
//! floating origin once the viewpoint strays past the threshold.
//!
//! # Invariants
//! - The resident set, origin and projection have a single writer: the driver.
//! - After any pass the resident set equals the desired neighborhood.
//! - Nothing in a tick is fatal; failures degrade to a tile without content.

mod config;
mod driver;
mod error;
mod lod;
mod origin;
mod pipeline;
mod reconcile;
mod stats;

pub use config::{ElevationKind, StreamConfig};
pub use driver::{TickReport, TileLifecycleDriver};
pub use error::{ConfigError, TileBuildError};
pub use lod::LodSelector;
pub use origin::{FloatingOrigin, Rebase};
pub use pipeline::{
    InlinePipeline, TileBuilder, TileEvent, TilePipeline, TileRequest, WorkerPipeline,
};
pub use reconcile::{
    LoadContext, ReconcilePolicy, Reconciliation, TileSetReconciler, desired_tiles,
};
pub use stats::{StreamStats, TickTimer};
