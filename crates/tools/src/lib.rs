//! Developer Tooling: diagnostic overlay data for the streaming core.
//!
//! # Invariants
//! - Read-only: nothing here feeds back into the driver.

mod inspector;

pub use inspector::{ViewpointInspector, ViewpointSummary, WorldSummary};
