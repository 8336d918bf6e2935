//! Shared types: container handles, transforms and built tile content.
//!
//! # Invariants
//! - Every type here is a plain value; no type owns world state.

mod content;
mod types;

pub use content::{Element, Mesh, TileContent};
pub use types::{NodeId, Transform};
