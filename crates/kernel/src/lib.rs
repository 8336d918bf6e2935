//! World Kernel: the scene host the streaming core drives.
//!
//! # Invariants
//! - Containers are created and destroyed only through [`SceneHost`].
//! - Every mutation is recorded in the event log.

pub mod world;

pub use world::{Container, SceneHost, World, WorldEvent};
