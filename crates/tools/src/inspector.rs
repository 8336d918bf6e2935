use std::time::Duration;

use glam::Vec3;
use tilespace_geo::{GeoCoordinate, QuadKey};
use tilespace_kernel::World;
use tilespace_stream::{TileLifecycleDriver, TilePipeline};

/// Read-only queries against the streaming driver for overlays and logs.
pub struct ViewpointInspector;

impl ViewpointInspector {
    /// Snapshot of the viewpoint. `None` until the driver has ticked once.
    pub fn summary<P: TilePipeline>(driver: &TileLifecycleDriver<P>) -> Option<ViewpointSummary> {
        let position = driver.position()?;
        Some(ViewpointSummary {
            position,
            geo: driver.geo_position()?,
            lod: driver.current_lod()?,
            address: driver.current_address()?,
            geo_origin: driver.projection().origin(),
            resident_tiles: driver.tiles().len(),
            total_rebases: driver.stats().total_rebases,
            average_tick: driver.timer().average(),
        })
    }

    pub fn world(world: &World) -> WorldSummary {
        WorldSummary {
            containers: world.container_count(),
            contents: world.containers().map(|(_, c)| c.content.len()).sum(),
            root_offset: world.root().position,
        }
    }
}

/// What the overlay shows for the viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointSummary {
    pub position: Vec3,
    pub geo: GeoCoordinate,
    pub lod: u8,
    pub address: QuadKey,
    pub geo_origin: GeoCoordinate,
    pub resident_tiles: usize,
    pub total_rebases: u64,
    pub average_tick: Duration,
}

impl std::fmt::Display for ViewpointSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pos=({:.1}, {:.1}, {:.1}) geo={} lod={} tile={} resident={} rebases={} tick={:?}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.geo,
            self.lod,
            self.address,
            self.resident_tiles,
            self.total_rebases,
            self.average_tick,
        )
    }
}

/// Summary of the scene host's state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub containers: usize,
    pub contents: usize,
    pub root_offset: Vec3,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: containers={} contents={} root=({:.1}, {:.1}, {:.1})",
            self.containers,
            self.contents,
            self.root_offset.x,
            self.root_offset.y,
            self.root_offset.z
        )
    }
}
