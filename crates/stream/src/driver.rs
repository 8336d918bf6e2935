use std::time::Instant;

use glam::Vec3;
use tilespace_geo::{CartesianProjection, GeoCoordinate, QuadKey, address_of};
use tilespace_kernel::SceneHost;

use crate::{
    ConfigError, FloatingOrigin, LoadContext, LodSelector, Rebase, ReconcilePolicy,
    Reconciliation, StreamConfig, StreamStats, TickTimer, TileEvent, TilePipeline,
    TileSetReconciler,
};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    /// False when the viewpoint had not moved; nothing else ran.
    pub moved: bool,
    pub lod: Option<u8>,
    pub address: Option<QuadKey>,
    pub reconciliation: Option<Reconciliation>,
    /// Set when the world was re-based. The caller moves its viewpoint by
    /// `-displacement` to stay aligned with the translated root.
    pub rebase: Option<Rebase>,
}

/// Drives tile streaming for one moving viewpoint.
///
/// Owns the resident tile set, the floating origin and the projection; no
/// other component mutates them. [`tick`](Self::tick) is the only entry
/// point that changes state and is meant to be called once per frame.
pub struct TileLifecycleDriver<P> {
    config: StreamConfig,
    pipeline: P,
    projection: CartesianProjection,
    origin: FloatingOrigin,
    /// Calibrated on the first tick from the initial height.
    lod: Option<LodSelector>,
    reconciler: TileSetReconciler,
    last_position: Option<Vec3>,
    current_lod: Option<u8>,
    current_address: Option<QuadKey>,
    stats: StreamStats,
    timer: TickTimer,
    pipeline_closed: bool,
}

impl<P: TilePipeline> TileLifecycleDriver<P> {
    pub fn new(config: StreamConfig, pipeline: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let projection = CartesianProjection::new(config.geo_origin);
        let origin = FloatingOrigin::new(config.geo_origin, config.rebase_threshold);
        Ok(Self {
            config,
            pipeline,
            projection,
            origin,
            lod: None,
            reconciler: TileSetReconciler::new(),
            last_position: None,
            current_lod: None,
            current_address: None,
            stats: StreamStats::default(),
            timer: TickTimer::default(),
            pipeline_closed: false,
        })
    }

    /// Advance one frame with the viewpoint at `position`.
    ///
    /// Always applies completed tile builds first. If the viewpoint has not
    /// moved, or is not finite, nothing else happens; otherwise LOD is recomputed, the tile set
    /// reconciled and the origin re-based when far enough out.
    pub fn tick<H>(&mut self, host: &mut H, position: Vec3) -> TickReport
    where
        H: SceneHost + ?Sized,
    {
        let _span = tracing::info_span!("stream_tick").entered();
        let tick_start = Instant::now();
        let mut stats = StreamStats {
            total_rebases: self.stats.total_rebases,
            ..StreamStats::default()
        };

        self.apply_completions(host, &mut stats);

        let report = if !position.is_finite() {
            tracing::warn!(?position, "ignoring non-finite viewpoint");
            TickReport::default()
        } else if self.last_position == Some(position) {
            TickReport::default()
        } else {
            self.advance(host, position, &mut stats)
        };

        stats.resident_tiles = self.reconciler.len();
        stats.tick_time = tick_start.elapsed();
        self.timer.record(stats.tick_time);
        self.stats = stats;
        report
    }

    fn advance<H>(&mut self, host: &mut H, position: Vec3, stats: &mut StreamStats) -> TickReport
    where
        H: SceneHost + ?Sized,
    {
        let selector = *self.lod.get_or_insert_with(|| {
            tracing::info!(height = position.y, "streaming activated");
            LodSelector::calibrate(
                position.y,
                self.config.closest_distance,
                self.config.min_lod,
                self.config.max_lod,
            )
        });
        self.last_position = Some(position);

        let lod = selector.select(position.y);
        let geo = self.projection.to_geo(self.origin.planar_offset(position));
        let address = address_of(geo, lod);

        let policy = match self.current_lod {
            Some(current) if current == lod => ReconcilePolicy::Patch,
            Some(current) => {
                tracing::info!(from = current, to = lod, "level of detail changed");
                ReconcilePolicy::Flush
            }
            None => ReconcilePolicy::Flush,
        };

        let ctx = LoadContext {
            style: &self.config.style,
            projection: self.projection,
            elevation: self.config.elevation,
        };
        let reconciliation =
            self.reconciler
                .reconcile(address, policy, host, &mut self.pipeline, &ctx);
        stats.tiles_loaded_this_tick = reconciliation.loaded.len();
        stats.tiles_unloaded_this_tick = reconciliation.unloaded.len();
        self.current_lod = Some(lod);
        self.current_address = Some(address);

        let rebase = self.origin.check(position, &self.projection);
        if let Some(rebase) = &rebase {
            host.translate_root(-rebase.displacement);
            self.projection = rebase.projection;
            self.last_position = Some(position - rebase.displacement);
            stats.total_rebases += 1;
        }

        TickReport {
            moved: true,
            lod: Some(lod),
            address: Some(address),
            reconciliation: Some(reconciliation),
            rebase,
        }
    }

    fn apply_completions<H>(&mut self, host: &mut H, stats: &mut StreamStats)
    where
        H: SceneHost + ?Sized,
    {
        for event in self.pipeline.drain() {
            match event {
                TileEvent::Built {
                    address,
                    container,
                    content,
                } => {
                    if self.reconciler.container_of(address) != Some(container) {
                        tracing::debug!(%address, "discarding result for unloaded tile");
                        stats.results_discarded += 1;
                    } else if host.attach_content(container, content) {
                        stats.contents_applied += 1;
                    } else {
                        tracing::debug!(%address, "tile container is gone; result dropped");
                        stats.results_discarded += 1;
                    }
                }
                TileEvent::Failed {
                    address,
                    container,
                    error,
                } => {
                    if self.reconciler.container_of(address) != Some(container) {
                        tracing::debug!(%address, %error, "discarding failure for unloaded tile");
                        stats.results_discarded += 1;
                    } else {
                        tracing::warn!(%address, %error, "tile build failed");
                        stats.builds_failed += 1;
                    }
                }
                TileEvent::Closed => {
                    if !self.pipeline_closed {
                        tracing::info!("tile pipeline closed");
                    }
                    self.pipeline_closed = true;
                }
            }
        }
    }

    /// Last observed viewpoint position, in the current (re-based) frame.
    pub fn position(&self) -> Option<Vec3> {
        self.last_position
    }

    /// Geographic coordinate under the viewpoint.
    pub fn geo_position(&self) -> Option<GeoCoordinate> {
        self.last_position
            .map(|p| self.projection.to_geo(self.origin.planar_offset(p)))
    }

    pub fn current_lod(&self) -> Option<u8> {
        self.current_lod
    }

    pub fn current_address(&self) -> Option<QuadKey> {
        self.current_address
    }

    pub fn projection(&self) -> &CartesianProjection {
        &self.projection
    }

    pub fn origin(&self) -> &FloatingOrigin {
        &self.origin
    }

    pub fn lod_selector(&self) -> Option<&LodSelector> {
        self.lod.as_ref()
    }

    pub fn tiles(&self) -> &TileSetReconciler {
        &self.reconciler
    }

    /// Statistics from the last tick.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn is_pipeline_closed(&self) -> bool {
        self.pipeline_closed
    }
}
