use std::collections::{HashMap, HashSet};

use tilespace_common::NodeId;
use tilespace_geo::{CartesianProjection, QuadKey};
use tilespace_kernel::SceneHost;

use crate::{ElevationKind, TilePipeline, TileRequest};

/// How a pass moves from the old resident set to the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// LOD changed: unload everything, then load the full neighborhood.
    /// Keys already resident at the target level are left alone, so a
    /// flush at an unchanged level degrades to a patch.
    Flush,
    /// Same LOD: load what is missing, unload what fell out.
    Patch,
}

/// Request parameters shared by every load in one pass.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub style: &'a str,
    pub projection: CartesianProjection,
    pub elevation: ElevationKind,
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub policy: ReconcilePolicy,
    pub loaded: Vec<QuadKey>,
    pub unloaded: Vec<QuadKey>,
}

/// The tiles that should be resident around `center`, in neighborhood order.
///
/// X wraps across the antimeridian, rows past the poles are dropped and
/// duplicates collapse, so this is 9 tiles except at the pyramid edges.
pub fn desired_tiles(center: QuadKey) -> Vec<QuadKey> {
    let mut seen = HashSet::with_capacity(9);
    center
        .neighborhood()
        .into_iter()
        .filter_map(|key| key.normalized())
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Owns the resident tile set and issues loads and unloads against it.
#[derive(Debug, Default)]
pub struct TileSetReconciler {
    resident: HashMap<QuadKey, NodeId>,
}

impl TileSetReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the resident set to exactly the neighborhood of `center`.
    pub fn reconcile<H, P>(
        &mut self,
        center: QuadKey,
        policy: ReconcilePolicy,
        host: &mut H,
        pipeline: &mut P,
        ctx: &LoadContext<'_>,
    ) -> Reconciliation
    where
        H: SceneHost + ?Sized,
        P: TilePipeline + ?Sized,
    {
        let _span = tracing::debug_span!("reconcile", %center, ?policy).entered();
        let desired = desired_tiles(center);

        let keep: HashSet<&QuadKey> = desired.iter().collect();
        let unloaded: Vec<QuadKey> = match policy {
            ReconcilePolicy::Flush => {
                if self.resident.keys().any(|key| keep.contains(key)) {
                    tracing::debug!(%center, "flush at unchanged level; keeping overlap");
                }
                self.sorted_resident()
                    .into_iter()
                    .filter(|key| key.lod != center.lod || !keep.contains(key))
                    .collect()
            }
            ReconcilePolicy::Patch => self
                .sorted_resident()
                .into_iter()
                .filter(|key| !keep.contains(key))
                .collect(),
        };
        for key in &unloaded {
            self.unload(*key, host);
        }

        let loaded: Vec<QuadKey> = desired
            .into_iter()
            .filter(|key| !self.resident.contains_key(key))
            .collect();
        for key in &loaded {
            self.load(*key, host, pipeline, ctx);
        }

        tracing::trace!(
            loaded = loaded.len(),
            unloaded = unloaded.len(),
            resident = self.resident.len(),
            "reconcile complete"
        );

        Reconciliation {
            policy,
            loaded,
            unloaded,
        }
    }

    fn load<H, P>(&mut self, key: QuadKey, host: &mut H, pipeline: &mut P, ctx: &LoadContext<'_>)
    where
        H: SceneHost + ?Sized,
        P: TilePipeline + ?Sized,
    {
        let container = host.create_container(&key.to_string());
        tracing::debug!(%key, container = %container.short(), "loading tile");
        pipeline.submit(TileRequest {
            address: key,
            style: ctx.style.to_string(),
            projection: ctx.projection,
            elevation: ctx.elevation,
            container,
        });
        self.resident.insert(key, container);
    }

    /// Destroy the tile's container by name. A missing container is fine.
    fn unload<H>(&mut self, key: QuadKey, host: &mut H)
    where
        H: SceneHost + ?Sized,
    {
        self.resident.remove(&key);
        match host.find_container(&key.to_string()) {
            Some(id) => {
                host.destroy_container(id);
                tracing::debug!(%key, "unloading tile");
            }
            None => tracing::debug!(%key, "unload found no container"),
        }
    }

    fn sorted_resident(&self) -> Vec<QuadKey> {
        let mut keys: Vec<QuadKey> = self.resident.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn is_resident(&self, key: QuadKey) -> bool {
        self.resident.contains_key(&key)
    }

    /// Container a resident tile was loaded into.
    pub fn container_of(&self, key: QuadKey) -> Option<NodeId> {
        self.resident.get(&key).copied()
    }

    pub fn resident(&self) -> HashSet<QuadKey> {
        self.resident.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }
}
