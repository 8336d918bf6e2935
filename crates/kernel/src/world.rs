use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tilespace_common::{NodeId, TileContent, Transform};

/// What the streaming core needs from the render host.
///
/// The host owns a root container whose transform can be translated, and
/// named child containers under it. Tile containers are named by their
/// address string.
pub trait SceneHost {
    /// Create an empty child container under the root.
    fn create_container(&mut self, name: &str) -> NodeId;

    /// Look a child container up by name.
    fn find_container(&self, name: &str) -> Option<NodeId>;

    /// Destroy a container and everything attached to it.
    /// Returns false if it did not exist.
    fn destroy_container(&mut self, id: NodeId) -> bool;

    /// Attach built content to a container. Returns false if it is gone.
    fn attach_content(&mut self, id: NodeId, content: TileContent) -> bool;

    /// Move the root container (and so every child) by `offset`.
    fn translate_root(&mut self, offset: Vec3);
}

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    ContainerCreated { id: NodeId, name: String },
    ContainerDestroyed { id: NodeId, name: String },
    ContentAttached { id: NodeId, label: String },
    /// Root moved by `offset`, ending at `position`.
    RootTranslated { offset: Vec3, position: Vec3 },
}

/// A named child of the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub content: Vec<TileContent>,
}

/// In-memory scene host.
///
/// Uses BTreeMap so iteration order is stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    root: Transform,
    containers: BTreeMap<NodeId, Container>,
    by_name: BTreeMap<String, NodeId>,
    /// Append-only event log of all mutations.
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform of the root container.
    pub fn root(&self) -> &Transform {
        &self.root
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// All containers in id order.
    pub fn containers(&self) -> impl Iterator<Item = (&NodeId, &Container)> {
        self.containers.iter()
    }

    /// Container names in sorted order.
    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }
}

impl SceneHost for World {
    fn create_container(&mut self, name: &str) -> NodeId {
        let id = NodeId::new();
        if let Some(previous) = self.by_name.insert(name.to_string(), id) {
            tracing::warn!(container = name, old = %previous.short(), "container name reused");
        }
        self.containers.insert(
            id,
            Container {
                name: name.to_string(),
                content: Vec::new(),
            },
        );
        self.event_log.push(WorldEvent::ContainerCreated {
            id,
            name: name.to_string(),
        });
        id
    }

    fn find_container(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    fn destroy_container(&mut self, id: NodeId) -> bool {
        let Some(container) = self.containers.remove(&id) else {
            return false;
        };
        if self.by_name.get(&container.name) == Some(&id) {
            self.by_name.remove(&container.name);
        }
        self.event_log.push(WorldEvent::ContainerDestroyed {
            id,
            name: container.name,
        });
        true
    }

    fn attach_content(&mut self, id: NodeId, content: TileContent) -> bool {
        let Some(container) = self.containers.get_mut(&id) else {
            return false;
        };
        let label = content.label().to_string();
        container.content.push(content);
        self.event_log.push(WorldEvent::ContentAttached { id, label });
        true
    }

    fn translate_root(&mut self, offset: Vec3) {
        self.root.translate(offset);
        self.event_log.push(WorldEvent::RootTranslated {
            offset,
            position: self.root.position,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilespace_common::Mesh;

    fn mesh(name: &str) -> TileContent {
        TileContent::Mesh(Mesh {
            name: name.into(),
            vertex_count: 4,
            index_count: 6,
        })
    }

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.container_count(), 0);
        assert_eq!(w.root().position, Vec3::ZERO);
        assert!(w.events().is_empty());
    }

    #[test]
    fn create_find_destroy() {
        let mut w = World::new();
        let id = w.create_container("16/1/2");
        assert_eq!(w.find_container("16/1/2"), Some(id));
        assert_eq!(w.get(id).unwrap().name, "16/1/2");

        assert!(w.destroy_container(id));
        assert_eq!(w.find_container("16/1/2"), None);
        assert_eq!(w.container_count(), 0);
    }

    #[test]
    fn destroying_missing_container_is_noop() {
        let mut w = World::new();
        let kept = w.create_container("a");
        assert!(!w.destroy_container(NodeId::new()));
        assert_eq!(w.find_container("a"), Some(kept));
        assert_eq!(w.events().len(), 1);
    }

    #[test]
    fn stale_destroy_keeps_newer_name_binding() {
        let mut w = World::new();
        let old = w.create_container("a");
        let new = w.create_container("a");
        assert!(w.destroy_container(old));
        assert_eq!(w.find_container("a"), Some(new));
    }

    #[test]
    fn attach_content_requires_live_container() {
        let mut w = World::new();
        let id = w.create_container("a");
        assert!(w.attach_content(id, mesh("terrain")));
        assert_eq!(w.get(id).unwrap().content.len(), 1);

        w.destroy_container(id);
        assert!(!w.attach_content(id, mesh("late")));
    }

    #[test]
    fn translate_root_logs_event() {
        let mut w = World::new();
        w.translate_root(Vec3::new(-1000.0, 0.0, 0.0));
        w.translate_root(Vec3::new(0.0, 0.0, -500.0));
        assert_eq!(w.root().position, Vec3::new(-1000.0, 0.0, -500.0));
        assert_eq!(
            w.events().last(),
            Some(&WorldEvent::RootTranslated {
                offset: Vec3::new(0.0, 0.0, -500.0),
                position: Vec3::new(-1000.0, 0.0, -500.0),
            })
        );
    }

    #[test]
    fn drain_events_clears_log() {
        let mut w = World::new();
        w.create_container("a");
        w.create_container("b");
        let events = w.drain_events();
        assert_eq!(events.len(), 2);
        assert!(w.events().is_empty());
    }

    #[test]
    fn container_names_are_sorted() {
        let mut w = World::new();
        w.create_container("b");
        w.create_container("a");
        let names: Vec<&str> = w.container_names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
