use serde::{Deserialize, Serialize};

/// A built mesh for one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// A renderable map element (building, road, area) produced for a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: u64,
    pub kind: String,
}

/// Output of the tile-data pipeline for one tile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TileContent {
    Element(Element),
    Mesh(Mesh),
}

impl TileContent {
    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            TileContent::Element(e) => &e.kind,
            TileContent::Mesh(m) => &m.name,
        }
    }
}
