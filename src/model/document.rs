//! Scene descriptions for the command line renderer
//!
//! A scene is a read-only TOML listing of cells that is loaded into a
//! [`GraphModel`]. Parents must be declared before their children; edge
//! terminals may point at any cell in the file.
//!
//! ```toml
//! [[cell]]
//! id = "start"
//! value = "Start"
//! style = "rounded=1"
//! geometry = { x = 20, y = 20, width = 80, height = 40 }
//!
//! [[cell]]
//! id = "flow"
//! kind = "edge"
//! source = "start"
//! target = "end"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::{CellId, Geometry, GraphModel};
use crate::layout::types::Point;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read scene file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse scene TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Cell '{referenced_by}' refers to unknown cell '{id}'")]
    UnknownCell { id: String, referenced_by: String },
    #[error("Cell id '{0}' is declared twice")]
    DuplicateId(String),
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum CellKind {
    #[default]
    Vertex,
    Edge,
    Layer,
}

#[derive(Debug, Deserialize)]
struct TomlScene {
    #[serde(default, rename = "cell")]
    cells: Vec<TomlCell>,
}

#[derive(Debug, Deserialize)]
struct TomlCell {
    id: String,
    #[serde(default)]
    kind: CellKind,
    parent: Option<String>,
    value: Option<String>,
    #[serde(default)]
    style: String,
    #[serde(default)]
    geometry: TomlGeometry,
    source: Option<String>,
    target: Option<String>,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    collapsed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct TomlGeometry {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    relative: bool,
    offset: Option<[f64; 2]>,
    #[serde(default)]
    points: Vec<[f64; 2]>,
    source_point: Option<[f64; 2]>,
    target_point: Option<[f64; 2]>,
}

fn point(p: [f64; 2]) -> Point {
    Point::new(p[0], p[1])
}

impl From<TomlGeometry> for Geometry {
    fn from(g: TomlGeometry) -> Self {
        Geometry {
            x: g.x,
            y: g.y,
            width: g.width,
            height: g.height,
            relative: g.relative,
            offset: g.offset.map(point),
            points: g.points.into_iter().map(point).collect(),
            source_point: g.source_point.map(point),
            target_point: g.target_point.map(point),
        }
    }
}

/// A loaded scene: the model plus the file's cell names
#[derive(Debug, Clone)]
pub struct SceneDocument {
    pub model: GraphModel,
    pub ids: HashMap<String, CellId>,
}

impl SceneDocument {
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, DocumentError> {
        let scene: TomlScene = toml::from_str(content)?;
        let mut model = GraphModel::new();
        let mut ids: HashMap<String, CellId> = HashMap::new();
        let mut pending_edges = Vec::new();

        for cell in scene.cells {
            if ids.contains_key(&cell.id) {
                return Err(DocumentError::DuplicateId(cell.id));
            }
            let parent = match &cell.parent {
                Some(name) => *ids.get(name).ok_or_else(|| DocumentError::UnknownCell {
                    id: name.clone(),
                    referenced_by: cell.id.clone(),
                })?,
                None if cell.kind == CellKind::Layer => model.root_id(),
                None => model.default_parent(),
            };

            let id = match cell.kind {
                CellKind::Layer => {
                    if parent == model.root_id() {
                        model.add_layer()
                    } else {
                        model.insert_vertex(parent, None, Geometry::default(), "")
                    }
                }
                CellKind::Vertex => model.insert_vertex(
                    parent,
                    cell.value.as_deref(),
                    cell.geometry.into(),
                    &cell.style,
                ),
                CellKind::Edge => {
                    let edge = model.insert_edge(
                        parent,
                        cell.value.as_deref(),
                        None,
                        None,
                        cell.geometry.into(),
                        &cell.style,
                    );
                    pending_edges.push((edge, cell.id.clone(), cell.source, cell.target));
                    edge
                }
            };
            model.set_visible(id, cell.visible);
            model.set_collapsed(id, cell.collapsed);
            ids.insert(cell.id, id);
        }

        for (edge, name, source, target) in pending_edges {
            for (terminal, is_source) in [(source, true), (target, false)] {
                let Some(terminal) = terminal else { continue };
                let cell = *ids.get(&terminal).ok_or_else(|| DocumentError::UnknownCell {
                    id: terminal.clone(),
                    referenced_by: name.clone(),
                })?;
                model.set_terminal(edge, Some(cell), is_source);
            }
        }

        Ok(Self { model, ids })
    }

    pub fn cell(&self, id: &str) -> Option<CellId> {
        self.ids.get(id).copied()
    }
}
