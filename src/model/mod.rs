//! The diagram model consumed by the layout cache
//!
//! The cache only ever reads the model through [`DiagramModel`]; the model
//! owns cells, hierarchy, edge links, geometry and style strings.
//! [`GraphModel`] is the in-memory implementation used by the CLI and tests.

pub mod document;
pub mod graph;

pub use document::{DocumentError, SceneDocument};
pub use graph::GraphModel;

use crate::layout::types::Point;

/// Opaque handle of a cell in a [`DiagramModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub usize);

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position and size of a cell in its parent's coordinate system.
///
/// For a relative vertex, `x`/`y` are fractions of the parent size. For a
/// relative child of an edge, `x` in [-1, 1] is the position along the
/// route and `y` the perpendicular distance from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub relative: bool,
    /// Extra offset, unscaled
    pub offset: Option<Point>,
    /// Waypoints of an edge
    pub points: Vec<Point>,
    /// Loose end of an edge with no source cell
    pub source_point: Option<Point>,
    /// Loose end of an edge with no target cell
    pub target_point: Option<Point>,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_relative(mut self, relative: bool) -> Self {
        self.relative = relative;
        self
    }

    pub fn with_offset(mut self, dx: f64, dy: f64) -> Self {
        self.offset = Some(Point::new(dx, dy));
        self
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    pub fn with_terminal_point(mut self, point: Point, is_source: bool) -> Self {
        if is_source {
            self.source_point = Some(point);
        } else {
            self.target_point = Some(point);
        }
        self
    }

    pub fn terminal_point(&self, is_source: bool) -> Option<Point> {
        if is_source {
            self.source_point
        } else {
            self.target_point
        }
    }
}

/// Read-only view of a hierarchical diagram.
///
/// Queries about unknown cells return the "absent" answer (`None`, `0`,
/// `false`) instead of failing.
pub trait DiagramModel {
    fn root(&self) -> Option<CellId>;
    fn parent(&self, cell: CellId) -> Option<CellId>;
    fn child_count(&self, cell: CellId) -> usize;
    fn child_at(&self, cell: CellId, index: usize) -> Option<CellId>;
    /// Number of edges connected to the cell
    fn edge_count(&self, cell: CellId) -> usize;
    fn edge_at(&self, cell: CellId, index: usize) -> Option<CellId>;
    fn is_vertex(&self, cell: CellId) -> bool;
    fn is_edge(&self, cell: CellId) -> bool;
    fn geometry(&self, cell: CellId) -> Option<&Geometry>;
    /// Raw style string of the cell
    fn style(&self, cell: CellId) -> Option<&str>;
    fn terminal(&self, edge: CellId, is_source: bool) -> Option<CellId>;
    fn is_visible(&self, cell: CellId) -> bool;
    fn is_collapsed(&self, cell: CellId) -> bool;
    /// True if the cell is part of the model's tree
    fn contains(&self, cell: CellId) -> bool;

    /// True if `parent` is `child` or one of its ancestors
    fn is_ancestor(&self, parent: CellId, child: CellId) -> bool {
        let mut current = Some(child);
        while let Some(cell) = current {
            if cell == parent {
                return true;
            }
            current = self.parent(cell);
        }
        false
    }

    /// Label text of the cell
    fn value(&self, _cell: CellId) -> Option<&str> {
        None
    }

    /// Children in order
    fn children(&self, cell: CellId) -> Vec<CellId> {
        (0..self.child_count(cell))
            .filter_map(|i| self.child_at(cell, i))
            .collect()
    }

    /// Connected edges in order
    fn edges(&self, cell: CellId) -> Vec<CellId> {
        (0..self.edge_count(cell))
            .filter_map(|i| self.edge_at(cell, i))
            .collect()
    }
}
