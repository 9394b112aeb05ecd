//! In-memory diagram model

use super::{CellId, DiagramModel, Geometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Container,
    Vertex,
    Edge,
}

#[derive(Debug, Clone)]
struct CellNode {
    kind: CellKind,
    parent: Option<CellId>,
    children: Vec<CellId>,
    edges: Vec<CellId>,
    geometry: Option<Geometry>,
    style: String,
    value: Option<String>,
    source: Option<CellId>,
    target: Option<CellId>,
    visible: bool,
    collapsed: bool,
}

impl CellNode {
    fn new(kind: CellKind, parent: Option<CellId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            edges: Vec::new(),
            geometry: None,
            style: String::new(),
            value: None,
            source: None,
            target: None,
            visible: true,
            collapsed: false,
        }
    }
}

/// Arena-backed [`DiagramModel`].
///
/// A new model holds a root and one default layer. Removed cells leave a
/// hole in the arena so ids are never reused.
#[derive(Debug, Clone)]
pub struct GraphModel {
    cells: Vec<Option<CellNode>>,
    root: CellId,
    default_layer: CellId,
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModel {
    pub fn new() -> Self {
        let mut model = Self {
            cells: vec![Some(CellNode::new(CellKind::Container, None))],
            root: CellId(0),
            default_layer: CellId(0),
        };
        model.default_layer = model.add_layer();
        model
    }

    pub fn root_id(&self) -> CellId {
        self.root
    }

    /// The layer new top-level cells go into
    pub fn default_parent(&self) -> CellId {
        self.default_layer
    }

    /// Append a new layer under the root
    pub fn add_layer(&mut self) -> CellId {
        let root = self.root;
        self.push(CellNode::new(CellKind::Container, Some(root)))
    }

    pub fn insert_vertex(
        &mut self,
        parent: CellId,
        value: Option<&str>,
        geometry: Geometry,
        style: &str,
    ) -> CellId {
        let mut node = CellNode::new(CellKind::Vertex, Some(parent));
        node.geometry = Some(geometry);
        node.style = style.to_string();
        node.value = value.map(str::to_string);
        self.push(node)
    }

    pub fn insert_edge(
        &mut self,
        parent: CellId,
        value: Option<&str>,
        source: Option<CellId>,
        target: Option<CellId>,
        geometry: Geometry,
        style: &str,
    ) -> CellId {
        let mut node = CellNode::new(CellKind::Edge, Some(parent));
        node.geometry = Some(geometry.with_relative(true));
        node.style = style.to_string();
        node.value = value.map(str::to_string);
        let edge = self.push(node);
        self.set_terminal(edge, source, true);
        self.set_terminal(edge, target, false);
        edge
    }

    /// Connect or disconnect one end of an edge
    pub fn set_terminal(&mut self, edge: CellId, terminal: Option<CellId>, is_source: bool) {
        let previous = match self.node(edge) {
            Some(node) if is_source => node.source,
            Some(node) => node.target,
            None => return,
        };
        if let Some(node) = self.node_mut(edge) {
            if is_source {
                node.source = terminal;
            } else {
                node.target = terminal;
            }
        }
        if let Some(old) = previous {
            if Some(old) != terminal && !self.is_connected_to(edge, old) {
                if let Some(node) = self.node_mut(old) {
                    node.edges.retain(|e| *e != edge);
                }
            }
        }
        if let Some(new) = terminal {
            if let Some(node) = self.node_mut(new) {
                if !node.edges.contains(&edge) {
                    node.edges.push(edge);
                }
            }
        }
    }

    pub fn set_geometry(&mut self, cell: CellId, geometry: Geometry) {
        if let Some(node) = self.node_mut(cell) {
            node.geometry = Some(geometry);
        }
    }

    pub fn set_style(&mut self, cell: CellId, style: &str) {
        if let Some(node) = self.node_mut(cell) {
            node.style = style.to_string();
        }
    }

    pub fn set_value(&mut self, cell: CellId, value: Option<&str>) {
        if let Some(node) = self.node_mut(cell) {
            node.value = value.map(str::to_string);
        }
    }

    pub fn set_visible(&mut self, cell: CellId, visible: bool) {
        if let Some(node) = self.node_mut(cell) {
            node.visible = visible;
        }
    }

    pub fn set_collapsed(&mut self, cell: CellId, collapsed: bool) {
        if let Some(node) = self.node_mut(cell) {
            node.collapsed = collapsed;
        }
    }

    /// Move a child to a new position among its siblings
    pub fn reorder(&mut self, cell: CellId, index: usize) {
        let Some(parent) = self.parent(cell) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != cell);
            let index = index.min(node.children.len());
            node.children.insert(index, cell);
        }
    }

    /// Remove a cell and its subtree, disconnecting any edges
    pub fn remove(&mut self, cell: CellId) {
        if cell == self.root || !self.contains(cell) {
            return;
        }
        if let Some(parent) = self.parent(cell) {
            if let Some(node) = self.node_mut(parent) {
                node.children.retain(|c| *c != cell);
            }
        }
        let mut stack = vec![cell];
        while let Some(current) = stack.pop() {
            let Some(node) = self.cells.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            for edge in node.edges {
                for is_source in [true, false] {
                    if self.terminal(edge, is_source) == Some(current) {
                        if let Some(edge_node) = self.node_mut(edge) {
                            if is_source {
                                edge_node.source = None;
                            } else {
                                edge_node.target = None;
                            }
                        }
                    }
                }
            }
            for is_source in [true, false] {
                let terminal = if is_source { node.source } else { node.target };
                if let Some(terminal) = terminal {
                    if let Some(term_node) = self.node_mut(terminal) {
                        term_node.edges.retain(|e| *e != current);
                    }
                }
            }
            stack.extend(node.children);
        }
    }

    fn is_connected_to(&self, edge: CellId, cell: CellId) -> bool {
        self.node(edge)
            .map(|n| n.source == Some(cell) || n.target == Some(cell))
            .unwrap_or(false)
    }

    fn push(&mut self, node: CellNode) -> CellId {
        let id = CellId(self.cells.len());
        let parent = node.parent;
        self.cells.push(Some(node));
        if let Some(parent) = parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.push(id);
            }
        }
        id
    }

    fn node(&self, cell: CellId) -> Option<&CellNode> {
        self.cells.get(cell.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, cell: CellId) -> Option<&mut CellNode> {
        self.cells.get_mut(cell.0).and_then(Option::as_mut)
    }
}

impl DiagramModel for GraphModel {
    fn root(&self) -> Option<CellId> {
        Some(self.root)
    }

    fn parent(&self, cell: CellId) -> Option<CellId> {
        self.node(cell).and_then(|n| n.parent)
    }

    fn child_count(&self, cell: CellId) -> usize {
        self.node(cell).map(|n| n.children.len()).unwrap_or(0)
    }

    fn child_at(&self, cell: CellId, index: usize) -> Option<CellId> {
        self.node(cell).and_then(|n| n.children.get(index).copied())
    }

    fn edge_count(&self, cell: CellId) -> usize {
        self.node(cell).map(|n| n.edges.len()).unwrap_or(0)
    }

    fn edge_at(&self, cell: CellId, index: usize) -> Option<CellId> {
        self.node(cell).and_then(|n| n.edges.get(index).copied())
    }

    fn is_vertex(&self, cell: CellId) -> bool {
        matches!(self.node(cell), Some(n) if n.kind == CellKind::Vertex)
    }

    fn is_edge(&self, cell: CellId) -> bool {
        matches!(self.node(cell), Some(n) if n.kind == CellKind::Edge)
    }

    fn geometry(&self, cell: CellId) -> Option<&Geometry> {
        self.node(cell).and_then(|n| n.geometry.as_ref())
    }

    fn style(&self, cell: CellId) -> Option<&str> {
        self.node(cell).map(|n| n.style.as_str())
    }

    fn terminal(&self, edge: CellId, is_source: bool) -> Option<CellId> {
        self.node(edge)
            .and_then(|n| if is_source { n.source } else { n.target })
    }

    fn is_visible(&self, cell: CellId) -> bool {
        self.node(cell).map(|n| n.visible).unwrap_or(false)
    }

    fn is_collapsed(&self, cell: CellId) -> bool {
        self.node(cell).map(|n| n.collapsed).unwrap_or(false)
    }

    fn contains(&self, cell: CellId) -> bool {
        self.node(cell).is_some() && self.is_ancestor(self.root, cell)
    }

    fn value(&self, cell: CellId) -> Option<&str> {
        self.node(cell).and_then(|n| n.value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_model_has_root_and_layer() {
        let model = GraphModel::new();
        let root = model.root_id();
        assert_eq!(model.child_count(root), 1);
        assert_eq!(model.child_at(root, 0), Some(model.default_parent()));
        assert!(!model.is_vertex(root));
        assert!(!model.is_edge(model.default_parent()));
    }

    #[test]
    fn test_edge_adjacency() {
        let mut model = GraphModel::new();
        let layer = model.default_parent();
        let a = model.insert_vertex(layer, None, Geometry::new(0.0, 0.0, 10.0, 10.0), "");
        let b = model.insert_vertex(layer, None, Geometry::new(50.0, 0.0, 10.0, 10.0), "");
        let e = model.insert_edge(layer, None, Some(a), Some(b), Geometry::default(), "");
        assert_eq!(model.edges(a), vec![e]);
        assert_eq!(model.edges(b), vec![e]);
        assert_eq!(model.terminal(e, true), Some(a));

        model.set_terminal(e, None, false);
        assert!(model.edges(b).is_empty());
    }

    #[test]
    fn test_self_loop_listed_once() {
        let mut model = GraphModel::new();
        let layer = model.default_parent();
        let a = model.insert_vertex(layer, None, Geometry::new(0.0, 0.0, 10.0, 10.0), "");
        let e = model.insert_edge(layer, None, Some(a), Some(a), Geometry::default(), "");
        assert_eq!(model.edges(a), vec![e]);

        model.set_terminal(e, None, true);
        assert_eq!(model.edges(a), vec![e]);
    }

    #[test]
    fn test_remove_subtree_disconnects_edges() {
        let mut model = GraphModel::new();
        let layer = model.default_parent();
        let group = model.insert_vertex(layer, None, Geometry::new(0.0, 0.0, 100.0, 100.0), "");
        let child = model.insert_vertex(group, None, Geometry::new(10.0, 10.0, 10.0, 10.0), "");
        let other = model.insert_vertex(layer, None, Geometry::new(200.0, 0.0, 10.0, 10.0), "");
        let e = model.insert_edge(layer, None, Some(child), Some(other), Geometry::default(), "");

        model.remove(group);
        assert!(!model.contains(group));
        assert!(!model.contains(child));
        assert_eq!(model.terminal(e, true), None);
        assert_eq!(model.terminal(e, false), Some(other));
        assert_eq!(model.child_count(layer), 2);
    }

    #[test]
    fn test_is_ancestor() {
        let mut model = GraphModel::new();
        let layer = model.default_parent();
        let a = model.insert_vertex(layer, None, Geometry::default(), "");
        assert!(model.is_ancestor(model.root_id(), a));
        assert!(model.is_ancestor(a, a));
        assert!(!model.is_ancestor(a, layer));
    }

    #[test]
    fn test_unknown_cell_is_absent() {
        let model = GraphModel::new();
        let ghost = CellId(99);
        assert!(!model.contains(ghost));
        assert!(!model.is_visible(ghost));
        assert_eq!(model.geometry(ghost), None);
        assert_eq!(model.child_count(ghost), 0);
    }
}
