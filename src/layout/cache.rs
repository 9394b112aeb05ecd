//! Incremental layout cache
//!
//! [`LayoutCache`] keeps one [`CellState`] per visible cell. External
//! mutations mark states dirty through [`LayoutCache::invalidate`]; a later
//! [`LayoutCache::validate`] recomputes every dirty state in two top-down
//! passes: bounds first, then edge routes (which need the final bounds of
//! both terminals).

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, trace};

use crate::layout::config::LayoutConfig;
use crate::layout::constraint::{
    self, ConnectionConstraint, ConstraintResolver, StyleConstraintResolver,
};
use crate::layout::perimeter::PerimeterRegistry;
use crate::layout::routing::{EdgeStyle, EdgeStyleRegistry, RouteContext, RouteTerminal};
use crate::layout::transform::RotationTransform;
use crate::layout::types::{BoundingBox, CellState, Point};
use crate::model::{CellId, DiagramModel, Geometry};
use crate::stencil::{Aspect, StencilRegistry};
use crate::style::{keys, Direction, Style};
use crate::stylesheet::Stylesheet;

/// Scale and translation of the view
#[derive(Debug, Clone, Copy, PartialEq)]
struct View {
    scale: f64,
    translate: Point,
}

impl View {
    /// Untranslated, unscaled origin to absolute coordinates
    fn absolute(&self, origin: Point) -> Point {
        Point::new(
            self.scale * (self.translate.x + origin.x),
            self.scale * (self.translate.y + origin.y),
        )
    }

    /// Inverse of [`View::absolute`]
    fn relative(&self, point: Point) -> Point {
        Point::new(
            point.x / self.scale - self.translate.x,
            point.y / self.scale - self.translate.y,
        )
    }

    /// Waypoint stored relative to the edge's parent, made absolute
    fn control_point(&self, origin: Point, point: Point) -> Point {
        self.absolute(Point::new(origin.x + point.x, origin.y + point.y))
    }
}

/// Dirty-tracked cache of resolved cell geometry
pub struct LayoutCache {
    config: LayoutConfig,
    view: View,
    stylesheet: Stylesheet,
    perimeters: PerimeterRegistry,
    edge_styles: EdgeStyleRegistry,
    stencils: Rc<StencilRegistry>,
    constraints: Box<dyn ConstraintResolver>,
    states: HashMap<CellId, CellState>,
    current_root: Option<CellId>,
    graph_bounds: BoundingBox,
    background_bounds: Option<BoundingBox>,
    evicted: Vec<CellId>,
    /// Edges already reported as evicted for unresolved terminals
    unresolved: HashSet<CellId>,
    reordered: Vec<CellId>,
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("scale", &self.view.scale)
            .field("translate", &self.view.translate)
            .field("states", &self.states.len())
            .field("current_root", &self.current_root)
            .field("graph_bounds", &self.graph_bounds)
            .finish_non_exhaustive()
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutCache {
    /// Create an empty cache with the built-in registries
    pub fn new(config: LayoutConfig) -> Self {
        let view = View {
            scale: config.scale,
            translate: Point::new(config.translate_x, config.translate_y),
        };
        Self {
            config,
            view,
            stylesheet: Stylesheet::default(),
            perimeters: PerimeterRegistry::new(),
            edge_styles: EdgeStyleRegistry::new(),
            stencils: Rc::new(StencilRegistry::new()),
            constraints: Box::new(StyleConstraintResolver),
            states: HashMap::new(),
            current_root: None,
            graph_bounds: BoundingBox::zero(),
            background_bounds: None,
            evicted: Vec::new(),
            unresolved: HashSet::new(),
            reordered: Vec::new(),
        }
    }

    pub fn with_stylesheet(mut self, stylesheet: Stylesheet) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    pub fn with_perimeters(mut self, perimeters: PerimeterRegistry) -> Self {
        self.perimeters = perimeters;
        self
    }

    pub fn with_edge_styles(mut self, edge_styles: EdgeStyleRegistry) -> Self {
        self.edge_styles = edge_styles;
        self
    }

    /// Stencils consulted for fixed-aspect perimeter bounds
    pub fn with_stencils(mut self, stencils: Rc<StencilRegistry>) -> Self {
        self.stencils = stencils;
        self
    }

    pub fn with_constraints(mut self, constraints: Box<dyn ConstraintResolver>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn perimeters(&self) -> &PerimeterRegistry {
        &self.perimeters
    }

    pub fn stencils(&self) -> &Rc<StencilRegistry> {
        &self.stencils
    }

    pub fn scale(&self) -> f64 {
        self.view.scale
    }

    pub fn translate(&self) -> Point {
        self.view.translate
    }

    pub fn current_root(&self) -> Option<CellId> {
        self.current_root
    }

    /// Union of all vertex and edge bounds from the last validation
    pub fn graph_bounds(&self) -> BoundingBox {
        self.graph_bounds
    }

    /// Page bounds from the last validation, if a page format is configured
    pub fn background_bounds(&self) -> Option<BoundingBox> {
        self.background_bounds
    }

    /// Cached state of a cell, without creating one
    pub fn state(&self, cell: CellId) -> Option<&CellState> {
        self.states.get(&cell)
    }

    /// Mutable access for renderers attaching a retained shape
    pub fn state_mut(&mut self, cell: CellId) -> Option<&mut CellState> {
        self.states.get_mut(&cell)
    }

    pub fn states(&self) -> impl Iterator<Item = &CellState> {
        self.states.values()
    }

    /// Cached state of a cell, created on demand for visible cells
    pub fn get_state<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        cell: CellId,
        create: bool,
    ) -> Option<&CellState> {
        if create && !self.states.contains_key(&cell) && model.is_visible(cell) {
            let style = self.resolve_style(model, cell);
            self.states.insert(cell, CellState::new(cell, style));
        }
        self.states.get(&cell)
    }

    /// Cells whose states were dropped since the last call
    pub fn drain_evicted(&mut self) -> Vec<CellId> {
        std::mem::take(&mut self.evicted)
    }

    /// Cells flagged with an order change that were validated since the
    /// last call
    pub fn take_reordered(&mut self) -> Vec<CellId> {
        std::mem::take(&mut self.reordered)
    }

    pub fn set_scale(&mut self, scale: f64) {
        if scale != self.view.scale {
            self.view.scale = scale;
            self.invalidate_all();
        }
    }

    pub fn set_translate(&mut self, dx: f64, dy: f64) {
        let translate = Point::new(dx, dy);
        if translate != self.view.translate {
            self.view.translate = translate;
            self.invalidate_all();
        }
    }

    pub fn scale_and_translate(&mut self, scale: f64, dx: f64, dy: f64) {
        let view = View {
            scale,
            translate: Point::new(dx, dy),
        };
        if view != self.view {
            self.view = view;
            self.invalidate_all();
        }
    }

    /// Scope the view to the subtree below `root` (drill-down).
    ///
    /// Changing the root drops every cached state.
    pub fn set_current_root(&mut self, root: Option<CellId>) {
        if root == self.current_root {
            return;
        }
        self.current_root = root;
        let mut cells: Vec<CellId> = self.states.keys().copied().collect();
        cells.sort();
        for cell in cells {
            self.remove_state(cell);
        }
    }

    /// Mark `cell` dirty, along with its descendants and connected edges.
    /// With `order_changed` every visited cell is also flagged for
    /// [`take_reordered`](Self::take_reordered).
    pub fn invalidate<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        cell: CellId,
        recurse: bool,
        include_edges: bool,
        order_changed: bool,
    ) {
        let mut visited = HashSet::new();
        let mut pending = vec![cell];
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(state) = self.states.get_mut(&current) {
                state.invalid = true;
                state.invalid_order |= order_changed;
            }
            if recurse {
                pending.extend(model.children(current));
            }
            if include_edges {
                pending.extend(model.edges(current));
            }
        }
        trace!(cell:% = cell, visited = visited.len(); "Invalidated");
    }

    fn invalidate_all(&mut self) {
        for state in self.states.values_mut() {
            state.invalid = true;
        }
    }

    /// Recompute every dirty state below the current root (or model root)
    pub fn validate<M: DiagramModel + ?Sized>(&mut self, model: &M) {
        let Some(root) = self.current_root.or_else(|| model.root()) else {
            self.graph_bounds = self.empty_bounds();
            self.background_bounds = self.page_bounds();
            return;
        };

        self.validate_bounds(model, None, root);
        let bounds = self.validate_points(model, None, root);
        self.graph_bounds = bounds.unwrap_or_else(|| self.empty_bounds());
        self.background_bounds = self.page_bounds();

        debug!(
            states = self.states.len(),
            evicted = self.evicted.len(),
            graph_bounds:? = self.graph_bounds;
            "Validated layout cache"
        );
    }

    /// Bounds pass: origins, bounds and vertex label offsets, top-down
    pub fn validate_bounds<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        parent: Option<CellId>,
        cell: CellId,
    ) {
        self.validate_cell_bounds(model, parent, cell, true);
    }

    fn validate_cell_bounds<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        parent: Option<CellId>,
        cell: CellId,
        visible: bool,
    ) {
        if !(visible && model.is_visible(cell)) {
            self.remove_subtree(model, cell);
            return;
        }

        self.get_state(model, cell, true);
        let is_current_root = Some(cell) == self.current_root;
        let dirty = self.states.get(&cell).is_some_and(|s| s.invalid);
        if dirty {
            let style = self.resolve_style(model, cell);
            let parent_frame = parent
                .filter(|_| !is_current_root)
                .and_then(|p| self.states.get(&p))
                .map(|p| (p.origin, p.bounds));
            let view = self.view;
            if let Some(state) = self.states.get_mut(&cell) {
                state.style = style;
                if let Some((origin, bounds)) = parent_frame {
                    place_state(state, model, origin, bounds, view);
                }
            }
        }

        let expanded = !model.is_collapsed(cell) || is_current_root;
        for child in model.children(cell) {
            self.validate_cell_bounds(model, Some(cell), child, expanded);
        }
    }

    /// Points pass: edge routes, edge bounds and labels, relative children
    /// of edges. Returns the union of the visited vertex and edge bounds.
    pub fn validate_points<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        parent: Option<CellId>,
        cell: CellId,
    ) -> Option<BoundingBox> {
        let state = self.states.get_mut(&cell)?;
        if state.invalid {
            state.invalid = false;
            if state.invalid_order {
                state.invalid_order = false;
                self.reordered.push(cell);
            }

            let geometry = model.geometry(cell);
            if model.is_edge(cell) {
                let routed = geometry.is_some_and(|geo| self.update_edge(model, cell, geo));
                if !routed && Some(cell) != self.current_root {
                    if self.unresolved.insert(cell) {
                        trace!(edge:% = cell; "Evicting edge with unresolved terminals");
                        self.clear(model, cell, true, true);
                    } else {
                        // reported on an earlier pass
                        self.discard_subtree(model, cell);
                    }
                    return None;
                }
                self.unresolved.remove(&cell);
            } else if let (Some(geo), Some(edge)) = (geometry, parent) {
                if geo.relative && model.is_edge(edge) {
                    self.place_on_edge(model, edge, cell, geo);
                }
            }
        }

        let is_current_root = Some(cell) == self.current_root;
        let mut bounds = None;
        if let Some(state) = self.states.get(&cell) {
            if model.is_vertex(cell) && !is_current_root {
                bounds = Some(visual_bounds(state));
            } else if model.is_edge(cell) {
                bounds = Some(state.bounds);
            }
        }

        if !model.is_collapsed(cell) || is_current_root {
            for child in model.children(cell) {
                if let Some(child_bounds) = self.validate_points(model, Some(cell), child) {
                    bounds = BoundingBox::merge_into(bounds, child_bounds);
                }
            }
        }
        bounds
    }

    /// Drop the states of `cell` and, when recursing, its subtree.
    ///
    /// Recursion stops at the current root unless forced; the root of a
    /// stopped recursion is invalidated instead.
    pub fn clear<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        cell: CellId,
        force: bool,
        recurse: bool,
    ) {
        self.remove_state(cell);
        if recurse && (force || Some(cell) != self.current_root) {
            for child in model.children(cell) {
                self.clear(model, child, force, true);
            }
        } else {
            self.invalidate(model, cell, true, true, false);
        }
    }

    /// Nearest visible proxy of an edge's terminal.
    ///
    /// Hidden terminals and terminals inside collapsed ancestors resolve to
    /// the outermost such ancestor. Top-level layers, the root and the
    /// current root never act as terminals.
    pub fn visible_terminal<M: DiagramModel + ?Sized>(
        &self,
        model: &M,
        edge: CellId,
        is_source: bool,
    ) -> Option<CellId> {
        let terminal = model.terminal(edge, is_source)?;
        let mut best = terminal;
        let mut current = Some(terminal);
        while let Some(cell) = current {
            if Some(cell) == self.current_root {
                break;
            }
            if !model.is_visible(best) || model.is_collapsed(cell) {
                best = cell;
            }
            current = model.parent(cell);
        }

        let root = model.root();
        if !model.contains(best)
            || Some(best) == root
            || model.parent(best) == root
            || Some(best) == self.current_root
        {
            return None;
        }
        Some(best)
    }

    /// Point where a line toward `next` meets the terminal's perimeter
    pub fn perimeter_point(
        &self,
        terminal: CellId,
        next: Point,
        orthogonal: bool,
        border: f64,
    ) -> Option<Point> {
        let state = self.states.get(&terminal)?;
        Some(self.project_on_perimeter(state, Some(next), orthogonal, border))
    }

    /// Absolute position of a connection constraint on a cached terminal
    pub fn connection_point<M: DiagramModel + ?Sized>(
        &self,
        model: &M,
        terminal: CellId,
        constraint: &ConnectionConstraint,
        round: bool,
    ) -> Option<Point> {
        let state = self.states.get(&terminal)?;
        let point = self.constraint_point(state, constraint, model.is_vertex(terminal));
        Some(if round {
            Point::new(point.x.round(), point.y.round())
        } else {
            point
        })
    }

    /// Position along a routed edge described by a relative geometry
    pub fn point_on_edge(&self, edge: CellId, geometry: &Geometry) -> Option<Point> {
        let state = self.states.get(&edge)?;
        Some(point_on_route(state, geometry, self.view.scale))
    }

    fn resolve_style<M: DiagramModel + ?Sized>(&self, model: &M, cell: CellId) -> Style {
        self.stylesheet
            .resolve(model.style(cell).unwrap_or(""), model.is_edge(cell))
    }

    fn remove_state(&mut self, cell: CellId) -> Option<CellState> {
        let state = self.states.remove(&cell)?;
        self.evicted.push(cell);
        Some(state)
    }

    /// Drop the states of a subtree without reporting them as evicted
    fn discard_subtree<M: DiagramModel + ?Sized>(&mut self, model: &M, cell: CellId) {
        self.states.remove(&cell);
        for child in model.children(cell) {
            self.discard_subtree(model, child);
        }
    }

    fn remove_subtree<M: DiagramModel + ?Sized>(&mut self, model: &M, cell: CellId) {
        self.remove_state(cell);
        for child in model.children(cell) {
            self.remove_subtree(model, child);
        }
    }

    fn empty_bounds(&self) -> BoundingBox {
        let origin = self.view.absolute(Point::default());
        BoundingBox::new(origin.x, origin.y, 0.0, 0.0)
    }

    fn page_bounds(&self) -> Option<BoundingBox> {
        let format = self.config.page_format?;
        let page_scale = self.view.scale * self.config.page_scale;
        let origin = self.view.absolute(Point::default());
        Some(BoundingBox::new(
            origin.x,
            origin.y,
            format.width * page_scale,
            format.height * page_scale,
        ))
    }

    /// Resolve and store the route of an edge. Returns false if the edge
    /// cannot be resolved and must be evicted.
    fn update_edge<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        edge: CellId,
        geometry: &Geometry,
    ) -> bool {
        let source = self.visible_terminal(model, edge, true);
        let target = self.visible_terminal(model, edge, false);

        // Terminals that are edges must be routed first
        for terminal in [source, target].into_iter().flatten() {
            if model.is_edge(terminal)
                && !model.is_ancestor(terminal, edge)
                && self.states.contains_key(&terminal)
            {
                self.validate_points(model, model.parent(terminal), terminal);
            }
        }

        let source = source.filter(|cell| self.states.contains_key(cell));
        let target = target.filter(|cell| self.states.contains_key(cell));
        if let Some(state) = self.states.get_mut(&edge) {
            state.visible_source = source;
            state.visible_target = target;
        }

        let route = match self.states.get(&edge) {
            Some(state) => self.route_edge(
                model,
                state,
                geometry,
                source.and_then(|cell| self.states.get(&cell)),
                target.and_then(|cell| self.states.get(&cell)),
            ),
            None => None,
        };
        let Some(points) = route else {
            return false;
        };

        let scale = self.view.scale;
        if let Some(state) = self.states.get_mut(&edge) {
            state.absolute_points = points;
            update_edge_bounds(state);
            update_edge_label_offset(state, geometry, scale);
        }
        true
    }

    /// Full point chain of an edge, both ends included
    fn route_edge<M: DiagramModel + ?Sized>(
        &self,
        model: &M,
        edge: &CellState,
        geometry: &Geometry,
        source: Option<&CellState>,
        target: Option<&CellState>,
    ) -> Option<Vec<Point>> {
        for (is_source, terminal) in [(true, source), (false, target)] {
            if terminal.is_none()
                && (model.terminal(edge.cell, is_source).is_some()
                    || geometry.terminal_point(is_source).is_none())
            {
                return None;
            }
        }

        let p0 = self.fixed_terminal_point(model, edge, source, geometry, true);
        let pe = self.fixed_terminal_point(model, edge, target, geometry, false);
        let waypoints: Vec<Point> = geometry
            .points
            .iter()
            .map(|point| self.view.control_point(edge.origin, *point))
            .collect();

        let edge_style = self.edge_style(edge, source, target, &waypoints);
        let orthogonal = if edge.style.contains(keys::ORTHOGONAL) {
            edge.style.flag(keys::ORTHOGONAL, false)
        } else {
            edge_style.is_some_and(|style| style.orthogonal)
        };

        let mut chain: Vec<Option<Point>> = Vec::with_capacity(waypoints.len() + 2);
        chain.push(p0);
        match edge_style {
            Some(style) => {
                let context = RouteContext {
                    style: &edge.style,
                    source: source.map(|s| RouteTerminal::from_state(s, relative_x(model, s.cell))),
                    target: target.map(|t| RouteTerminal::from_state(t, relative_x(model, t.cell))),
                    source_point: p0,
                    target_point: pe,
                    waypoints: &waypoints,
                    scale: self.view.scale,
                    grid_size: self.config.grid_size,
                    entity_segment: self.config.entity_segment,
                };
                chain.extend((style.route)(&context).into_iter().map(Some));
            }
            None => chain.extend(waypoints.iter().copied().map(Some)),
        }
        chain.push(pe);

        // Floating ends, target first so the source sees the final target
        if let (None, Some(terminal)) = (chain.last().copied().flatten(), target) {
            let next = next_point(&chain, source, false);
            let point = self.floating_terminal_point(edge, terminal, next, false, orthogonal);
            if let Some(last) = chain.last_mut() {
                *last = Some(point);
            }
        }
        if let (None, Some(terminal)) = (chain[0], source) {
            let next = next_point(&chain, target, true);
            chain[0] = Some(self.floating_terminal_point(edge, terminal, next, true, orthogonal));
        }

        chain
            .into_iter()
            .collect::<Option<Vec<Point>>>()
            .filter(|points| points.len() >= 2)
    }

    fn fixed_terminal_point<M: DiagramModel + ?Sized>(
        &self,
        model: &M,
        edge: &CellState,
        terminal: Option<&CellState>,
        geometry: &Geometry,
        is_source: bool,
    ) -> Option<Point> {
        match terminal {
            Some(terminal) => {
                let constraint = self.constraints.constraint(edge, terminal, is_source)?;
                Some(self.constraint_point(
                    terminal,
                    &constraint,
                    model.is_vertex(terminal.cell),
                ))
            }
            None => geometry
                .terminal_point(is_source)
                .map(|point| self.view.control_point(edge.origin, point)),
        }
    }

    /// Routing strategy for an edge: the loop style for self loops without
    /// waypoints, else `edgeStyle` unless `noEdgeStyle` is set
    fn edge_style(
        &self,
        edge: &CellState,
        source: Option<&CellState>,
        target: Option<&CellState>,
        waypoints: &[Point],
    ) -> Option<EdgeStyle> {
        let style = &edge.style;
        let is_loop = waypoints.len() < 2
            && source.is_some()
            && source.map(|s| s.cell) == target.map(|t| t.cell);
        let name = if is_loop {
            Some(style.string(keys::LOOP, &self.config.default_loop_style))
        } else if !style.flag(keys::NO_EDGE_STYLE, false) {
            style.get(keys::EDGE)
        } else {
            None
        }?;

        let found = self.edge_styles.get(name);
        if found.is_none() {
            trace!(edge:% = edge.cell, edge_style = name; "Unknown edge style, using waypoints");
        }
        found
    }

    fn floating_terminal_point(
        &self,
        edge: &CellState,
        terminal: &CellState,
        next: Option<Point>,
        is_source: bool,
        orthogonal: bool,
    ) -> Point {
        let alpha = terminal.style.number(keys::ROTATION, 0.0);
        let center = terminal.center();
        let next = next.map(|point| {
            if alpha != 0.0 {
                RotationTransform::new(-alpha, center).transform_point(point)
            } else {
                point
            }
        });

        let spacing_key = if is_source {
            keys::SOURCE_PERIMETER_SPACING
        } else {
            keys::TARGET_PERIMETER_SPACING
        };
        let border = edge.style.number(keys::PERIMETER_SPACING, 0.0)
            + edge.style.number(spacing_key, 0.0);

        let point = self.project_on_perimeter(terminal, next, alpha == 0.0 && orthogonal, border);
        if alpha != 0.0 {
            RotationTransform::new(alpha, center).transform_point(point)
        } else {
            point
        }
    }

    fn project_on_perimeter(
        &self,
        terminal: &CellState,
        next: Option<Point>,
        orthogonal: bool,
        border: f64,
    ) -> Point {
        match next {
            Some(next) => {
                let bounds = self.terminal_perimeter_bounds(terminal, border);
                self.perimeters
                    .project(&bounds, &terminal.style, next, orthogonal)
            }
            None => terminal.center(),
        }
    }

    fn constraint_point(
        &self,
        terminal: &CellState,
        constraint: &ConnectionConstraint,
        is_vertex: bool,
    ) -> Point {
        let bounds = self.terminal_perimeter_bounds(terminal, 0.0);
        constraint::connection_point(
            &self.perimeters,
            &terminal.style,
            &bounds,
            constraint,
            self.view.scale,
            is_vertex,
        )
    }

    /// Perimeter bounds grown by `border` plus the terminal's own
    /// `perimeterSpacing`, both scaled
    fn terminal_perimeter_bounds(&self, terminal: &CellState, border: f64) -> BoundingBox {
        let border = border + terminal.style.number(keys::PERIMETER_SPACING, 0.0);
        self.perimeter_bounds(terminal, border * self.view.scale)
    }

    /// Bounds used for perimeter lookups. Fixed-aspect stencils shrink them
    /// to the area the shape actually covers.
    fn perimeter_bounds(&self, state: &CellState, border: f64) -> BoundingBox {
        let mut bounds = state.bounds;
        let stencil = state
            .style
            .get(keys::SHAPE)
            .and_then(|name| self.stencils.get(name));
        if let Some(descriptor) = stencil {
            if descriptor.aspect() == Aspect::Fixed {
                let frame = descriptor.compute_aspect(&bounds, Direction::East);
                bounds = BoundingBox::new(
                    frame.origin.x,
                    frame.origin.y,
                    descriptor.w0() * frame.sx,
                    descriptor.h0() * frame.sy,
                );
            }
        }
        if border != 0.0 {
            bounds = bounds.grow(border);
        }
        bounds
    }

    /// Position a relative child of an edge along the edge's route, then
    /// re-place its own children against the new origin
    fn place_on_edge<M: DiagramModel + ?Sized>(
        &mut self,
        model: &M,
        edge: CellId,
        cell: CellId,
        geometry: &Geometry,
    ) {
        let scale = self.view.scale;
        let Some(point) = self
            .states
            .get(&edge)
            .map(|state| point_on_route(state, geometry, scale))
        else {
            return;
        };

        let view = self.view;
        if let Some(state) = self.states.get_mut(&cell) {
            state.bounds.x = point.x;
            state.bounds.y = point.y;
            state.origin = view.relative(point);
        }

        if !model.is_collapsed(cell) || Some(cell) == self.current_root {
            for child in model.children(cell) {
                self.validate_cell_bounds(model, Some(cell), child, true);
            }
        }
    }
}

/// Origin, bounds and label offset of a cell from its parent's frame
fn place_state<M: DiagramModel + ?Sized>(
    state: &mut CellState,
    model: &M,
    parent_origin: Point,
    parent_bounds: BoundingBox,
    view: View,
) {
    state.absolute_offset = Point::default();
    state.origin = parent_origin;

    let Some(geometry) = model.geometry(state.cell) else {
        return;
    };
    if !model.is_edge(state.cell) {
        let offset = geometry.offset.unwrap_or_default();
        if geometry.relative {
            state.origin.x += geometry.x * parent_bounds.width / view.scale + offset.x;
            state.origin.y += geometry.y * parent_bounds.height / view.scale + offset.y;
        } else {
            state.absolute_offset = Point::new(view.scale * offset.x, view.scale * offset.y);
            state.origin.x += geometry.x;
            state.origin.y += geometry.y;
        }
    }

    let position = view.absolute(state.origin);
    state.bounds = BoundingBox::new(
        position.x,
        position.y,
        view.scale * geometry.width,
        view.scale * geometry.height,
    );

    if model.is_vertex(state.cell) {
        update_vertex_label_offset(state, view.scale);
    }
}

/// Shift the label offset of a vertex for `labelPosition` and
/// `verticalLabelPosition`
fn update_vertex_label_offset(state: &mut CellState, scale: f64) {
    let label_width = state
        .style
        .get(keys::LABEL_WIDTH)
        .and_then(|v| v.trim().parse::<f64>().ok());

    match state.style.string(keys::LABEL_POSITION, "center") {
        "left" => {
            state.absolute_offset.x -= label_width.map_or(state.bounds.width, |w| w * scale);
        }
        "right" => state.absolute_offset.x += state.bounds.width,
        "center" => {
            if let Some(width) = label_width {
                let factor = match state.style.string(keys::ALIGN, "center") {
                    "center" => 0.5,
                    "right" => 1.0,
                    _ => 0.0,
                };
                state.absolute_offset.x -= (width * scale - state.bounds.width) * factor;
            }
        }
        _ => {}
    }

    match state.style.string(keys::VERTICAL_LABEL_POSITION, "middle") {
        "top" => state.absolute_offset.y -= state.bounds.height,
        "bottom" => state.absolute_offset.y += state.bounds.height,
        _ => {}
    }
}

/// Bounds, segment lengths, total length and terminal distance of a route
fn update_edge_bounds(state: &mut CellState) {
    let points = &state.absolute_points;
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return;
    };

    let mut segments = Vec::with_capacity(points.len().saturating_sub(1));
    let mut bounds = BoundingBox::new(first.x, first.y, 0.0, 0.0);
    for pair in points.windows(2) {
        segments.push(pair[0].distance(pair[1]));
        bounds = bounds.expand_to_include(pair[1]);
    }

    state.terminal_distance = first.distance(last);
    state.length = segments.iter().sum();
    state.segments = segments;
    state.bounds = BoundingBox::new(
        bounds.x,
        bounds.y,
        bounds.width.max(1.0),
        bounds.height.max(1.0),
    );
}

/// Absolute label position of an edge
fn update_edge_label_offset(state: &mut CellState, geometry: &Geometry, scale: f64) {
    state.absolute_offset = state.center();
    let (Some(&first), Some(&last)) = (state.absolute_points.first(), state.absolute_points.last())
    else {
        return;
    };

    if geometry.relative {
        state.absolute_offset = point_on_route(state, geometry, scale);
    } else {
        let offset = geometry.offset.unwrap_or_default();
        state.absolute_offset = Point::new(
            first.x + (last.x - first.x) / 2.0 + offset.x * scale,
            first.y + (last.y - first.y) / 2.0 + offset.y * scale,
        );
    }
}

/// Point at `geometry.x` in [-1, 1] along the route, pushed `geometry.y`
/// away from it along the segment normal. Non-relative geometries and
/// unrouted states resolve to the center plus the offset.
fn point_on_route(state: &CellState, geometry: &Geometry, scale: f64) -> Point {
    let offset = geometry.offset.unwrap_or_default();
    let points = &state.absolute_points;
    if !geometry.relative || state.segments.is_empty() || points.len() < 2 {
        return state.center().translated(offset.x, offset.y);
    }

    let dist = ((geometry.x / 2.0 + 0.5) * state.length).round();
    let mut segment = state.segments[0];
    let mut length = 0.0;
    let mut index = 1;
    while dist >= (length + segment).round() && index < points.len() - 1 {
        length += segment;
        segment = state.segments.get(index).copied().unwrap_or(0.0);
        index += 1;
    }

    let factor = if segment == 0.0 {
        0.0
    } else {
        (dist - length) / segment
    };
    let p0 = points[index - 1];
    let pe = points[index];
    let dx = pe.x - p0.x;
    let dy = pe.y - p0.y;
    let (nx, ny) = if segment == 0.0 {
        (0.0, 0.0)
    } else {
        (dy / segment, dx / segment)
    };

    Point::new(
        p0.x + dx * factor + (nx * geometry.y + offset.x) * scale,
        p0.y + dy * factor - (ny * geometry.y - offset.y) * scale,
    )
}

/// Neighbour of an unresolved end in the chain, else the opposite
/// terminal's center
fn next_point(chain: &[Option<Point>], opposite: Option<&CellState>, is_source: bool) -> Option<Point> {
    let count = chain.len();
    let index = if is_source {
        1.min(count.saturating_sub(1))
    } else {
        count.saturating_sub(2)
    };
    chain
        .get(index)
        .copied()
        .flatten()
        .or_else(|| opposite.map(CellState::center))
}

fn relative_x<M: DiagramModel + ?Sized>(model: &M, cell: CellId) -> Option<f64> {
    model
        .geometry(cell)
        .filter(|geometry| geometry.relative)
        .map(|geometry| geometry.x)
}

/// Bounds of a vertex including its rotation
fn visual_bounds(state: &CellState) -> BoundingBox {
    let rotation = RotationTransform::new(
        state.style.number(keys::ROTATION, 0.0),
        state.center(),
    );
    if rotation.is_identity() {
        state.bounds
    } else {
        rotation.transform_bounds(&state.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphModel;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.001,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_route_metrics() {
        let mut state = CellState::new(CellId(1), Default::default());
        state.absolute_points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        update_edge_bounds(&mut state);

        assert_eq!(state.segments, vec![10.0, 10.0]);
        assert_eq!(state.length, 20.0);
        approx(state.terminal_distance, 200f64.sqrt());
        assert_eq!(state.bounds, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_straight_route_has_minimum_size() {
        let mut state = CellState::new(CellId(1), Default::default());
        state.absolute_points = vec![Point::new(5.0, 5.0), Point::new(50.0, 5.0)];
        update_edge_bounds(&mut state);
        assert_eq!(state.bounds, BoundingBox::new(5.0, 5.0, 45.0, 1.0));
    }

    #[test]
    fn test_point_on_route_midpoint_and_normal() {
        let mut state = CellState::new(CellId(1), Default::default());
        state.absolute_points = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        update_edge_bounds(&mut state);

        let middle = point_on_route(&state, &Geometry::default().with_relative(true), 1.0);
        assert_eq!(middle, Point::new(50.0, 0.0));

        // Positive y sits on the left of the direction of travel
        let above = Geometry::new(0.0, 10.0, 0.0, 0.0).with_relative(true);
        assert_eq!(point_on_route(&state, &above, 1.0), Point::new(50.0, -10.0));

        let start = Geometry::new(-1.0, 0.0, 0.0, 0.0).with_relative(true);
        assert_eq!(point_on_route(&state, &start, 1.0), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_point_on_route_walks_segments() {
        let mut state = CellState::new(CellId(1), Default::default());
        state.absolute_points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 30.0),
        ];
        update_edge_bounds(&mut state);

        // Halfway along 40 units lands 10 units into the second segment
        let middle = point_on_route(&state, &Geometry::default().with_relative(true), 1.0);
        assert_eq!(middle, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_vertex_label_positions() {
        let style = Style::new()
            .with(keys::LABEL_POSITION, "left")
            .with(keys::VERTICAL_LABEL_POSITION, "bottom");
        let mut state = CellState::new(CellId(1), style);
        state.bounds = BoundingBox::new(0.0, 0.0, 80.0, 40.0);
        update_vertex_label_offset(&mut state, 1.0);
        assert_eq!(state.absolute_offset, Point::new(-80.0, 40.0));
    }

    #[test]
    fn test_label_width_centered() {
        let style = Style::new().with(keys::LABEL_WIDTH, "120");
        let mut state = CellState::new(CellId(1), style);
        state.bounds = BoundingBox::new(0.0, 0.0, 80.0, 40.0);
        update_vertex_label_offset(&mut state, 1.0);
        assert_eq!(state.absolute_offset, Point::new(-20.0, 0.0));
    }

    #[test]
    fn test_next_point_falls_back_to_opposite_center() {
        let mut opposite = CellState::new(CellId(2), Default::default());
        opposite.bounds = BoundingBox::new(100.0, 0.0, 20.0, 20.0);

        let chain = vec![None, None];
        assert_eq!(next_point(&chain, Some(&opposite), false), Some(Point::new(110.0, 10.0)));

        let chain = vec![None, Some(Point::new(5.0, 5.0)), None];
        assert_eq!(next_point(&chain, Some(&opposite), true), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_visible_terminal_collapsed_parent() {
        let mut model = GraphModel::new();
        let layer = model.default_parent();
        let group = model.insert_vertex(layer, None, Geometry::new(0.0, 0.0, 200.0, 200.0), "");
        let inner = model.insert_vertex(group, None, Geometry::new(10.0, 10.0, 20.0, 20.0), "");
        let other = model.insert_vertex(layer, None, Geometry::new(300.0, 0.0, 20.0, 20.0), "");
        let edge = model.insert_edge(layer, None, Some(inner), Some(other), Geometry::default(), "");

        let cache = LayoutCache::default();
        assert_eq!(cache.visible_terminal(&model, edge, true), Some(inner));

        model.set_collapsed(group, true);
        assert_eq!(cache.visible_terminal(&model, edge, true), Some(group));

        // A hidden proxy climbs to the layer, which never acts as a terminal
        model.set_visible(group, false);
        assert_eq!(cache.visible_terminal(&model, edge, true), None);

        // A terminal that is itself a layer never resolves
        let dangling = model.insert_edge(layer, None, Some(layer), Some(other), Geometry::default(), "");
        assert_eq!(cache.visible_terminal(&model, dangling, true), None);
    }
}
