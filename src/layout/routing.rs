//! Edge styles: routing strategies between two terminals
//!
//! An edge style receives the resolved terminals of an edge and its
//! absolute waypoints and returns the intermediate points of the route.
//! The end points themselves are resolved afterwards by the layout cache
//! (fixed connection points or perimeter projection toward the first and
//! last intermediate point).

use std::collections::HashMap;

use crate::layout::types::{BoundingBox, CellState, Point};
use crate::style::{keys, Direction, Style};

pub const ELBOW_EDGE_STYLE: &str = "elbowEdgeStyle";
pub const SIDE_TO_SIDE_EDGE_STYLE: &str = "sideToSideEdgeStyle";
pub const TOP_TO_BOTTOM_EDGE_STYLE: &str = "topToBottomEdgeStyle";
pub const ENTITY_RELATION_EDGE_STYLE: &str = "entityRelationEdgeStyle";
pub const LOOP_EDGE_STYLE: &str = "loopEdgeStyle";
pub const ORTHOGONAL_EDGE_STYLE: &str = "orthogonalEdgeStyle";

/// Minimum offset before the orthogonal style inserts a bend
const ALIGN_TOLERANCE: f64 = 15.0;

/// Minimum length of the last segment, so markers orient correctly
const MIN_FINAL_SEGMENT_LENGTH: f64 = 15.0;

/// One end of an edge as seen by a routing strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTerminal {
    pub bounds: BoundingBox,
    /// Center shifted by `routingCenterX`/`routingCenterY`
    pub routing_center: Point,
    /// `x` of the terminal's geometry when it is relative to its parent
    pub relative_x: Option<f64>,
}

impl RouteTerminal {
    pub fn from_state(state: &CellState, relative_x: Option<f64>) -> Self {
        Self {
            bounds: state.bounds,
            routing_center: Point::new(state.routing_center_x(), state.routing_center_y()),
            relative_x,
        }
    }

    /// A zero-sized terminal standing in for a fixed end point
    pub fn from_point(point: Point) -> Self {
        Self {
            bounds: BoundingBox::new(point.x, point.y, 0.0, 0.0),
            routing_center: point,
            relative_x: None,
        }
    }
}

/// Everything a routing strategy may look at
#[derive(Debug, Clone)]
pub struct RouteContext<'a> {
    /// Resolved style of the edge
    pub style: &'a Style,
    pub source: Option<RouteTerminal>,
    pub target: Option<RouteTerminal>,
    /// Fixed end points resolved before routing
    pub source_point: Option<Point>,
    pub target_point: Option<Point>,
    /// Waypoints, already scaled and translated
    pub waypoints: &'a [Point],
    pub scale: f64,
    pub grid_size: f64,
    pub entity_segment: f64,
}

impl RouteContext<'_> {
    /// Terminal or, when the end is fixed, a point terminal at that end
    fn end(&self, is_source: bool) -> Option<RouteTerminal> {
        let (fixed, terminal) = if is_source {
            (self.source_point, self.source)
        } else {
            (self.target_point, self.target)
        };
        fixed.map(RouteTerminal::from_point).or(terminal)
    }
}

/// Signature of a routing strategy: returns intermediate points only
pub type EdgeStyleFn = fn(&RouteContext) -> Vec<Point>;

/// A registered routing strategy
#[derive(Clone, Copy)]
pub struct EdgeStyle {
    pub route: EdgeStyleFn,
    /// Terminal points of orthogonal styles are projected orthogonally
    pub orthogonal: bool,
}

impl std::fmt::Debug for EdgeStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeStyle")
            .field("orthogonal", &self.orthogonal)
            .finish_non_exhaustive()
    }
}

/// Named routing strategies, looked up through `edgeStyle`/`loopStyle`
#[derive(Debug, Clone)]
pub struct EdgeStyleRegistry {
    styles: HashMap<String, EdgeStyle>,
}

impl Default for EdgeStyleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ELBOW_EDGE_STYLE, elbow_connector, true);
        registry.register(SIDE_TO_SIDE_EDGE_STYLE, side_to_side, true);
        registry.register(TOP_TO_BOTTOM_EDGE_STYLE, top_to_bottom, true);
        registry.register(ENTITY_RELATION_EDGE_STYLE, entity_relation, true);
        registry.register(LOOP_EDGE_STYLE, loop_style, false);
        registry.register(ORTHOGONAL_EDGE_STYLE, orthogonal_connector, true);
        registry
    }
}

impl EdgeStyleRegistry {
    /// Registry with the built-in edge styles
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            styles: HashMap::new(),
        }
    }

    /// Register a strategy, replacing any previous one of the same name
    pub fn register(&mut self, name: &str, route: EdgeStyleFn, orthogonal: bool) {
        self.styles
            .insert(name.to_string(), EdgeStyle { route, orthogonal });
    }

    pub fn get(&self, name: &str) -> Option<EdgeStyle> {
        self.styles.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(|s| s.as_str())
    }
}

fn outside_both(source: &BoundingBox, target: &BoundingBox, p: Point) -> bool {
    !target.contains(p) && !source.contains(p)
}

/// Vertical segment between the two terminals, horizontal ends
pub fn side_to_side(ctx: &RouteContext) -> Vec<Point> {
    let mut result = Vec::new();
    let pt = ctx.waypoints.first().copied();
    let (Some(source), Some(target)) = (ctx.end(true), ctx.end(false)) else {
        return result;
    };
    let (s, t) = (source.bounds, target.bounds);

    let l = s.x.max(t.x);
    let r = s.right().min(t.right());
    let x = pt.map(|p| p.x).unwrap_or_else(|| (r + (l - r) / 2.0).round());

    let mut y1 = source.routing_center.y;
    let mut y2 = target.routing_center.y;
    if let Some(p) = pt {
        if p.y >= s.y && p.y <= s.bottom() {
            y1 = p.y;
        }
        if p.y >= t.y && p.y <= t.bottom() {
            y2 = p.y;
        }
    }

    for y in [y1, y2] {
        let p = Point::new(x, y);
        if outside_both(&s, &t, p) {
            result.push(p);
        }
    }

    if result.is_empty() {
        match pt {
            Some(p) => {
                let p = Point::new(x, p.y);
                if outside_both(&s, &t, p) {
                    result.push(p);
                }
            }
            None => {
                let top = s.y.max(t.y);
                let bottom = s.bottom().min(t.bottom());
                result.push(Point::new(x, top + (bottom - top) / 2.0));
            }
        }
    }
    result
}

/// Horizontal segment between the two terminals, vertical ends
pub fn top_to_bottom(ctx: &RouteContext) -> Vec<Point> {
    let mut result = Vec::new();
    let pt = ctx.waypoints.first().copied();
    let (Some(source), Some(target)) = (ctx.end(true), ctx.end(false)) else {
        return result;
    };
    let (s, t) = (source.bounds, target.bounds);

    let top = s.y.max(t.y);
    let bottom = s.bottom().min(t.bottom());

    let mut x = source.routing_center.x;
    if let Some(p) = pt {
        if p.x >= s.x && p.x <= s.right() {
            x = p.x;
        }
    }
    let y = pt
        .map(|p| p.y)
        .unwrap_or_else(|| (bottom + (top - bottom) / 2.0).round());

    let first = Point::new(x, y);
    if outside_both(&s, &t, first) {
        result.push(first);
    }

    x = match pt {
        Some(p) if p.x >= t.x && p.x <= t.right() => p.x,
        _ => target.routing_center.x,
    };
    let second = Point::new(x, y);
    if outside_both(&s, &t, second) {
        result.push(second);
    }

    if result.is_empty() {
        match pt {
            Some(p) => {
                let p = Point::new(p.x, y);
                if outside_both(&s, &t, p) {
                    result.push(p);
                }
            }
            None => {
                let l = s.x.max(t.x);
                let r = s.right().min(t.right());
                result.push(Point::new(l + (r - l) / 2.0, y));
            }
        }
    }
    result
}

/// Side-to-side or top-to-bottom, whichever fits the terminals.
///
/// `elbow=vertical` prefers top-to-bottom when the terminals allow both.
pub fn elbow_connector(ctx: &RouteContext) -> Vec<Point> {
    let mut vertical = false;
    let mut horizontal = false;

    if let (Some(source), Some(target)) = (ctx.source, ctx.target) {
        let (s, t) = (source.bounds, target.bounds);
        match ctx.waypoints.first() {
            Some(p) => {
                let left = s.x.min(t.x);
                let right = s.right().max(t.right());
                let top = s.y.min(t.y);
                let bottom = s.bottom().max(t.bottom());
                vertical = p.y < top || p.y > bottom;
                horizontal = p.x < left || p.x > right;
            }
            None => {
                let left = s.x.max(t.x);
                let right = s.right().min(t.right());
                vertical = left == right;
                if !vertical {
                    let top = s.y.max(t.y);
                    let bottom = s.bottom().min(t.bottom());
                    horizontal = top == bottom;
                }
            }
        }
    }

    if !horizontal && (vertical || ctx.style.get(keys::ELBOW) == Some("vertical")) {
        top_to_bottom(ctx)
    } else {
        side_to_side(ctx)
    }
}

/// Entity relation route: short horizontal stubs leaving each terminal
/// sideways, joined by a vertical step when needed.
///
/// The stub length is the `segment` style (default from the config).
pub fn entity_relation(ctx: &RouteContext) -> Vec<Point> {
    let mut result = Vec::new();
    let segment = ctx.style.number(keys::SEGMENT, ctx.entity_segment) * ctx.scale;
    let p0 = ctx.source_point;
    let pe = ctx.target_point;

    let mut is_source_left = false;
    if let Some(source) = ctx.source {
        if let Some(rx) = source.relative_x {
            is_source_left = rx <= 0.5;
        } else if let Some(target) = ctx.target {
            let target_x = pe.map(|p| p.x).unwrap_or(target.bounds.right());
            let source_x = p0.map(|p| p.x).unwrap_or(source.bounds.x);
            is_source_left = target_x < source_x;
        }
    }

    let mut is_target_left = true;
    if let Some(target) = ctx.target {
        if let Some(rx) = target.relative_x {
            is_target_left = rx <= 0.5;
        } else if let Some(source) = ctx.source {
            let source_x = p0.map(|p| p.x).unwrap_or(source.bounds.right());
            let target_x = pe.map(|p| p.x).unwrap_or(target.bounds.x);
            is_target_left = source_x < target_x;
        }
    }

    let (Some(source), Some(target)) = (ctx.end(true), ctx.end(false)) else {
        return result;
    };

    let x0 = if is_source_left {
        source.bounds.x
    } else {
        source.bounds.right()
    };
    let y0 = source.routing_center.y;
    let xe = if is_target_left {
        target.bounds.x
    } else {
        target.bounds.right()
    };
    let ye = target.routing_center.y;

    let dep = Point::new(x0 + if is_source_left { -segment } else { segment }, y0);
    let arr = Point::new(xe + if is_target_left { -segment } else { segment }, ye);

    if is_source_left == is_target_left {
        let x = if is_source_left {
            x0.min(xe) - segment
        } else {
            x0.max(xe) + segment
        };
        result.push(Point::new(x, y0));
        result.push(Point::new(x, ye));
    } else if (dep.x < arr.x) == is_source_left {
        let mid_y = y0 + (ye - y0) / 2.0;
        result.push(dep);
        result.push(Point::new(dep.x, mid_y));
        result.push(Point::new(arr.x, mid_y));
        result.push(arr);
    } else {
        result.push(dep);
        result.push(arr);
    }
    result
}

/// Self loop drawn beside the terminal.
///
/// The edge's `direction` picks the side (default west of the routing
/// center, i.e. to the right of the shape), `segment` the loop size
/// (default grid size). A waypoint outside the terminal moves the loop
/// through it. Edges with both ends fixed keep their waypoints as-is.
pub fn loop_style(ctx: &RouteContext) -> Vec<Point> {
    if ctx.source_point.is_some() && ctx.target_point.is_some() {
        return ctx.waypoints.to_vec();
    }
    let Some(source) = ctx.source else {
        return Vec::new();
    };
    let s = source.bounds;

    let pt = ctx.waypoints.first().copied().filter(|p| !s.contains(*p));

    let seg = ctx.style.number(keys::SEGMENT, ctx.grid_size) * ctx.scale;
    let dir = ctx
        .style
        .get(keys::DIRECTION)
        .map(Direction::parse)
        .unwrap_or(Direction::West);

    let (mut x, mut dx, mut y, mut dy) = (0.0, 0.0, 0.0, 0.0);
    if dir.is_vertical() {
        x = source.routing_center.x;
        dx = seg;
    } else {
        y = source.routing_center.y;
        dy = seg;
    }

    match pt {
        Some(p) if p.x >= s.x && p.x <= s.right() => {
            x = source.routing_center.x;
            dx = (x - p.x).abs().max(dy);
            y = p.y;
            dy = 0.0;
        }
        Some(p) => {
            x = p.x;
            dy = (y - p.y).abs().max(dy);
        }
        None => match dir {
            Direction::North => y = s.y - 2.0 * dx,
            Direction::South => y = s.bottom() + 2.0 * dx,
            Direction::East => x = s.x - 2.0 * dy,
            Direction::West => x = s.right() + 2.0 * dy,
        },
    }

    vec![Point::new(x - dx, y - dy), Point::new(x + dx, y + dy)]
}

/// Side of a bounding box an orthogonal route leaves or enters through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

/// Middle of one side of the box
pub fn attachment_point(bounds: &BoundingBox, side: Side) -> Point {
    match side {
        Side::Top => Point::new(bounds.x + bounds.width / 2.0, bounds.y),
        Side::Bottom => Point::new(bounds.x + bounds.width / 2.0, bounds.bottom()),
        Side::Left => Point::new(bounds.x, bounds.y + bounds.height / 2.0),
        Side::Right => Point::new(bounds.right(), bounds.y + bounds.height / 2.0),
    }
}

/// The pair of facing sides two boxes should be connected through
pub fn best_sides(from: &BoundingBox, to: &BoundingBox) -> (Side, Side) {
    let dx = to.center().x - from.center().x;
    let dy = to.center().y - from.center().y;

    let h_overlap = from.x < to.right() && from.right() > to.x;
    let v_overlap = from.y < to.bottom() && from.bottom() > to.y;

    // Columns that do not quite overlap still read as vertical
    let primarily_vertical = dy.abs() > dx.abs() * 1.5;

    let vertical = if (h_overlap && !v_overlap) || primarily_vertical {
        true
    } else if v_overlap && !h_overlap {
        false
    } else {
        dx.abs() <= dy.abs()
    };

    match (vertical, dx > 0.0, dy > 0.0) {
        (true, _, true) => (Side::Bottom, Side::Top),
        (true, _, false) => (Side::Top, Side::Bottom),
        (false, true, _) => (Side::Right, Side::Left),
        (false, false, _) => (Side::Left, Side::Right),
    }
}

/// Manhattan route between the best facing sides of the terminals.
///
/// The bend sits halfway between the terminals, or at the first waypoint
/// when one is given. Nearly aligned terminals get a straight route.
pub fn orthogonal_connector(ctx: &RouteContext) -> Vec<Point> {
    let (Some(source), Some(target)) = (ctx.end(true), ctx.end(false)) else {
        return Vec::new();
    };
    let (from_side, to_side) = best_sides(&source.bounds, &target.bounds);
    let start = ctx
        .source_point
        .unwrap_or_else(|| attachment_point(&source.bounds, from_side));
    let end = ctx
        .target_point
        .unwrap_or_else(|| attachment_point(&target.bounds, to_side));
    let pt = ctx.waypoints.first().copied();

    match from_side {
        Side::Top | Side::Bottom => {
            if (end.x - start.x).abs() <= ALIGN_TOLERANCE && pt.is_none() {
                return Vec::new();
            }
            let mid_y = match pt {
                Some(p) => p.y,
                None => {
                    let distance = (end.y - start.y).abs();
                    let sign = if end.y >= start.y { 1.0 } else { -1.0 };
                    if distance > MIN_FINAL_SEGMENT_LENGTH * 2.0 {
                        let midpoint = (start.y + end.y) / 2.0;
                        let limit = end.y - sign * MIN_FINAL_SEGMENT_LENGTH;
                        if sign > 0.0 {
                            midpoint.min(limit)
                        } else {
                            midpoint.max(limit)
                        }
                    } else {
                        (start.y + end.y) / 2.0
                    }
                }
            };
            vec![Point::new(start.x, mid_y), Point::new(end.x, mid_y)]
        }
        Side::Left | Side::Right => {
            if (end.y - start.y).abs() <= ALIGN_TOLERANCE && pt.is_none() {
                return Vec::new();
            }
            let mid_x = match pt {
                Some(p) => p.x,
                None => (start.x + end.x) / 2.0,
            };
            vec![Point::new(mid_x, start.y), Point::new(mid_x, end.y)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn terminal(x: f64, y: f64, w: f64, h: f64) -> RouteTerminal {
        let bounds = BoundingBox::new(x, y, w, h);
        RouteTerminal {
            bounds,
            routing_center: bounds.center(),
            relative_x: None,
        }
    }

    fn ctx<'a>(
        style: &'a Style,
        source: RouteTerminal,
        target: RouteTerminal,
        waypoints: &'a [Point],
    ) -> RouteContext<'a> {
        RouteContext {
            style,
            source: Some(source),
            target: Some(target),
            source_point: None,
            target_point: None,
            waypoints,
            scale: 1.0,
            grid_size: 10.0,
            entity_segment: 30.0,
        }
    }

    #[test]
    fn test_attachment_points() {
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(attachment_point(&bounds, Side::Top), Point::new(50.0, 0.0));
        assert_eq!(attachment_point(&bounds, Side::Bottom), Point::new(50.0, 50.0));
        assert_eq!(attachment_point(&bounds, Side::Left), Point::new(0.0, 25.0));
        assert_eq!(attachment_point(&bounds, Side::Right), Point::new(100.0, 25.0));
    }

    #[test]
    fn test_best_sides() {
        let a = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        let right = BoundingBox::new(200.0, 0.0, 50.0, 50.0);
        let below = BoundingBox::new(0.0, 200.0, 50.0, 50.0);
        assert_eq!(best_sides(&a, &right), (Side::Right, Side::Left));
        assert_eq!(best_sides(&right, &a), (Side::Left, Side::Right));
        assert_eq!(best_sides(&a, &below), (Side::Bottom, Side::Top));
        assert_eq!(best_sides(&below, &a), (Side::Top, Side::Bottom));
    }

    #[test]
    fn test_side_to_side_midpoint() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(100.0, 60.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(
            side_to_side(&c),
            vec![Point::new(70.0, 20.0), Point::new(70.0, 80.0)]
        );
    }

    #[test]
    fn test_side_to_side_aligned_repeats_point() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(100.0, 0.0, 40.0, 40.0),
            &[],
        );
        let points = side_to_side(&c);
        assert_eq!(points, vec![Point::new(70.0, 20.0), Point::new(70.0, 20.0)]);
    }

    #[test]
    fn test_top_to_bottom_midpoint() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(60.0, 100.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(
            top_to_bottom(&c),
            vec![Point::new(20.0, 70.0), Point::new(80.0, 70.0)]
        );
    }

    #[test]
    fn test_elbow_vertical_style() {
        let style = Style::new().with(keys::ELBOW, "vertical");
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(60.0, 100.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(elbow_connector(&c), top_to_bottom(&c));

        let plain = Style::new();
        let c = ctx(
            &plain,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(60.0, 100.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(elbow_connector(&c), side_to_side(&c));
    }

    #[test]
    fn test_entity_relation_facing_terminals() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(200.0, 100.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(
            entity_relation(&c),
            vec![Point::new(70.0, 20.0), Point::new(170.0, 120.0)]
        );
    }

    #[test]
    fn test_entity_relation_segment_style() {
        let style = Style::new().with(keys::SEGMENT, "10");
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(200.0, 0.0, 40.0, 40.0),
            &[],
        );
        let points = entity_relation(&c);
        assert_eq!(points.first(), Some(&Point::new(50.0, 20.0)));
        assert_eq!(points.last(), Some(&Point::new(190.0, 20.0)));
    }

    #[test]
    fn test_loop_default_west() {
        let style = Style::new();
        let t = terminal(0.0, 0.0, 40.0, 40.0);
        let c = ctx(&style, t, t, &[]);
        assert_eq!(
            loop_style(&c),
            vec![Point::new(60.0, 10.0), Point::new(60.0, 30.0)]
        );
    }

    #[test]
    fn test_loop_north() {
        let style = Style::new().with(keys::DIRECTION, "north");
        let t = terminal(0.0, 0.0, 40.0, 40.0);
        let c = ctx(&style, t, t, &[]);
        assert_eq!(
            loop_style(&c),
            vec![Point::new(10.0, -20.0), Point::new(30.0, -20.0)]
        );
    }

    #[test]
    fn test_orthogonal_horizontal_bend() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(200.0, 60.0, 40.0, 40.0),
            &[],
        );
        assert_eq!(
            orthogonal_connector(&c),
            vec![Point::new(120.0, 20.0), Point::new(120.0, 80.0)]
        );
    }

    #[test]
    fn test_orthogonal_aligned_is_straight() {
        let style = Style::new();
        let c = ctx(
            &style,
            terminal(0.0, 0.0, 40.0, 40.0),
            terminal(200.0, 5.0, 40.0, 40.0),
            &[],
        );
        assert!(orthogonal_connector(&c).is_empty());
    }

    #[test]
    fn test_registry_flags() {
        let registry = EdgeStyleRegistry::new();
        assert!(registry.get(ELBOW_EDGE_STYLE).map(|s| s.orthogonal).unwrap_or(false));
        assert!(!registry.get(LOOP_EDGE_STYLE).map(|s| s.orthogonal).unwrap_or(true));
        assert!(registry.get("nope").is_none());
    }
}
