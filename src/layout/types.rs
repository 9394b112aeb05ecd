//! Core types for the layout cache

use crate::canvas::retained::ShapeTree;
use crate::model::CellId;
use crate::style::{keys, Style};

/// A 2D point in the coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Return this point shifted by the given deltas
    pub fn translated(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// A bounding box representing the spatial extent of an element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a zero-sized bounding box at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the bounding box
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Check if this bounding box contains a point (edges inclusive)
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Compute the union of two bounding boxes (smallest box containing both)
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Expand this bounding box to include a point
    pub fn expand_to_include(&self, point: Point) -> BoundingBox {
        let x = self.x.min(point.x);
        let y = self.y.min(point.y);
        let right = self.right().max(point.x);
        let bottom = self.bottom().max(point.y);
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Grow the box by `amount` on every side
    pub fn grow(&self, amount: f64) -> BoundingBox {
        BoundingBox::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    /// Swap width and height while keeping the center fixed
    pub fn rotate90(&self) -> BoundingBox {
        let t = (self.width - self.height) / 2.0;
        BoundingBox::new(self.x + t, self.y - t, self.height, self.width)
    }

    /// Union of an optional accumulator with this box
    pub fn merge_into(acc: Option<BoundingBox>, other: BoundingBox) -> Option<BoundingBox> {
        Some(match acc {
            Some(bounds) => bounds.union(&other),
            None => other,
        })
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::zero()
    }
}

/// Cached, resolved geometry for one visible cell.
///
/// Owned by [`LayoutCache`](super::LayoutCache); renderers only read it.
#[derive(Debug, Clone)]
pub struct CellState {
    pub cell: CellId,
    /// Resolved style snapshot taken when the state was last validated
    pub style: Style,
    /// Absolute (scaled and translated) bounds
    pub bounds: BoundingBox,
    /// Untranslated, unscaled origin
    pub origin: Point,
    /// Label position delta for vertices, absolute label position for edges
    pub absolute_offset: Point,
    /// Resolved route of an edge, both terminals included
    pub absolute_points: Vec<Point>,
    /// Length of each segment of `absolute_points`
    pub segments: Vec<f64>,
    /// Sum of `segments`
    pub length: f64,
    /// Straight-line distance between the edge terminals
    pub terminal_distance: f64,
    pub visible_source: Option<CellId>,
    pub visible_target: Option<CellId>,
    /// Retained render output attached by an interactive renderer
    pub shape: Option<ShapeTree>,
    pub(crate) invalid: bool,
    pub(crate) invalid_order: bool,
}

impl CellState {
    /// Create a fresh, invalid state
    pub fn new(cell: CellId, style: Style) -> Self {
        Self {
            cell,
            style,
            bounds: BoundingBox::zero(),
            origin: Point::default(),
            absolute_offset: Point::default(),
            absolute_points: Vec::new(),
            segments: Vec::new(),
            length: 0.0,
            terminal_distance: 0.0,
            visible_source: None,
            visible_target: None,
            shape: None,
            invalid: true,
            invalid_order: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    /// Center x shifted by the `routingCenterX` style fraction
    pub fn routing_center_x(&self) -> f64 {
        let f = self.style.number(keys::ROUTING_CENTER_X, 0.0);
        self.bounds.center().x + f * self.bounds.width
    }

    /// Center y shifted by the `routingCenterY` style fraction
    pub fn routing_center_y(&self) -> f64 {
        let f = self.style.number(keys::ROUTING_CENTER_Y, 0.0);
        self.bounds.center().y + f * self.bounds.height
    }

    /// First or last point of the resolved edge route
    pub fn terminal_point(&self, is_source: bool) -> Option<Point> {
        if is_source {
            self.absolute_points.first().copied()
        } else {
            self.absolute_points.last().copied()
        }
    }

    pub(crate) fn visible_terminal(&self, is_source: bool) -> Option<CellId> {
        if is_source {
            self.visible_source
        } else {
            self.visible_target
        }
    }

    /// Shift the state and its route by a delta
    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        self.bounds.x += dx;
        self.bounds.y += dy;
        self.absolute_offset = self.absolute_offset.translated(dx, dy);
        for point in &mut self.absolute_points {
            *point = point.translated(dx, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_edges() {
        let bb = BoundingBox::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(bb.right(), 110.0);
        assert_eq!(bb.bottom(), 70.0);
    }

    #[test]
    fn test_bounding_box_center() {
        let bb = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        let center = bb.center();
        assert_eq!(center.x, 50.0);
        assert_eq!(center.y, 25.0);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bb = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        assert!(bb.contains(Point::new(50.0, 50.0)));
        assert!(bb.contains(Point::new(0.0, 0.0)));
        assert!(bb.contains(Point::new(100.0, 100.0)));
        assert!(!bb.contains(Point::new(-1.0, 50.0)));
        assert!(!bb.contains(Point::new(101.0, 50.0)));
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        let b = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
        let union = a.union(&b);
        assert_eq!(union, BoundingBox::new(0.0, 0.0, 150.0, 150.0));
    }

    #[test]
    fn test_rotate90_keeps_center() {
        let bb = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        let rotated = bb.rotate90();
        assert_eq!(rotated, BoundingBox::new(25.0, -25.0, 50.0, 100.0));
        assert_eq!(rotated.center(), bb.center());
    }

    #[test]
    fn test_grow() {
        let bb = BoundingBox::new(10.0, 10.0, 20.0, 20.0).grow(5.0);
        assert_eq!(bb, BoundingBox::new(5.0, 5.0, 30.0, 30.0));
    }

    #[test]
    fn test_state_translate_moves_route() {
        let mut state = CellState::new(CellId(3), Style::default());
        state.absolute_points = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        state.translate(5.0, 1.0);
        assert_eq!(state.bounds.x, 5.0);
        assert_eq!(state.absolute_points[1], Point::new(15.0, 1.0));
    }
}
