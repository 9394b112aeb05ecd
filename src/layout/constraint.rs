//! Connection constraints: fixed attachment points of edge terminals

use crate::layout::perimeter::PerimeterRegistry;
use crate::layout::transform::{flip_point, RotationTransform};
use crate::layout::types::{BoundingBox, CellState, Point};
use crate::style::{keys, Direction, Style};

/// A fixed point on a terminal, as fractions of its bounds
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConstraint {
    /// Fractions of width and height, both in [0, 1]
    pub point: Point,
    /// Project the point onto the terminal's perimeter
    pub perimeter: bool,
    /// Unscaled offsets added after the fraction is applied
    pub dx: f64,
    pub dy: f64,
    /// Name of the connection point this came from, if any
    pub name: Option<String>,
}

impl ConnectionConstraint {
    pub fn new(x: f64, y: f64, perimeter: bool) -> Self {
        Self {
            point: Point::new(x, y),
            perimeter,
            dx: 0.0,
            dy: 0.0,
            name: None,
        }
    }

    pub fn with_offset(mut self, dx: f64, dy: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Supplies the fixed attachment point of one end of an edge.
///
/// Returning `None` leaves the end floating: it is then resolved against
/// the terminal's perimeter.
pub trait ConstraintResolver {
    fn constraint(
        &self,
        edge: &CellState,
        terminal: &CellState,
        is_source: bool,
    ) -> Option<ConnectionConstraint>;
}

/// Reads `exitX`/`exitY` (source) and `entryX`/`entryY` (target) from the
/// edge style, with the matching `*Perimeter` (default on) and `*Dx`/`*Dy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleConstraintResolver;

impl ConstraintResolver for StyleConstraintResolver {
    fn constraint(
        &self,
        edge: &CellState,
        _terminal: &CellState,
        is_source: bool,
    ) -> Option<ConnectionConstraint> {
        let (kx, ky, kp, kdx, kdy) = if is_source {
            (
                keys::EXIT_X,
                keys::EXIT_Y,
                keys::EXIT_PERIMETER,
                keys::EXIT_DX,
                keys::EXIT_DY,
            )
        } else {
            (
                keys::ENTRY_X,
                keys::ENTRY_Y,
                keys::ENTRY_PERIMETER,
                keys::ENTRY_DX,
                keys::ENTRY_DY,
            )
        };
        let style = &edge.style;
        let x = style.get(kx)?.trim().parse::<f64>().ok()?;
        let y = style.get(ky)?.trim().parse::<f64>().ok()?;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(
            ConnectionConstraint::new(x, y, style.flag(kp, true))
                .with_offset(style.number(kdx, 0.0), style.number(kdy, 0.0)),
        )
    }
}

/// Resolver that never fixes a terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraints;

impl ConstraintResolver for NoConstraints {
    fn constraint(&self, _: &CellState, _: &CellState, _: bool) -> Option<ConnectionConstraint> {
        None
    }
}

/// Absolute position of `constraint` on a vertex.
///
/// `bounds` are the vertex's perimeter bounds. The `direction` style turns
/// the fractions with the shape (north and south swap the bounds' width
/// and height first). Perimeter constraints are projected through the
/// same perimeter lookup the edge router uses; literal ones are mirrored
/// by `flipH`/`flipV` instead. `rotation` is applied last.
pub fn connection_point(
    perimeters: &PerimeterRegistry,
    style: &Style,
    bounds: &BoundingBox,
    constraint: &ConnectionConstraint,
    scale: f64,
    is_vertex: bool,
) -> Point {
    let center = bounds.center();
    let mut frame = *bounds;
    let direction = style.direction();
    let mut r1 = 0.0;

    if style.contains(keys::DIRECTION) && style.flag(keys::ANCHOR_POINT_DIRECTION, true) {
        r1 = direction.angle();
        if direction.is_vertical() {
            frame = frame.rotate90();
        }
    }

    let mut point = Point::new(
        frame.x + constraint.point.x * frame.width + constraint.dx * scale,
        frame.y + constraint.point.y * frame.height + constraint.dy * scale,
    );

    let mut r2 = style.number(keys::ROTATION, 0.0);

    if constraint.perimeter {
        if r1 != 0.0 {
            point = RotationTransform::new(r1, center).transform_point(point);
        }
        point = perimeters.project(bounds, style, point, false);
    } else {
        r2 += r1;
        if is_vertex {
            let mut flip_h = style.flag(keys::FLIP_H, false);
            let mut flip_v = style.flag(keys::FLIP_V, false);
            if matches!(direction, Direction::North | Direction::South) {
                std::mem::swap(&mut flip_h, &mut flip_v);
            }
            point = flip_point(point, &frame, flip_h, flip_v);
        }
    }

    if r2 != 0.0 {
        point = RotationTransform::new(r2, center).transform_point(point);
    }
    point
}
