//! Perimeter functions: projecting a point onto a shape's outline
//!
//! A perimeter function receives the (already grown) bounds of a terminal,
//! its style and the "next" point of the edge, and returns where the line
//! from the bounds center toward `next` crosses the outline. With
//! `orthogonal` set, the result is snapped so the segment to `next` stays
//! horizontal or vertical wherever the outline allows it.

use std::collections::HashMap;
use std::f64::consts::PI;

use log::trace;

use crate::layout::transform::flip_point;
use crate::layout::types::{BoundingBox, Point};
use crate::style::{keys, Direction, Style};

/// Signature of a perimeter function.
///
/// `None` means the outline could not be intersected; callers fall back to
/// the center of the bounds.
pub type PerimeterFn = fn(&BoundingBox, &Style, Point, bool) -> Option<Point>;

pub const RECTANGLE_PERIMETER: &str = "rectanglePerimeter";
pub const ELLIPSE_PERIMETER: &str = "ellipsePerimeter";
pub const RHOMBUS_PERIMETER: &str = "rhombusPerimeter";
pub const TRIANGLE_PERIMETER: &str = "trianglePerimeter";

/// Named perimeter functions, looked up through the `perimeter` style key
#[derive(Clone)]
pub struct PerimeterRegistry {
    functions: HashMap<String, PerimeterFn>,
}

impl std::fmt::Debug for PerimeterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("PerimeterRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl Default for PerimeterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(RECTANGLE_PERIMETER, rectangle_perimeter);
        registry.register(ELLIPSE_PERIMETER, ellipse_perimeter);
        registry.register(RHOMBUS_PERIMETER, rhombus_perimeter);
        registry.register(TRIANGLE_PERIMETER, triangle_perimeter);
        registry
    }
}

impl PerimeterRegistry {
    /// Registry with the built-in perimeters
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry without any perimeter
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a perimeter function, replacing any previous one
    pub fn register(&mut self, name: &str, function: PerimeterFn) {
        self.functions.insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<PerimeterFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(|s| s.as_str())
    }

    /// Project `next` onto the outline named by the style's `perimeter`.
    ///
    /// `flipH`/`flipV` mirror the lookup around the bounds center. Shapes
    /// without a registered perimeter, and empty bounds, resolve to the
    /// center of `bounds`.
    pub fn project(
        &self,
        bounds: &BoundingBox,
        style: &Style,
        next: Point,
        orthogonal: bool,
    ) -> Point {
        let center = bounds.center();
        let function = style.get(keys::PERIMETER).and_then(|name| {
            let found = self.get(name);
            if found.is_none() {
                trace!(perimeter = name; "no perimeter registered, using center");
            }
            found
        });
        let Some(function) = function else {
            return center;
        };
        if bounds.width <= 0.0 && bounds.height <= 0.0 {
            return center;
        }

        let flip_h = style.flag(keys::FLIP_H, false);
        let flip_v = style.flag(keys::FLIP_V, false);
        let next = flip_point(next, bounds, flip_h, flip_v);

        match function(bounds, style, next, orthogonal) {
            Some(point) if point.x.is_finite() && point.y.is_finite() => {
                flip_point(point, bounds, flip_h, flip_v)
            }
            _ => center,
        }
    }
}

/// Intersection of segment (p0, p1) with segment (p2, p3)
pub fn intersection(p0: Point, p1: Point, p2: Point, p3: Point) -> Option<Point> {
    let denom = (p3.y - p2.y) * (p1.x - p0.x) - (p3.x - p2.x) * (p1.y - p0.y);
    let nume_a = (p3.x - p2.x) * (p0.y - p2.y) - (p3.y - p2.y) * (p0.x - p2.x);
    let nume_b = (p1.x - p0.x) * (p0.y - p2.y) - (p1.y - p0.y) * (p0.x - p2.x);

    let ua = nume_a / denom;
    let ub = nume_b / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(Point::new(
            p0.x + ua * (p1.x - p0.x),
            p0.y + ua * (p1.y - p0.y),
        ))
    } else {
        None
    }
}

/// Axis-aligned rectangle outline
pub fn rectangle_perimeter(
    bounds: &BoundingBox,
    _style: &Style,
    next: Point,
    orthogonal: bool,
) -> Option<Point> {
    let c = bounds.center();
    let alpha = (next.y - c.y).atan2(next.x - c.x);
    let beta = PI / 2.0 - alpha;
    let t = bounds.height.atan2(bounds.width);

    let mut p = if alpha < -PI + t || alpha > PI - t {
        // left
        Point::new(bounds.x, c.y - bounds.width * alpha.tan() / 2.0)
    } else if alpha < -t {
        // top
        Point::new(c.x - bounds.height * beta.tan() / 2.0, bounds.y)
    } else if alpha < t {
        // right
        Point::new(bounds.right(), c.y + bounds.width * alpha.tan() / 2.0)
    } else {
        // bottom
        Point::new(c.x + bounds.height * beta.tan() / 2.0, bounds.bottom())
    };

    if orthogonal {
        if next.x >= bounds.x && next.x <= bounds.right() {
            p.x = next.x;
        } else if next.y >= bounds.y && next.y <= bounds.bottom() {
            p.y = next.y;
        }

        if next.x < bounds.x {
            p.x = bounds.x;
        } else if next.x > bounds.right() {
            p.x = bounds.right();
        }

        if next.y < bounds.y {
            p.y = bounds.y;
        } else if next.y > bounds.bottom() {
            p.y = bounds.bottom();
        }
    }

    Some(p)
}

/// Ellipse inscribed in the bounds
pub fn ellipse_perimeter(
    bounds: &BoundingBox,
    _style: &Style,
    next: Point,
    orthogonal: bool,
) -> Option<Point> {
    let (x, y, w, h) = (bounds.x, bounds.y, bounds.width, bounds.height);
    let a = w / 2.0;
    let b = h / 2.0;
    let cx = x + a;
    let cy = y + b;
    let (px, py) = (next.x, next.y);

    let dx = (px - cx).trunc();
    let dy = (py - cy).trunc();

    if dx == 0.0 && dy != 0.0 {
        return Some(Point::new(cx, cy + b * dy / dy.abs()));
    } else if dx == 0.0 && dy == 0.0 {
        return Some(Point::new(px, py));
    }

    if orthogonal {
        if py >= y && py <= y + h {
            let ty = py - cy;
            let mut tx = (a * a * (1.0 - (ty * ty) / (b * b))).sqrt();
            if tx.is_nan() {
                tx = 0.0;
            }
            if px <= x {
                tx = -tx;
            }
            return Some(Point::new(cx + tx, py));
        }

        if px >= x && px <= x + w {
            let tx = px - cx;
            let mut ty = (b * b * (1.0 - (tx * tx) / (a * a))).sqrt();
            if ty.is_nan() {
                ty = 0.0;
            }
            if py <= y {
                ty = -ty;
            }
            return Some(Point::new(px, cy + ty));
        }
    }

    // Line through the center with slope d, intersected with the ellipse
    let d = dy / dx;
    let h0 = cy - d * cx;
    let e = a * a * d * d + b * b;
    let f = -2.0 * cx * e;
    let g = a * a * d * d * cx * cx + b * b * cx * cx - a * a * b * b;
    let det = (f * f - 4.0 * e * g).sqrt();

    let x1 = (-f + det) / (2.0 * e);
    let x2 = (-f - det) / (2.0 * e);
    let p1 = Point::new(x1, d * x1 + h0);
    let p2 = Point::new(x2, d * x2 + h0);

    if p1.distance(next) < p2.distance(next) {
        Some(p1)
    } else {
        Some(p2)
    }
}

/// Diamond touching the middle of each side of the bounds
pub fn rhombus_perimeter(
    bounds: &BoundingBox,
    _style: &Style,
    next: Point,
    orthogonal: bool,
) -> Option<Point> {
    let (x, y, w, h) = (bounds.x, bounds.y, bounds.width, bounds.height);
    let cx = x + w / 2.0;
    let cy = y + h / 2.0;
    let (px, py) = (next.x, next.y);

    // Straight at a corner
    if cx == px {
        return Some(if cy > py {
            Point::new(cx, y)
        } else {
            Point::new(cx, y + h)
        });
    } else if cy == py {
        return Some(if cx > px {
            Point::new(x, cy)
        } else {
            Point::new(x + w, cy)
        });
    }

    let mut tx = cx;
    let mut ty = cy;
    if orthogonal {
        if px >= x && px <= x + w {
            tx = px;
        } else if py >= y && py <= y + h {
            ty = py;
        }
    }

    let from = Point::new(px, py);
    let to = Point::new(tx, ty);
    let top = Point::new(cx, y);
    let bottom = Point::new(cx, y + h);
    let left = Point::new(x, cy);
    let right = Point::new(x + w, cy);

    if px < cx {
        if py < cy {
            intersection(from, to, top, left)
        } else {
            intersection(from, to, bottom, left)
        }
    } else if py < cy {
        intersection(from, to, top, right)
    } else {
        intersection(from, to, bottom, right)
    }
}

/// Isosceles triangle pointing toward the style's `direction`
pub fn triangle_perimeter(
    bounds: &BoundingBox,
    style: &Style,
    next: Point,
    orthogonal: bool,
) -> Option<Point> {
    let direction = style.direction();
    let vertical = direction.is_vertical();

    let (x, y, w, h) = (bounds.x, bounds.y, bounds.width, bounds.height);
    let mut cx = x + w / 2.0;
    let mut cy = y + h / 2.0;

    let (start, corner, end) = match direction {
        Direction::North => (
            Point::new(x, y + h),
            Point::new(cx, y),
            Point::new(x + w, y + h),
        ),
        Direction::South => (Point::new(x, y), Point::new(cx, y + h), Point::new(x + w, y)),
        Direction::West => (
            Point::new(x + w, y),
            Point::new(x, cy),
            Point::new(x + w, y + h),
        ),
        Direction::East => (Point::new(x, y), Point::new(x + w, cy), Point::new(x, y + h)),
    };

    let dx = next.x - cx;
    let dy = next.y - cy;

    let alpha = if vertical { dx.atan2(dy) } else { dy.atan2(dx) };
    let t = if vertical { w.atan2(h) } else { h.atan2(w) };

    let base = match direction {
        Direction::North | Direction::West => alpha > -t && alpha < t,
        _ => alpha < -PI + t || alpha > PI - t,
    };

    let result = if base {
        let on_base = if vertical {
            next.x >= start.x && next.x <= end.x
        } else {
            next.y >= start.y && next.y <= end.y
        };
        if orthogonal && on_base {
            Some(if vertical {
                Point::new(next.x, start.y)
            } else {
                Point::new(start.x, next.y)
            })
        } else {
            Some(match direction {
                Direction::North => Point::new(x + w / 2.0 + h * alpha.tan() / 2.0, y + h),
                Direction::South => Point::new(x + w / 2.0 - h * alpha.tan() / 2.0, y),
                Direction::West => Point::new(x + w, y + h / 2.0 + w * alpha.tan() / 2.0),
                Direction::East => Point::new(x, y + h / 2.0 - w * alpha.tan() / 2.0),
            })
        }
    } else {
        if orthogonal {
            let mut pt = Point::new(cx, cy);
            if next.y >= y && next.y <= y + h {
                pt.x = if vertical {
                    cx
                } else if direction == Direction::West {
                    x + w
                } else {
                    x
                };
                pt.y = next.y;
            } else if next.x >= x && next.x <= x + w {
                pt.x = next.x;
                pt.y = if !vertical {
                    cy
                } else if direction == Direction::North {
                    y + h
                } else {
                    y
                };
            }
            cx = pt.x;
            cy = pt.y;
        }

        let center = Point::new(cx, cy);
        if (vertical && next.x <= x + w / 2.0) || (!vertical && next.y <= y + h / 2.0) {
            intersection(next, center, start, corner)
        } else {
            intersection(next, center, corner, end)
        }
    };

    Some(result.unwrap_or(Point::new(cx, cy)))
}
