//! Rotation helpers shared by the edge router and the stencil interpreter.
//!
//! ## Rotation Convention
//!
//! Rotation uses the SVG convention: clockwise positive angles, in degrees,
//! with the Y axis pointing down.
//! - 0° = no rotation
//! - 90° = rotated clockwise (right becomes down)
//! - 180° = upside down
//! - 270° = rotated counter-clockwise (right becomes up)
//!
//! Rotated shapes keep their unrotated bounds in the layout cache. Anything
//! that needs the rotated silhouette (perimeter lookup, connection points,
//! page extents) goes through [`RotationTransform`].

use crate::layout::types::{BoundingBox, Point};

/// A 2D rotation around a center point.
#[derive(Debug, Clone, Copy)]
pub struct RotationTransform {
    /// Rotation angle in degrees (clockwise positive, per SVG convention)
    pub angle_degrees: f64,
    /// Center point of rotation (usually the center of the rotated cell)
    pub center: Point,
}

impl RotationTransform {
    pub fn new(angle_degrees: f64, center: Point) -> Self {
        Self {
            angle_degrees,
            center,
        }
    }

    /// The transform that undoes this one
    pub fn inverse(&self) -> Self {
        Self::new(-self.angle_degrees, self.center)
    }

    /// True if the rotation would not produce any visible change.
    pub fn is_identity(&self) -> bool {
        (self.angle_degrees % 360.0).abs() < f64::EPSILON
    }

    /// Rotate a point around the center.
    ///
    /// ```text
    /// x' = cx + (x - cx) * cos(θ) - (y - cy) * sin(θ)
    /// y' = cy + (x - cx) * sin(θ) + (y - cy) * cos(θ)
    /// ```
    pub fn transform_point(&self, point: Point) -> Point {
        if self.is_identity() {
            return point;
        }

        let radians = self.angle_degrees.to_radians();
        let cos_a = radians.cos();
        let sin_a = radians.sin();

        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;

        Point {
            x: self.center.x + dx * cos_a - dy * sin_a,
            y: self.center.y + dx * sin_a + dy * cos_a,
        }
    }

    /// Axis-aligned box around the four rotated corners of `bounds`.
    ///
    /// This over-estimates curved outlines, which is fine for extents.
    pub fn transform_bounds(&self, bounds: &BoundingBox) -> BoundingBox {
        if self.is_identity() {
            return *bounds;
        }

        let corners = [
            Point::new(bounds.x, bounds.y),
            Point::new(bounds.right(), bounds.y),
            Point::new(bounds.x, bounds.bottom()),
            Point::new(bounds.right(), bounds.bottom()),
        ];

        let rotated: Vec<Point> = corners.iter().map(|p| self.transform_point(*p)).collect();

        let min_x = rotated.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = rotated
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_y = rotated.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = rotated
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);

        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Mirror a point inside `bounds` horizontally and/or vertically.
pub fn flip_point(point: Point, bounds: &BoundingBox, flip_h: bool, flip_v: bool) -> Point {
    let mut result = point;
    if flip_h {
        result.x = 2.0 * bounds.x + bounds.width - result.x;
    }
    if flip_v {
        result.y = 2.0 * bounds.y + bounds.height - result.y;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_identity_rotation() {
        let t = RotationTransform::new(0.0, Point::new(50.0, 50.0));
        assert!(t.is_identity());
        assert!(RotationTransform::new(360.0, Point::default()).is_identity());

        let p = Point::new(100.0, 0.0);
        assert_eq!(t.transform_point(p), p);
    }

    #[test]
    fn test_90_degree_rotation_around_origin() {
        let t = RotationTransform::new(90.0, Point::new(0.0, 0.0));
        let result = t.transform_point(Point::new(1.0, 0.0));
        assert!(approx_eq(result.x, 0.0), "x: expected 0.0, got {}", result.x);
        assert!(approx_eq(result.y, 1.0), "y: expected 1.0, got {}", result.y);
    }

    #[test]
    fn test_inverse_round_trips() {
        let t = RotationTransform::new(37.0, Point::new(20.0, -4.0));
        let p = Point::new(13.0, 71.0);
        let back = t.inverse().transform_point(t.transform_point(p));
        assert!(approx_eq(back.x, p.x));
        assert!(approx_eq(back.y, p.y));
    }

    #[test]
    fn test_rotation_around_non_origin_center() {
        let t = RotationTransform::new(90.0, Point::new(50.0, 50.0));
        let result = t.transform_point(Point::new(100.0, 50.0));
        assert!(approx_eq(result.x, 50.0), "x: expected 50.0, got {}", result.x);
        assert!(approx_eq(result.y, 100.0), "y: expected 100.0, got {}", result.y);
    }

    #[test]
    fn test_loose_bounds_90_degrees() {
        let t = RotationTransform::new(90.0, Point::new(50.0, 25.0));
        let result = t.transform_bounds(&BoundingBox::new(0.0, 0.0, 100.0, 50.0));
        assert!(approx_eq(result.width, 50.0), "width: got {}", result.width);
        assert!(approx_eq(result.height, 100.0), "height: got {}", result.height);
    }

    #[test]
    fn test_loose_bounds_45_degrees() {
        let t = RotationTransform::new(45.0, Point::new(50.0, 50.0));
        let result = t.transform_bounds(&BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let expected_size = 100.0 * std::f64::consts::SQRT_2;
        assert!((result.width - expected_size).abs() < 0.1);
        assert!((result.height - expected_size).abs() < 0.1);
    }

    #[test]
    fn test_flip_point() {
        let bounds = BoundingBox::new(10.0, 10.0, 100.0, 50.0);
        let p = Point::new(20.0, 15.0);
        assert_eq!(flip_point(p, &bounds, true, false), Point::new(100.0, 15.0));
        assert_eq!(flip_point(p, &bounds, false, true), Point::new(20.0, 55.0));
    }
}
