//! Retained drawing sink
//!
//! [`RetainedCanvas`] records every paint op as a [`ShapeNode`] instead of
//! emitting output, so the drawn shape can be attached to a
//! [`CellState`](crate::layout::CellState) and queried later.

use crate::layout::{BoundingBox, Point, RotationTransform};

use super::{Canvas, CanvasState, Figure, ImageRun, PaintOp, PathSegment, StyleFrame, TextRun};

/// What a retained node draws
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Figure { figure: Figure, op: PaintOp },
    Image(ImageRun),
    Text(TextRun),
}

/// One recorded draw call together with the style it was drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    pub kind: NodeKind,
    pub frame: StyleFrame,
}

impl ShapeNode {
    /// Untransformed extent of the node
    pub fn bounds(&self) -> Option<BoundingBox> {
        match &self.kind {
            NodeKind::Figure { figure, .. } => figure.bounds(),
            NodeKind::Image(image) => Some(image.bounds),
            NodeKind::Text(text) => Some(BoundingBox::new(
                text.position.x,
                text.position.y,
                text.width,
                text.height,
            )),
        }
    }

    /// True if `point` lies on this node, within `tolerance` of a stroke
    pub fn hit(&self, point: Point, tolerance: f64) -> bool {
        let point = match self.frame.transform {
            Some(t) => {
                let unrotated = RotationTransform::new(-t.rotation, t.center).transform_point(point);
                Point::new(
                    if t.flip_h { 2.0 * t.center.x - unrotated.x } else { unrotated.x },
                    if t.flip_v { 2.0 * t.center.y - unrotated.y } else { unrotated.y },
                )
            }
            None => point,
        };

        match &self.kind {
            NodeKind::Figure { figure, op } => {
                let slack = tolerance + self.frame.stroke_width / 2.0;
                if op.fills() && self.frame.fill_color.is_some() {
                    if let Some(bounds) = figure.bounds() {
                        if bounds.contains(point) {
                            return true;
                        }
                    }
                }
                match figure {
                    Figure::Path(segments) => near_polyline(segments, point, slack),
                    other => other
                        .bounds()
                        .is_some_and(|b| b.grow(slack).contains(point)),
                }
            }
            _ => self
                .bounds()
                .is_some_and(|b| b.grow(tolerance).contains(point)),
        }
    }
}

/// Distance test against the control polygon of a path
fn near_polyline(segments: &[PathSegment], point: Point, slack: f64) -> bool {
    let mut start: Option<Point> = None;
    let mut current: Option<Point> = None;
    for segment in segments {
        let target = match segment {
            PathSegment::MoveTo(p) => {
                start = Some(*p);
                current = Some(*p);
                continue;
            }
            PathSegment::Close => start,
            other => other.end(),
        };
        if let (Some(from), Some(to)) = (current, target) {
            if segment_distance(from, to, point) <= slack {
                return true;
            }
        }
        current = target;
    }
    false
}

fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return a.distance(p);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * dx, a.y + t * dy).distance(p)
}

/// Recorded output of one shape, in paint order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeTree {
    pub nodes: Vec<ShapeNode>,
}

impl ShapeTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Union of all node bounds
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.nodes
            .iter()
            .filter_map(ShapeNode::bounds)
            .fold(None, BoundingBox::merge_into)
    }

    /// Index of the topmost node under `point`
    pub fn hit(&self, point: Point, tolerance: f64) -> Option<usize> {
        self.nodes
            .iter()
            .rposition(|node| node.hit(point, tolerance))
    }
}

/// Sink that keeps what was drawn
#[derive(Debug, Clone, Default)]
pub struct RetainedCanvas {
    state: CanvasState,
    tree: ShapeTree,
}

impl RetainedCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &ShapeTree {
        &self.tree
    }

    pub fn finish(self) -> ShapeTree {
        self.tree
    }
}

impl Canvas for RetainedCanvas {
    fn state(&self) -> &CanvasState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CanvasState {
        &mut self.state
    }

    fn draw_figure(&mut self, figure: Figure, op: PaintOp, frame: &StyleFrame) {
        self.tree.nodes.push(ShapeNode {
            kind: NodeKind::Figure { figure, op },
            frame: frame.clone(),
        });
    }

    fn draw_image(&mut self, image: ImageRun, frame: &StyleFrame) {
        self.tree.nodes.push(ShapeNode {
            kind: NodeKind::Image(image),
            frame: frame.clone(),
        });
    }

    fn draw_text(&mut self, text: TextRun, frame: &StyleFrame) {
        self.tree.nodes.push(ShapeNode {
            kind: NodeKind::Text(text),
            frame: frame.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_paint_ops_only() {
        let mut canvas = RetainedCanvas::new();
        canvas.move_to(0.0, 0.0);
        canvas.line_to(10.0, 0.0);
        canvas.begin();
        canvas.rect(0.0, 0.0, 10.0, 10.0);
        canvas.fill();
        canvas.fill();

        let tree = canvas.finish();
        assert_eq!(tree.nodes.len(), 1);
        assert!(matches!(
            tree.nodes[0].kind,
            NodeKind::Figure {
                figure: Figure::Rect(_),
                op: PaintOp::Fill
            }
        ));
    }

    #[test]
    fn test_hit_filled_rect() {
        let mut canvas = RetainedCanvas::new();
        canvas.set_fill_color(Some("#ff0000"));
        canvas.rect(0.0, 0.0, 10.0, 10.0);
        canvas.fill();
        let tree = canvas.finish();

        assert_eq!(tree.hit(Point::new(5.0, 5.0), 0.0), Some(0));
        assert_eq!(tree.hit(Point::new(20.0, 5.0), 0.0), None);
    }

    #[test]
    fn test_hit_stroked_line_uses_tolerance() {
        let mut canvas = RetainedCanvas::new();
        canvas.begin();
        canvas.move_to(0.0, 0.0);
        canvas.line_to(100.0, 0.0);
        canvas.stroke();
        let tree = canvas.finish();

        assert_eq!(tree.hit(Point::new(50.0, 2.0), 2.0), Some(0));
        assert_eq!(tree.hit(Point::new(50.0, 6.0), 2.0), None);
    }

    #[test]
    fn test_topmost_node_wins() {
        let mut canvas = RetainedCanvas::new();
        canvas.set_fill_color(Some("#ffffff"));
        canvas.rect(0.0, 0.0, 50.0, 50.0);
        canvas.fill();
        canvas.ellipse(10.0, 10.0, 10.0, 10.0);
        canvas.fill_and_stroke();
        let tree = canvas.finish();

        assert_eq!(tree.hit(Point::new(15.0, 15.0), 0.0), Some(1));
        assert_eq!(tree.bounds(), Some(BoundingBox::new(0.0, 0.0, 50.0, 50.0)));
    }
}
