//! Executes shape descriptors against a [`Canvas`]

use log::{trace, warn};

use crate::canvas::{apply_style, Canvas, ImageRun, PaintOp, TextRun};
use crate::layout::{BoundingBox, Point};
use crate::model::CellId;
use crate::style::{keys, Direction, Style};

use super::descriptor::{AspectFrame, Descriptor, Node, StrokeWidth, Tag};
use super::registry::StencilRegistry;

/// Nesting limit for `include-shape`
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// Percentage used by `roundrect` when `arcsize` is missing or zero
pub const RECTANGLE_ROUNDING_PERCENT: f64 = 15.0;

/// The shape being drawn, as seen by attribute callbacks
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub style: &'a Style,
    pub bounds: BoundingBox,
    pub label: Option<&'a str>,
    pub cell: Option<CellId>,
}

impl<'a> ShapeContext<'a> {
    pub fn new(style: &'a Style, bounds: BoundingBox) -> Self {
        Self {
            style,
            bounds,
            label: None,
            cell: None,
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_cell(mut self, cell: CellId) -> Self {
        self.cell = Some(cell);
        self
    }
}

/// Per-descriptor drawing scope
struct Scope<'a> {
    descriptor: &'a Descriptor,
    ctx: &'a ShapeContext<'a>,
    frame: AspectFrame,
    include_depth: usize,
    /// Saved frames below this depth belong to the caller
    base_depth: usize,
}

impl Scope<'_> {
    fn min_scale(&self) -> f64 {
        self.frame.min_scale()
    }

    /// Attribute value, falling back to a registered callback
    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        if let Some(value) = node.attribute(name) {
            return Some(value.to_string());
        }
        self.descriptor
            .callback(&node.name, name)
            .and_then(|callback| callback(self.ctx))
    }

    /// Numeric attribute; missing or malformed values read as 0
    fn number(&self, node: &Node, name: &str) -> f64 {
        self.attribute(node, name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    fn point(&self, node: &Node, x: &str, y: &str) -> Point {
        self.frame.map(self.number(node, x), self.number(node, y))
    }

    /// `x`, `y`, `w`, `h` mapped into target coordinates
    fn rect(&self, node: &Node) -> BoundingBox {
        let origin = self.point(node, "x", "y");
        BoundingBox::new(
            origin.x,
            origin.y,
            self.number(node, "w") * self.frame.sx,
            self.number(node, "h") * self.frame.sy,
        )
    }
}

/// Draws descriptors, resolving `include-shape` through a registry
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'r> {
    registry: &'r StencilRegistry,
}

impl<'r> Interpreter<'r> {
    pub fn new(registry: &'r StencilRegistry) -> Self {
        Self { registry }
    }

    /// Draw `descriptor` into `bounds` with no cell style applied
    pub fn render<C: Canvas + ?Sized>(
        &self,
        descriptor: &Descriptor,
        bounds: BoundingBox,
        direction: Direction,
        canvas: &mut C,
    ) {
        let style = Style::new();
        let ctx = ShapeContext::new(&style, bounds);
        let depth = canvas.state().depth();
        self.draw(descriptor, &ctx, bounds, direction, canvas, 0);
        canvas.state_mut().restore_to(depth);
    }

    /// Draw `descriptor` for a cell: configure the canvas from the cell
    /// style, apply its rotation, direction and flips, then draw into the
    /// context bounds. The canvas style stack is left as it was found.
    pub fn draw_shape<C: Canvas + ?Sized>(
        &self,
        descriptor: &Descriptor,
        ctx: &ShapeContext<'_>,
        canvas: &mut C,
    ) {
        let depth = canvas.state().depth();
        canvas.save();
        apply_style(canvas, ctx.style);

        let direction = ctx.style.direction();
        let rotation = ctx.style.number(keys::ROTATION, 0.0) + direction.angle();
        let mut flip_h = ctx.style.flag(keys::FLIP_H, false);
        let mut flip_v = ctx.style.flag(keys::FLIP_V, false);
        if direction.is_vertical() {
            std::mem::swap(&mut flip_h, &mut flip_v);
        }
        if rotation % 360.0 != 0.0 || flip_h || flip_v {
            canvas.rotate(rotation, flip_h, flip_v, ctx.bounds.center());
        }

        self.draw(descriptor, ctx, ctx.bounds, direction, canvas, 0);
        canvas.state_mut().restore_to(depth);
    }

    fn draw<C: Canvas + ?Sized>(
        &self,
        descriptor: &Descriptor,
        ctx: &ShapeContext<'_>,
        bounds: BoundingBox,
        direction: Direction,
        canvas: &mut C,
        include_depth: usize,
    ) {
        if !(bounds.width > 0.0 && bounds.height > 0.0) {
            trace!(width = bounds.width, height = bounds.height; "empty stencil target skipped");
            return;
        }
        let depth = canvas.state().depth();
        let scope = Scope {
            descriptor,
            ctx,
            frame: descriptor.compute_aspect(&bounds, direction),
            include_depth,
            base_depth: depth,
        };

        let stroke_width = match descriptor.stroke_width() {
            StrokeWidth::Inherit => ctx.style.number(keys::STROKE_WIDTH, 1.0),
            StrokeWidth::Scaled(width) => width * scope.min_scale(),
        };
        canvas.set_stroke_width(stroke_width);

        for node in descriptor.background() {
            self.draw_node(&scope, node, canvas, false);
        }
        for node in descriptor.foreground() {
            self.draw_node(&scope, node, canvas, true);
        }

        if canvas.state().depth() != depth {
            trace!(saved = canvas.state().depth(), expected = depth; "repairing unbalanced save/restore");
            canvas.state_mut().restore_to(depth);
        }
    }

    fn draw_node<C: Canvas + ?Sized>(
        &self,
        scope: &Scope<'_>,
        node: &Node,
        canvas: &mut C,
        foreground: bool,
    ) {
        let (sx, sy) = (scope.frame.sx, scope.frame.sy);
        match node.tag {
            Tag::Path => {
                canvas.begin();
                let rounded = node.attribute("rounded") == Some("1")
                    && self.rounded_path(scope, node, canvas);
                if !rounded {
                    for child in &node.children {
                        self.draw_node(scope, child, canvas, foreground);
                    }
                }
            }
            Tag::Move => {
                let p = scope.point(node, "x", "y");
                canvas.move_to(p.x, p.y);
            }
            Tag::Line => {
                let p = scope.point(node, "x", "y");
                canvas.line_to(p.x, p.y);
            }
            Tag::Quad => {
                let c = scope.point(node, "x1", "y1");
                let p = scope.point(node, "x2", "y2");
                canvas.quad_to(c.x, c.y, p.x, p.y);
            }
            Tag::Curve => {
                let c1 = scope.point(node, "x1", "y1");
                let c2 = scope.point(node, "x2", "y2");
                let p = scope.point(node, "x3", "y3");
                canvas.curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y);
            }
            Tag::Arc => {
                let p = scope.point(node, "x", "y");
                canvas.arc_to(
                    scope.number(node, "rx") * sx,
                    scope.number(node, "ry") * sy,
                    scope.number(node, "x-axis-rotation"),
                    scope.number(node, "large-arc-flag") != 0.0,
                    scope.number(node, "sweep-flag") != 0.0,
                    p.x,
                    p.y,
                );
            }
            Tag::Close => canvas.close(),
            Tag::Rect => {
                let r = scope.rect(node);
                canvas.rect(r.x, r.y, r.width, r.height);
            }
            Tag::RoundRect => {
                let mut arc_size = scope.number(node, "arcsize");
                if arc_size == 0.0 {
                    arc_size = RECTANGLE_ROUNDING_PERCENT;
                }
                let factor = arc_size / 100.0;
                let r = scope.rect(node);
                let radius = (r.width * factor).min(r.height * factor);
                canvas.round_rect(r.x, r.y, r.width, r.height, radius, radius);
            }
            Tag::Ellipse => {
                let r = scope.rect(node);
                canvas.ellipse(r.x, r.y, r.width, r.height);
            }
            Tag::Fill | Tag::Stroke | Tag::FillStroke => {
                canvas.paint(match node.tag {
                    Tag::Fill => PaintOp::Fill,
                    Tag::Stroke => PaintOp::Stroke,
                    _ => PaintOp::FillStroke,
                });
                if foreground {
                    canvas.set_shadow(false);
                }
            }
            Tag::Image => match scope.attribute(node, "src") {
                Some(src) => canvas.image(ImageRun {
                    bounds: scope.rect(node),
                    src,
                    preserve_aspect: false,
                    flip_h: node.attribute("flipH") == Some("1"),
                    flip_v: node.attribute("flipV") == Some("1"),
                }),
                None => trace!("image without src skipped"),
            },
            Tag::Text => self.text(scope, node, canvas),
            Tag::IncludeShape => self.include(scope, node, canvas),
            Tag::Save => canvas.save(),
            Tag::Restore => {
                if canvas.state().depth() > scope.base_depth {
                    canvas.restore();
                } else {
                    trace!("restore without matching save ignored");
                }
            }
            Tag::StrokeWidth => {
                let multiplier = if node.attribute("fixed") == Some("1") {
                    1.0
                } else {
                    scope.min_scale()
                };
                canvas.set_stroke_width(scope.number(node, "width") * multiplier);
            }
            Tag::Dashed => {
                let fixed = canvas.state().frame().fixed_dash;
                canvas.set_dashed(node.attribute("dashed") == Some("1"), fixed);
            }
            Tag::DashPattern => {
                if let Some(pattern) = scope.attribute(node, "pattern") {
                    let scaled: Vec<String> = pattern
                        .split_whitespace()
                        .map(|v| {
                            let value = v.parse::<f64>().unwrap_or(0.0) * scope.min_scale();
                            value.to_string()
                        })
                        .collect();
                    canvas.set_dash_pattern(&scaled.join(" "));
                }
            }
            Tag::StrokeColor => {
                let color = scope.attribute(node, "color");
                canvas.set_stroke_color(color.as_deref());
            }
            Tag::FillColor => {
                let color = scope.attribute(node, "color");
                canvas.set_fill_color(color.as_deref());
            }
            Tag::FontColor => {
                if let Some(color) = scope.attribute(node, "color") {
                    canvas.set_font_color(&color);
                }
            }
            Tag::FontSize => {
                canvas.set_font_size(scope.number(node, "size") * scope.min_scale());
            }
            Tag::FontFamily => {
                if let Some(family) = scope.attribute(node, "family") {
                    canvas.set_font_family(&family);
                }
            }
            Tag::FontStyle => {
                let style = scope
                    .attribute(node, "style")
                    .and_then(|v| v.trim().parse::<u32>().ok())
                    .unwrap_or(0);
                canvas.set_font_style(style);
            }
            Tag::Alpha => canvas.set_alpha(scope.number(node, "alpha")),
            Tag::FillAlpha => canvas.set_fill_alpha(scope.number(node, "alpha")),
            Tag::StrokeAlpha => canvas.set_stroke_alpha(scope.number(node, "alpha")),
            Tag::LineCap => {
                if let Some(cap) = scope.attribute(node, "cap") {
                    canvas.set_line_cap(&cap);
                }
            }
            Tag::LineJoin => {
                if let Some(join) = scope.attribute(node, "join") {
                    canvas.set_line_join(&join);
                }
            }
            Tag::MiterLimit => canvas.set_miter_limit(scope.number(node, "limit")),
            Tag::Unknown => trace!(tag:% = node.name; "skipping unknown stencil element"),
        }
    }

    /// Emit a path made only of `move`/`line` children with rounded
    /// corners. Returns false if the path has other children.
    fn rounded_path<C: Canvas + ?Sized>(
        &self,
        scope: &Scope<'_>,
        node: &Node,
        canvas: &mut C,
    ) -> bool {
        let arc_size = scope.number(node, "arcSize");
        let mut segments: Vec<Vec<Point>> = Vec::new();
        for child in &node.children {
            match child.tag {
                Tag::Move | Tag::Line => {
                    if child.tag == Tag::Move || segments.is_empty() {
                        segments.push(Vec::new());
                    }
                    let p = scope.point(child, "x", "y");
                    if let Some(segment) = segments.last_mut() {
                        segment.push(p);
                    }
                }
                _ => return false,
            }
        }
        if segments.is_empty() {
            return false;
        }

        for mut points in segments {
            let closed = points.first() == points.last();
            if closed {
                points.pop();
            }
            add_rounded_points(canvas, &points, arc_size, closed);
        }
        true
    }

    fn text<C: Canvas + ?Sized>(&self, scope: &Scope<'_>, node: &Node, canvas: &mut C) {
        let value = scope.attribute(node, "str").unwrap_or_default();
        let mut rotation = if node.attribute("vertical") == Some("1") {
            -90.0
        } else {
            0.0
        };

        if node.attribute("align-shape") == Some("0") {
            let style = scope.ctx.style;
            let shape_rotation = style.number(keys::ROTATION, 0.0);
            let flip_h = style.flag(keys::FLIP_H, false);
            let flip_v = style.flag(keys::FLIP_V, false);
            if flip_h != flip_v {
                rotation += shape_rotation;
            } else {
                rotation -= shape_rotation;
            }
        }
        rotation -= scope.number(node, "rotation");

        canvas.text(TextRun {
            position: scope.point(node, "x", "y"),
            width: 0.0,
            height: 0.0,
            value,
            align: node.attribute("align").unwrap_or("left").to_string(),
            valign: node.attribute("valign").unwrap_or("top").to_string(),
            rotation,
        });
    }

    fn include<C: Canvas + ?Sized>(&self, scope: &Scope<'_>, node: &Node, canvas: &mut C) {
        let Some(name) = node.attribute("name") else {
            trace!("include-shape without name skipped");
            return;
        };
        if scope.include_depth >= MAX_INCLUDE_DEPTH {
            warn!(name, depth = scope.include_depth; "include-shape nesting too deep, skipped");
            return;
        }
        let Some(included) = self.registry.get(name) else {
            warn!(name; "include-shape references unknown stencil");
            return;
        };

        let depth = canvas.state().depth();
        canvas.save();
        self.draw(
            included,
            scope.ctx,
            scope.rect(node),
            Direction::East,
            canvas,
            scope.include_depth + 1,
        );
        canvas.state_mut().restore_to(depth);
    }
}

/// Emit `points` as a polyline whose corners are cut by `arc_size` and
/// replaced with quadratic curves
fn add_rounded_points<C: Canvas + ?Sized>(
    canvas: &mut C,
    points: &[Point],
    arc_size: f64,
    closed: bool,
) {
    let Some(&last) = points.last() else {
        return;
    };

    let mut pts = points.to_vec();
    if closed {
        let first = pts[0];
        pts.insert(
            0,
            Point::new(last.x + (first.x - last.x) / 2.0, last.y + (first.y - last.y) / 2.0),
        );
    }

    let n = pts.len();
    let mut current = pts[0];
    canvas.move_to(current.x, current.y);

    let end = if closed { n } else { n - 1 };
    let mut i = 1;
    while i < end {
        let mut corner = pts[i % n];
        let dx = current.x - corner.x;
        let dy = current.y - corner.y;

        if dx != 0.0 || dy != 0.0 {
            let dist = (dx * dx + dy * dy).sqrt();
            let cut = arc_size.min(dist / 2.0);
            canvas.line_to(corner.x + dx * cut / dist, corner.y + dy * cut / dist);

            let mut next = pts[(i + 1) % n];
            while i + 2 < n
                && (next.x - corner.x).round() == 0.0
                && (next.y - corner.y).round() == 0.0
            {
                next = pts[(i + 2) % n];
                i += 1;
            }

            let dx = next.x - corner.x;
            let dy = next.y - corner.y;
            let dist = (dx * dx + dy * dy).sqrt().max(1.0);
            let cut = arc_size.min(dist / 2.0);
            let x2 = corner.x + dx * cut / dist;
            let y2 = corner.y + dy * cut / dist;
            canvas.quad_to(corner.x, corner.y, x2, y2);
            corner = Point::new(x2, y2);
        } else {
            canvas.line_to(corner.x, corner.y);
        }

        current = corner;
        i += 1;
    }

    if closed {
        canvas.close();
    } else {
        canvas.line_to(last.x, last.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::retained::NodeKind;
    use crate::canvas::{Figure, PathSegment, RetainedCanvas, ShapeTree};
    use pretty_assertions::assert_eq;

    fn render(xml: &str, bounds: BoundingBox) -> ShapeTree {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(xml).expect("parse");
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).render(&descriptor, bounds, Direction::East, &mut canvas);
        canvas.finish()
    }

    fn figure(tree: &ShapeTree, index: usize) -> &Figure {
        match &tree.nodes[index].kind {
            NodeKind::Figure { figure, .. } => figure,
            other => panic!("expected figure, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_aspect_rect() {
        let tree = render(
            r#"<shape w="100" h="50" aspect="fixed"><background><rect x="0" y="0" w="100" h="50"/><fill/></background></shape>"#,
            BoundingBox::new(0.0, 0.0, 40.0, 40.0),
        );
        assert_eq!(
            figure(&tree, 0),
            &Figure::Rect(BoundingBox::new(0.0, 10.0, 40.0, 20.0))
        );
    }

    #[test]
    fn test_zero_width_descriptor_stays_finite() {
        let tree = render(
            r#"<shape w="0" h="50"><background><rect x="0" y="0" w="100" h="50"/><fill/></background></shape>"#,
            BoundingBox::new(0.0, 0.0, 100.0, 50.0),
        );
        assert_eq!(
            figure(&tree, 0),
            &Figure::Rect(BoundingBox::new(0.0, 0.0, 100.0, 50.0))
        );
    }

    #[test]
    fn test_empty_target_draws_nothing() {
        let xml = r#"<shape><background><rect x="0" y="0" w="100" h="100"/><fill/></background></shape>"#;
        assert!(render(xml, BoundingBox::new(0.0, 0.0, 0.0, 50.0)).is_empty());
        assert!(render(xml, BoundingBox::new(0.0, 0.0, 50.0, -1.0)).is_empty());
    }

    #[test]
    fn test_roundrect_default_arcsize() {
        let tree = render(
            r#"<shape w="100" h="50"><foreground><roundrect x="0" y="0" w="100" h="50"/><stroke/></foreground></shape>"#,
            BoundingBox::new(0.0, 0.0, 100.0, 50.0),
        );
        assert_eq!(
            figure(&tree, 0),
            &Figure::RoundRect {
                bounds: BoundingBox::new(0.0, 0.0, 100.0, 50.0),
                dx: 7.5,
                dy: 7.5
            }
        );
    }

    #[test]
    fn test_unpainted_path_is_invisible() {
        let tree = render(
            r#"<shape><foreground><path><move x="0" y="0"/><line x="10" y="0"/></path><rect x="0" y="0" w="5" h="5"/><stroke/></foreground></shape>"#,
            BoundingBox::new(0.0, 0.0, 100.0, 100.0),
        );
        assert_eq!(tree.nodes.len(), 1);
        assert!(matches!(figure(&tree, 0), Figure::Rect(_)));
    }

    #[test]
    fn test_shadow_consumed_by_first_foreground_paint() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape><background><rect x="0" y="0" w="10" h="10"/><fill/></background>
               <foreground><rect x="0" y="0" w="10" h="10"/><fill/><rect x="0" y="0" w="5" h="5"/><stroke/></foreground></shape>"#,
        )
        .expect("parse");
        let style = Style::new().with(keys::SHADOW, "1");
        let ctx = ShapeContext::new(&style, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);

        let shadows: Vec<bool> = canvas.tree().nodes.iter().map(|n| n.frame.shadow).collect();
        assert_eq!(shadows, vec![true, true, false]);
    }

    #[test]
    fn test_unbalanced_save_is_repaired() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r##"<shape><foreground><save/><save/><strokecolor color="#ff0000"/><restore/><restore/><restore/></foreground></shape>"##,
        )
        .expect("parse");
        let mut canvas = RetainedCanvas::new();
        canvas.save();
        Interpreter::new(&registry).render(
            &descriptor,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            Direction::East,
            &mut canvas,
        );
        assert_eq!(canvas.state().depth(), 1);

        let descriptor = Descriptor::parse(r#"<shape><foreground><save/><save/></foreground></shape>"#)
            .expect("parse");
        let ctx_style = Style::new();
        let ctx = ShapeContext::new(&ctx_style, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);
        assert_eq!(canvas.state().depth(), 1);
    }

    #[test]
    fn test_stroke_width_scaling() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape w="100" h="100" strokewidth="2"><foreground><rect x="0" y="0" w="10" h="10"/><stroke/><strokewidth width="3" fixed="1"/><rect x="0" y="0" w="10" h="10"/><stroke/><strokewidth width="3"/><rect x="0" y="0" w="10" h="10"/><stroke/></foreground></shape>"#,
        )
        .expect("parse");
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).render(
            &descriptor,
            BoundingBox::new(0.0, 0.0, 50.0, 200.0),
            Direction::East,
            &mut canvas,
        );
        let widths: Vec<f64> = canvas
            .tree()
            .nodes
            .iter()
            .map(|n| n.frame.stroke_width)
            .collect();
        assert_eq!(widths, vec![1.0, 3.0, 1.5]);
    }

    #[test]
    fn test_inherited_stroke_width() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape strokewidth="inherit"><foreground><rect x="0" y="0" w="10" h="10"/><stroke/></foreground></shape>"#,
        )
        .expect("parse");
        let style = Style::new().with(keys::STROKE_WIDTH, "4");
        let ctx = ShapeContext::new(&style, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);
        assert_eq!(canvas.tree().nodes[0].frame.stroke_width, 4.0);
    }

    #[test]
    fn test_dash_pattern_and_font_size_scale() {
        let tree = render(
            r#"<shape w="100" h="100"><foreground><dashpattern pattern="4 2"/><fontsize size="20"/><rect x="0" y="0" w="10" h="10"/><stroke/></foreground></shape>"#,
            BoundingBox::new(0.0, 0.0, 50.0, 50.0),
        );
        assert_eq!(tree.nodes[0].frame.dash_pattern, "2 1");
        assert_eq!(tree.nodes[0].frame.font_size, 10.0);
    }

    #[test]
    fn test_rounded_path_emits_curves() {
        let tree = render(
            r#"<shape w="100" h="100"><foreground><path rounded="1" arcSize="10"><move x="0" y="0"/><line x="100" y="0"/><line x="100" y="100"/></path><stroke/></foreground></shape>"#,
            BoundingBox::new(0.0, 0.0, 100.0, 100.0),
        );
        let Figure::Path(segments) = figure(&tree, 0) else {
            panic!("expected path");
        };
        assert_eq!(
            segments,
            &vec![
                PathSegment::MoveTo(Point::new(0.0, 0.0)),
                PathSegment::LineTo(Point::new(90.0, 0.0)),
                PathSegment::QuadTo {
                    control: Point::new(100.0, 0.0),
                    end: Point::new(100.0, 10.0)
                },
                PathSegment::LineTo(Point::new(100.0, 100.0)),
            ]
        );
    }

    #[test]
    fn test_rounded_path_with_close_parses_regularly() {
        let tree = render(
            r#"<shape><foreground><path rounded="1" arcSize="10"><move x="0" y="0"/><line x="10" y="0"/><close/></path><stroke/></foreground></shape>"#,
            BoundingBox::new(0.0, 0.0, 100.0, 100.0),
        );
        let Figure::Path(segments) = figure(&tree, 0) else {
            panic!("expected path");
        };
        assert_eq!(segments.last(), Some(&PathSegment::Close));
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn test_text_defaults_and_rotation() {
        let style = Style::new().with(keys::ROTATION, "30");
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape><foreground><text x="50" y="10" str="Hi" vertical="1" align-shape="0" rotation="5"/></foreground></shape>"#,
        )
        .expect("parse");
        let ctx = ShapeContext::new(&style, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);

        let NodeKind::Text(text) = &canvas.tree().nodes[0].kind else {
            panic!("expected text");
        };
        assert_eq!(text.value, "Hi");
        assert_eq!(text.align, "left");
        assert_eq!(text.valign, "top");
        assert_eq!(text.rotation, -125.0);
        assert_eq!(text.position, Point::new(50.0, 10.0));
    }

    #[test]
    fn test_callback_supplies_missing_attribute() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape><foreground><text x="0" y="0"/></foreground></shape>"#,
        )
        .expect("parse")
        .with_callback("text", "str", |ctx| ctx.label.map(str::to_uppercase));
        let style = Style::new();
        let ctx = ShapeContext::new(&style, BoundingBox::new(0.0, 0.0, 10.0, 10.0)).with_label("start");
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);

        let NodeKind::Text(text) = &canvas.tree().nodes[0].kind else {
            panic!("expected text");
        };
        assert_eq!(text.value, "START");
    }

    #[test]
    fn test_include_shape() {
        let mut registry = StencilRegistry::new();
        registry
            .load_library(
                r#"<shapes>
  <shape name="dot" w="10" h="10"><foreground><ellipse x="0" y="0" w="10" h="10"/><fill/></foreground></shape>
  <shape name="pair" w="100" h="100"><foreground>
    <include-shape name="dot" x="0" y="0" w="20" h="20"/>
    <include-shape name="missing" x="0" y="0" w="20" h="20"/>
    <include-shape name="pair" x="50" y="50" w="50" h="50"/>
  </foreground></shape>
</shapes>"#,
            )
            .expect("load");
        let mut canvas = RetainedCanvas::new();
        let pair = registry.get("pair").expect("pair");
        Interpreter::new(&registry).render(
            pair,
            BoundingBox::new(0.0, 0.0, 200.0, 200.0),
            Direction::East,
            &mut canvas,
        );

        let tree = canvas.finish();
        // one dot per nesting level below the include limit
        assert_eq!(tree.nodes.len(), MAX_INCLUDE_DEPTH);
        assert_eq!(
            figure(&tree, 0),
            &Figure::Ellipse(BoundingBox::new(0.0, 0.0, 40.0, 40.0))
        );
    }

    #[test]
    fn test_direction_rotates_canvas() {
        let registry = StencilRegistry::new();
        let descriptor = Descriptor::parse(
            r#"<shape><foreground><rect x="0" y="0" w="100" h="100"/><fill/></foreground></shape>"#,
        )
        .expect("parse");
        let style = Style::new()
            .with(keys::DIRECTION, "south")
            .with(keys::FLIP_H, "1");
        let ctx = ShapeContext::new(&style, BoundingBox::new(0.0, 0.0, 100.0, 50.0));
        let mut canvas = RetainedCanvas::new();
        Interpreter::new(&registry).draw_shape(&descriptor, &ctx, &mut canvas);

        let transform = canvas.tree().nodes[0].frame.transform.expect("transform");
        assert_eq!(transform.rotation, 90.0);
        assert!(!transform.flip_h);
        assert!(transform.flip_v);
        assert_eq!(transform.center, Point::new(50.0, 25.0));
        assert!(canvas.state().frame().transform.is_none());
    }
}
