//! Abstract drawing backend
//!
//! The stencil interpreter and the diagram renderer draw through the
//! [`Canvas`] trait. Style frames and path construction live in the shared
//! [`CanvasState`] and the trait's default methods, so every sink receives
//! the same geometry and style; a sink only decides what a painted
//! [`Figure`], an image or a text run turns into.

pub mod retained;
pub mod svg;

pub use retained::{RetainedCanvas, ShapeNode, ShapeTree};
pub use svg::SvgCanvas;

use crate::layout::{BoundingBox, Point};
use crate::style::{keys, Style, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};

/// Bits of the `fontStyle` mask
pub mod font_style {
    pub const BOLD: u32 = 1;
    pub const ITALIC: u32 = 2;
    pub const UNDERLINE: u32 = 4;
}

/// A segment of a path under construction
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Move to starting point
    MoveTo(Point),
    /// Straight line to point
    LineTo(Point),
    /// Quadratic Bezier curve
    QuadTo { control: Point, end: Point },
    /// Cubic Bezier curve
    CurveTo { c1: Point, c2: Point, end: Point },
    /// Elliptical arc, SVG semantics
    ArcTo {
        rx: f64,
        ry: f64,
        angle: f64,
        large_arc: bool,
        sweep: bool,
        end: Point,
    },
    /// Close path back to start
    Close,
}

impl PathSegment {
    /// End point of the segment, if it has one
    pub fn end(&self) -> Option<Point> {
        match self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => Some(*p),
            PathSegment::QuadTo { end, .. }
            | PathSegment::CurveTo { end, .. }
            | PathSegment::ArcTo { end, .. } => Some(*end),
            PathSegment::Close => None,
        }
    }
}

/// Convert path segments to an SVG `d` attribute string
pub fn path_to_d(segments: &[PathSegment]) -> String {
    let mut d = String::new();
    for seg in segments {
        if !d.is_empty() {
            d.push(' ');
        }
        match seg {
            PathSegment::MoveTo(p) => d.push_str(&format!("M{:.2} {:.2}", p.x, p.y)),
            PathSegment::LineTo(p) => d.push_str(&format!("L{:.2} {:.2}", p.x, p.y)),
            PathSegment::QuadTo { control, end } => d.push_str(&format!(
                "Q{:.2} {:.2} {:.2} {:.2}",
                control.x, control.y, end.x, end.y
            )),
            PathSegment::CurveTo { c1, c2, end } => d.push_str(&format!(
                "C{:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
                c1.x, c1.y, c2.x, c2.y, end.x, end.y
            )),
            PathSegment::ArcTo {
                rx,
                ry,
                angle,
                large_arc,
                sweep,
                end,
            } => d.push_str(&format!(
                "A{:.2} {:.2} {} {} {} {:.2} {:.2}",
                rx,
                ry,
                angle,
                u8::from(*large_arc),
                u8::from(*sweep),
                end.x,
                end.y
            )),
            PathSegment::Close => d.push('Z'),
        }
    }
    d
}

/// What a paint op fills or strokes
#[derive(Debug, Clone, PartialEq)]
pub enum Figure {
    Path(Vec<PathSegment>),
    Rect(BoundingBox),
    RoundRect { bounds: BoundingBox, dx: f64, dy: f64 },
    Ellipse(BoundingBox),
}

impl Figure {
    /// Extent of the figure; for paths the hull of all their points
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Figure::Rect(b) | Figure::Ellipse(b) | Figure::RoundRect { bounds: b, .. } => Some(*b),
            Figure::Path(segments) => {
                let mut points = segments.iter().flat_map(|seg| match seg {
                    PathSegment::QuadTo { control, end } => vec![*control, *end],
                    PathSegment::CurveTo { c1, c2, end } => vec![*c1, *c2, *end],
                    other => other.end().into_iter().collect(),
                });
                let first = points.next()?;
                Some(points.fold(BoundingBox::new(first.x, first.y, 0.0, 0.0), |b, p| {
                    b.expand_to_include(p)
                }))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOp {
    Fill,
    Stroke,
    FillStroke,
}

impl PaintOp {
    pub fn fills(&self) -> bool {
        matches!(self, PaintOp::Fill | PaintOp::FillStroke)
    }

    pub fn strokes(&self) -> bool {
        matches!(self, PaintOp::Stroke | PaintOp::FillStroke)
    }
}

/// Rotation and mirroring applied to everything drawn in a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// Clockwise degrees
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    /// Pivot of both the rotation and the flips
    pub center: Point,
}

/// One level of the canvas style stack
#[derive(Debug, Clone, PartialEq)]
pub struct StyleFrame {
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub stroke_width: f64,
    pub dashed: bool,
    /// Dash pattern does not scale with the stroke width
    pub fixed_dash: bool,
    pub dash_pattern: String,
    pub alpha: f64,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub line_cap: String,
    pub line_join: String,
    pub miter_limit: f64,
    pub font_color: String,
    pub font_size: f64,
    pub font_family: String,
    /// Bit mask of [`font_style`] flags
    pub font_style: u32,
    pub shadow: bool,
    pub transform: Option<FrameTransform>,
}

impl Default for StyleFrame {
    fn default() -> Self {
        Self {
            fill_color: None,
            stroke_color: Some("#000000".to_string()),
            stroke_width: 1.0,
            dashed: false,
            fixed_dash: false,
            dash_pattern: "3 3".to_string(),
            alpha: 1.0,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_cap: "flat".to_string(),
            line_join: "miter".to_string(),
            miter_limit: 10.0,
            font_color: "#000000".to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_style: 0,
            shadow: false,
            transform: None,
        }
    }
}

/// A text run handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Anchor point; its meaning depends on `align` and `valign`
    pub position: Point,
    /// Wrapping box, zero when the text is not wrapped
    pub width: f64,
    pub height: f64,
    pub value: String,
    /// `left`, `center` or `right`
    pub align: String,
    /// `top`, `middle` or `bottom`
    pub valign: String,
    /// Clockwise degrees around the anchor
    pub rotation: f64,
}

/// An image handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRun {
    pub bounds: BoundingBox,
    pub src: String,
    pub preserve_aspect: bool,
    pub flip_h: bool,
    pub flip_v: bool,
}

/// Style stack and path under construction, shared by every sink
#[derive(Debug, Clone, Default)]
pub struct CanvasState {
    frame: StyleFrame,
    stack: Vec<StyleFrame>,
    path: Vec<PathSegment>,
    figure: Option<Figure>,
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &StyleFrame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut StyleFrame {
        &mut self.frame
    }

    /// Number of saved frames
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn save(&mut self) {
        self.stack.push(self.frame.clone());
    }

    /// Pop the last saved frame; a restore without a save is ignored
    pub fn restore(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.frame = frame;
        }
    }

    /// Unwind the stack back to `depth` saved frames
    pub fn restore_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            self.restore();
        }
    }

    /// Discard any unpainted path or figure
    pub fn begin(&mut self) {
        self.path.clear();
        self.figure = None;
    }

    pub fn push_segment(&mut self, segment: PathSegment) {
        self.figure = None;
        self.path.push(segment);
    }

    /// Replace the unpainted path with a shorthand figure
    pub fn set_figure(&mut self, figure: Figure) {
        self.path.clear();
        self.figure = Some(figure);
    }

    /// Take the figure for a paint op, leaving nothing to paint
    pub fn take_figure(&mut self) -> Option<Figure> {
        if let Some(figure) = self.figure.take() {
            return Some(figure);
        }
        if self.path.is_empty() {
            None
        } else {
            Some(Figure::Path(std::mem::take(&mut self.path)))
        }
    }
}

/// A drawing sink.
///
/// Sinks implement the four required methods; everything else is shared.
pub trait Canvas {
    fn state(&self) -> &CanvasState;
    fn state_mut(&mut self) -> &mut CanvasState;

    /// Emit a painted figure with the frame that was current at paint time
    fn draw_figure(&mut self, figure: Figure, op: PaintOp, frame: &StyleFrame);
    fn draw_image(&mut self, image: ImageRun, frame: &StyleFrame);
    fn draw_text(&mut self, text: TextRun, frame: &StyleFrame);

    fn save(&mut self) {
        self.state_mut().save();
    }

    fn restore(&mut self) {
        self.state_mut().restore();
    }

    fn set_stroke_width(&mut self, width: f64) {
        self.state_mut().frame_mut().stroke_width = width;
    }

    fn set_dashed(&mut self, dashed: bool, fixed: bool) {
        let frame = self.state_mut().frame_mut();
        frame.dashed = dashed;
        frame.fixed_dash = fixed;
    }

    fn set_dash_pattern(&mut self, pattern: &str) {
        self.state_mut().frame_mut().dash_pattern = pattern.to_string();
    }

    /// `None` or `none` disables stroking
    fn set_stroke_color(&mut self, color: Option<&str>) {
        self.state_mut().frame_mut().stroke_color =
            color.filter(|c| *c != "none").map(str::to_string);
    }

    /// `None` or `none` disables filling
    fn set_fill_color(&mut self, color: Option<&str>) {
        self.state_mut().frame_mut().fill_color =
            color.filter(|c| *c != "none").map(str::to_string);
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.state_mut().frame_mut().alpha = alpha;
    }

    fn set_fill_alpha(&mut self, alpha: f64) {
        self.state_mut().frame_mut().fill_alpha = alpha;
    }

    fn set_stroke_alpha(&mut self, alpha: f64) {
        self.state_mut().frame_mut().stroke_alpha = alpha;
    }

    fn set_line_cap(&mut self, cap: &str) {
        self.state_mut().frame_mut().line_cap = cap.to_string();
    }

    fn set_line_join(&mut self, join: &str) {
        self.state_mut().frame_mut().line_join = join.to_string();
    }

    fn set_miter_limit(&mut self, limit: f64) {
        self.state_mut().frame_mut().miter_limit = limit;
    }

    fn set_font_color(&mut self, color: &str) {
        self.state_mut().frame_mut().font_color = color.to_string();
    }

    fn set_font_size(&mut self, size: f64) {
        self.state_mut().frame_mut().font_size = size;
    }

    fn set_font_family(&mut self, family: &str) {
        self.state_mut().frame_mut().font_family = family.to_string();
    }

    fn set_font_style(&mut self, style: u32) {
        self.state_mut().frame_mut().font_style = style;
    }

    fn set_shadow(&mut self, enabled: bool) {
        self.state_mut().frame_mut().shadow = enabled;
    }

    /// Rotate and mirror everything drawn in the current frame
    fn rotate(&mut self, rotation: f64, flip_h: bool, flip_v: bool, center: Point) {
        self.state_mut().frame_mut().transform = Some(FrameTransform {
            rotation,
            flip_h,
            flip_v,
            center,
        });
    }

    fn begin(&mut self) {
        self.state_mut().begin();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.state_mut()
            .push_segment(PathSegment::MoveTo(Point::new(x, y)));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.state_mut()
            .push_segment(PathSegment::LineTo(Point::new(x, y)));
    }

    fn quad_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.state_mut().push_segment(PathSegment::QuadTo {
            control: Point::new(x1, y1),
            end: Point::new(x2, y2),
        });
    }

    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.state_mut().push_segment(PathSegment::CurveTo {
            c1: Point::new(x1, y1),
            c2: Point::new(x2, y2),
            end: Point::new(x3, y3),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn arc_to(
        &mut self,
        rx: f64,
        ry: f64,
        angle: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    ) {
        self.state_mut().push_segment(PathSegment::ArcTo {
            rx,
            ry,
            angle,
            large_arc,
            sweep,
            end: Point::new(x, y),
        });
    }

    fn close(&mut self) {
        self.state_mut().push_segment(PathSegment::Close);
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.state_mut()
            .set_figure(Figure::Rect(BoundingBox::new(x, y, w, h)));
    }

    fn round_rect(&mut self, x: f64, y: f64, w: f64, h: f64, dx: f64, dy: f64) {
        self.state_mut().set_figure(Figure::RoundRect {
            bounds: BoundingBox::new(x, y, w, h),
            dx,
            dy,
        });
    }

    fn ellipse(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.state_mut()
            .set_figure(Figure::Ellipse(BoundingBox::new(x, y, w, h)));
    }

    fn fill(&mut self) {
        self.paint(PaintOp::Fill);
    }

    fn stroke(&mut self) {
        self.paint(PaintOp::Stroke);
    }

    fn fill_and_stroke(&mut self) {
        self.paint(PaintOp::FillStroke);
    }

    /// Hand the pending figure to the sink; without one this is a no-op
    fn paint(&mut self, op: PaintOp) {
        if let Some(figure) = self.state_mut().take_figure() {
            let frame = self.state().frame().clone();
            self.draw_figure(figure, op, &frame);
        }
    }

    fn image(&mut self, image: ImageRun) {
        let frame = self.state().frame().clone();
        self.draw_image(image, &frame);
    }

    fn text(&mut self, text: TextRun) {
        let frame = self.state().frame().clone();
        self.draw_text(text, &frame);
    }
}

/// Configure the current frame from a resolved cell style.
///
/// Opacities are percentages. A missing `strokeColor` or `fillColor`
/// disables stroking or filling.
pub fn apply_style<C: Canvas + ?Sized>(canvas: &mut C, style: &Style) {
    canvas.set_fill_color(style.color(keys::FILL_COLOR));
    canvas.set_stroke_color(style.color(keys::STROKE_COLOR));
    canvas.set_alpha(style.number(keys::OPACITY, 100.0) / 100.0);
    canvas.set_fill_alpha(style.number(keys::FILL_OPACITY, 100.0) / 100.0);
    canvas.set_stroke_alpha(style.number(keys::STROKE_OPACITY, 100.0) / 100.0);

    canvas.set_dashed(style.flag(keys::DASHED, false), false);
    if let Some(pattern) = style.get(keys::DASH_PATTERN) {
        canvas.set_dash_pattern(pattern);
    }
    canvas.set_shadow(style.flag(keys::SHADOW, false));

    if let Some(color) = style.get(keys::FONT_COLOR) {
        canvas.set_font_color(color);
    }
    if let Some(family) = style.get(keys::FONT_FAMILY) {
        canvas.set_font_family(family);
    }
    canvas.set_font_size(style.number(keys::FONT_SIZE, DEFAULT_FONT_SIZE));
    canvas.set_font_style(style.number(keys::FONT_STYLE, 0.0) as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_to_d() {
        let d = path_to_d(&[
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::LineTo(Point::new(10.0, 0.0)),
            PathSegment::QuadTo {
                control: Point::new(15.0, 5.0),
                end: Point::new(10.0, 10.0),
            },
            PathSegment::Close,
        ]);
        assert_eq!(d, "M0.00 0.00 L10.00 0.00 Q15.00 5.00 10.00 10.00 Z");
    }

    #[test]
    fn test_arc_flags_in_d() {
        let d = path_to_d(&[
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::ArcTo {
                rx: 5.0,
                ry: 5.0,
                angle: 0.0,
                large_arc: false,
                sweep: true,
                end: Point::new(10.0, 0.0),
            },
        ]);
        assert_eq!(d, "M0.00 0.00 A5.00 5.00 0 0 1 10.00 0.00");
    }

    #[test]
    fn test_begin_discards_unpainted_path() {
        let mut state = CanvasState::new();
        state.push_segment(PathSegment::MoveTo(Point::new(0.0, 0.0)));
        state.push_segment(PathSegment::LineTo(Point::new(5.0, 0.0)));
        state.begin();
        assert_eq!(state.take_figure(), None);
    }

    #[test]
    fn test_shorthand_replaces_path() {
        let mut state = CanvasState::new();
        state.push_segment(PathSegment::MoveTo(Point::new(0.0, 0.0)));
        state.set_figure(Figure::Rect(BoundingBox::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(
            state.take_figure(),
            Some(Figure::Rect(BoundingBox::new(0.0, 0.0, 1.0, 1.0)))
        );
        assert_eq!(state.take_figure(), None);
    }

    #[test]
    fn test_restore_to_unwinds() {
        let mut state = CanvasState::new();
        state.save();
        state.frame_mut().stroke_width = 4.0;
        state.save();
        state.frame_mut().stroke_width = 8.0;
        state.restore_to(0);
        assert_eq!(state.depth(), 0);
        assert_eq!(state.frame().stroke_width, 1.0);

        // Unbalanced restore is ignored
        state.restore();
        assert_eq!(state.frame().stroke_width, 1.0);
    }

    #[test]
    fn test_path_figure_bounds_include_controls() {
        let figure = Figure::Path(vec![
            PathSegment::MoveTo(Point::new(0.0, 0.0)),
            PathSegment::QuadTo {
                control: Point::new(5.0, 20.0),
                end: Point::new(10.0, 0.0),
            },
        ]);
        assert_eq!(figure.bounds(), Some(BoundingBox::new(0.0, 0.0, 10.0, 20.0)));
    }

    #[test]
    fn test_apply_style() {
        let mut canvas = RetainedCanvas::new();
        let style = Style::new()
            .with(keys::FILL_COLOR, "#ffffff")
            .with(keys::OPACITY, "50")
            .with(keys::DASHED, "1")
            .with(keys::FONT_SIZE, "14");
        apply_style(&mut canvas, &style);

        let frame = canvas.state().frame();
        assert_eq!(frame.fill_color.as_deref(), Some("#ffffff"));
        assert_eq!(frame.stroke_color, None);
        assert_eq!(frame.alpha, 0.5);
        assert!(frame.dashed);
        assert_eq!(frame.font_size, 14.0);
    }
}
