//! Shape descriptors parsed from stencil XML

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::layout::{BoundingBox, ConnectionConstraint, Point};
use crate::style::Direction;

use super::ShapeContext;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Errors raised while loading shape descriptors
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read stencil file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML syntax error at {span:?}: {message}")]
    Syntax { span: Span, message: String },

    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedRoot {
        span: Span,
        expected: &'static str,
        found: String,
    },

    #[error("shape at {span:?} has no name")]
    MissingName { span: Span },

    #[error("duplicate stencil definition: {name}")]
    Duplicate { name: String, span: Span },
}

impl DescriptorError {
    pub(crate) fn from_xml(err: &roxmltree::Error, source: &str) -> Self {
        let pos = err.pos();
        let start = byte_offset(source, pos.row, pos.col);
        DescriptorError::Syntax {
            span: start..(start + 1).min(source.len()).max(start),
            message: err.to_string(),
        }
    }

    /// Source range the error points at, if any
    pub fn span(&self) -> Option<Span> {
        match self {
            DescriptorError::IoError(_) => None,
            DescriptorError::Syntax { span, .. }
            | DescriptorError::UnexpectedRoot { span, .. }
            | DescriptorError::MissingName { span }
            | DescriptorError::Duplicate { span, .. } => Some(span.clone()),
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let Some(span) = self.span() else {
            return self.to_string();
        };
        let message = self.to_string();
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(&message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);
        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => message,
        }
    }
}

/// Byte offset of a 1-based row/column position
fn byte_offset(source: &str, row: u32, col: u32) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(row.saturating_sub(1) as usize)
        .map(str::len)
        .sum();
    let line = &source[line_start.min(source.len())..];
    let column: usize = line
        .chars()
        .take(col.saturating_sub(1) as usize)
        .map(char::len_utf8)
        .sum();
    (line_start + column).min(source.len())
}

/// Element names understood by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Path,
    Move,
    Line,
    Quad,
    Curve,
    Arc,
    Close,
    Rect,
    RoundRect,
    Ellipse,
    Fill,
    Stroke,
    FillStroke,
    Image,
    Text,
    IncludeShape,
    Save,
    Restore,
    StrokeWidth,
    Dashed,
    DashPattern,
    StrokeColor,
    FillColor,
    FontColor,
    FontSize,
    FontFamily,
    FontStyle,
    Alpha,
    FillAlpha,
    StrokeAlpha,
    LineCap,
    LineJoin,
    MiterLimit,
    /// Kept in the tree, skipped when rendering
    Unknown,
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name {
            "path" => Tag::Path,
            "move" => Tag::Move,
            "line" => Tag::Line,
            "quad" => Tag::Quad,
            "curve" => Tag::Curve,
            "arc" => Tag::Arc,
            "close" => Tag::Close,
            "rect" => Tag::Rect,
            "roundrect" => Tag::RoundRect,
            "ellipse" => Tag::Ellipse,
            "fill" => Tag::Fill,
            "stroke" => Tag::Stroke,
            "fillstroke" => Tag::FillStroke,
            "image" => Tag::Image,
            "text" => Tag::Text,
            "include-shape" => Tag::IncludeShape,
            "save" => Tag::Save,
            "restore" => Tag::Restore,
            "strokewidth" => Tag::StrokeWidth,
            "dashed" => Tag::Dashed,
            "dashpattern" => Tag::DashPattern,
            "strokecolor" => Tag::StrokeColor,
            "fillcolor" => Tag::FillColor,
            "fontcolor" => Tag::FontColor,
            "fontsize" => Tag::FontSize,
            "fontfamily" => Tag::FontFamily,
            "fontstyle" => Tag::FontStyle,
            "alpha" => Tag::Alpha,
            "fillalpha" => Tag::FillAlpha,
            "strokealpha" => Tag::StrokeAlpha,
            "linecap" => Tag::LineCap,
            "linejoin" => Tag::LineJoin,
            "miterlimit" => Tag::MiterLimit,
            _ => Tag::Unknown,
        }
    }

    pub fn is_paint(&self) -> bool {
        matches!(self, Tag::Fill | Tag::Stroke | Tag::FillStroke)
    }
}

/// One element of a background or foreground tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: Tag,
    /// Element name as written
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Node {
    fn from_xml(node: roxmltree::Node<'_, '_>) -> Self {
        let name = node.tag_name().name().to_string();
        Self {
            tag: Tag::parse(&name),
            name,
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            children: node
                .children()
                .filter(|child| child.is_element())
                .map(Node::from_xml)
                .collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// How a descriptor fills its target bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aspect {
    /// Stretch independently in x and y
    #[default]
    Variable,
    /// Keep the nominal aspect ratio, centered in the target
    Fixed,
}

/// Initial stroke width of a rendered descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeWidth {
    /// Use the cell's `strokeWidth` style unscaled
    Inherit,
    /// Multiply by the smaller of the two scale factors
    Scaled(f64),
}

/// Origin and per-axis scale mapping descriptor units into target bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFrame {
    pub origin: Point,
    pub sx: f64,
    pub sy: f64,
}

impl AspectFrame {
    pub fn min_scale(&self) -> f64 {
        self.sx.min(self.sy)
    }

    /// Descriptor coordinates to absolute coordinates
    pub fn map(&self, x: f64, y: f64) -> Point {
        Point::new(self.origin.x + x * self.sx, self.origin.y + y * self.sy)
    }
}

/// Computes a missing attribute from the shape being drawn
pub type AttributeCallback = Rc<dyn Fn(&ShapeContext<'_>) -> Option<String>>;

/// A parsed `<shape>` element
#[derive(Clone)]
pub struct Descriptor {
    name: Option<String>,
    w0: f64,
    h0: f64,
    aspect: Aspect,
    stroke_width: StrokeWidth,
    connections: Vec<ConnectionConstraint>,
    background: Vec<Node>,
    foreground: Vec<Node>,
    callbacks: HashMap<(String, String), AttributeCallback>,
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut callbacks: Vec<_> = self.callbacks.keys().collect();
        callbacks.sort();
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("w0", &self.w0)
            .field("h0", &self.h0)
            .field("aspect", &self.aspect)
            .field("stroke_width", &self.stroke_width)
            .field("connections", &self.connections)
            .field("background", &self.background)
            .field("foreground", &self.foreground)
            .field("callbacks", &callbacks)
            .finish()
    }
}

impl Descriptor {
    /// Parse a document whose root element is `<shape>`
    pub fn parse(xml: &str) -> Result<Self, DescriptorError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| DescriptorError::from_xml(&e, xml))?;
        Self::from_node(doc.root_element())
    }

    /// Build a descriptor from a `<shape>` element
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Result<Self, DescriptorError> {
        if node.tag_name().name() != "shape" {
            return Err(DescriptorError::UnexpectedRoot {
                span: node.range(),
                expected: "shape",
                found: node.tag_name().name().to_string(),
            });
        }

        let dimension = |name: &str| {
            node.attribute(name)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(100.0)
        };
        let aspect = match node.attribute("aspect") {
            Some("fixed") => Aspect::Fixed,
            _ => Aspect::Variable,
        };
        let stroke_width = match node.attribute("strokewidth").map(str::trim) {
            Some("inherit") => StrokeWidth::Inherit,
            Some(v) => StrokeWidth::Scaled(v.parse::<f64>().unwrap_or(1.0)),
            None => StrokeWidth::Scaled(1.0),
        };

        let section = |name: &str| -> Vec<Node> {
            node.descendants()
                .find(|n| n.has_tag_name(name))
                .map(|n| {
                    n.children()
                        .filter(|c| c.is_element())
                        .map(Node::from_xml)
                        .collect()
                })
                .unwrap_or_default()
        };

        let connections = node
            .descendants()
            .find(|n| n.has_tag_name("connections"))
            .map(|n| {
                n.children()
                    .filter(|c| c.has_tag_name("constraint"))
                    .map(parse_constraint)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: node.attribute("name").map(str::to_string),
            w0: dimension("w"),
            h0: dimension("h"),
            aspect,
            stroke_width,
            connections,
            background: section("background"),
            foreground: section("foreground"),
            callbacks: HashMap::new(),
        })
    }

    /// Register a callback computing `attribute` of `tag` elements when the
    /// attribute is absent
    pub fn with_callback<F>(mut self, tag: &str, attribute: &str, callback: F) -> Self
    where
        F: Fn(&ShapeContext<'_>) -> Option<String> + 'static,
    {
        self.callbacks
            .insert((tag.to_string(), attribute.to_string()), Rc::new(callback));
        self
    }

    pub fn callback(&self, tag: &str, attribute: &str) -> Option<&AttributeCallback> {
        self.callbacks
            .get(&(tag.to_string(), attribute.to_string()))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Nominal width
    pub fn w0(&self) -> f64 {
        self.w0
    }

    /// Nominal height
    pub fn h0(&self) -> f64 {
        self.h0
    }

    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    pub fn stroke_width(&self) -> StrokeWidth {
        self.stroke_width
    }

    pub fn background(&self) -> &[Node] {
        &self.background
    }

    pub fn foreground(&self) -> &[Node] {
        &self.foreground
    }

    /// Declared connection points, as fractions of the shape bounds
    pub fn connection_points(&self) -> &[ConnectionConstraint] {
        &self.connections
    }

    /// Map descriptor units into `bounds`.
    ///
    /// North and south swap the roles of width and height and shift the
    /// origin so the rotated shape stays centered. Fixed aspect uses the
    /// smaller scale on both axes and centers the result.
    pub fn compute_aspect(&self, bounds: &BoundingBox, direction: Direction) -> AspectFrame {
        let (w, h) = (bounds.width, bounds.height);
        let mut x0 = bounds.x;
        let mut y0 = bounds.y;
        let mut sx = w / self.w0;
        let mut sy = h / self.h0;

        let inverse = direction.is_vertical();
        if inverse {
            sy = w / self.h0;
            sx = h / self.w0;
            let delta = (w - h) / 2.0;
            x0 += delta;
            y0 -= delta;
        }

        if self.aspect == Aspect::Fixed {
            sy = sx.min(sy);
            sx = sy;
            if inverse {
                x0 += (h - self.w0 * sx) / 2.0;
                y0 += (w - self.h0 * sy) / 2.0;
            } else {
                x0 += (w - self.w0 * sx) / 2.0;
                y0 += (h - self.h0 * sy) / 2.0;
            }
        }

        AspectFrame {
            origin: Point::new(x0, y0),
            sx,
            sy,
        }
    }
}

fn parse_constraint(node: roxmltree::Node<'_, '_>) -> ConnectionConstraint {
    let number = |name: &str| {
        node.attribute(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let constraint = ConnectionConstraint::new(
        number("x"),
        number("y"),
        node.attribute("perimeter") == Some("1"),
    );
    match node.attribute("name") {
        Some(name) => constraint.with_name(name),
        None => constraint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DECISION: &str = r#"<shape name="Decision" w="100" h="50" aspect="fixed" strokewidth="inherit">
  <connections>
    <constraint x="0.5" y="0" perimeter="1" name="N"/>
    <constraint x="1" y="0.5" perimeter="0"/>
  </connections>
  <background>
    <path><move x="0" y="25"/><line x="50" y="0"/><line x="100" y="25"/><line x="50" y="50"/><close/></path>
  </background>
  <foreground>
    <fillstroke/>
    <sparkle/>
  </foreground>
</shape>"#;

    #[test]
    fn test_parse_header() {
        let d = Descriptor::parse(DECISION).expect("parse");
        assert_eq!(d.name(), Some("Decision"));
        assert_eq!((d.w0(), d.h0()), (100.0, 50.0));
        assert_eq!(d.aspect(), Aspect::Fixed);
        assert_eq!(d.stroke_width(), StrokeWidth::Inherit);
    }

    #[test]
    fn test_defaults() {
        let d = Descriptor::parse("<shape/>").expect("parse");
        assert_eq!((d.w0(), d.h0()), (100.0, 100.0));
        assert_eq!(d.aspect(), Aspect::Variable);
        assert_eq!(d.stroke_width(), StrokeWidth::Scaled(1.0));
        assert!(d.background().is_empty());
        assert!(d.connection_points().is_empty());
    }

    #[test]
    fn test_non_positive_size_falls_back() {
        let d = Descriptor::parse(r#"<shape w="0" h="-5"/>"#).expect("parse");
        assert_eq!((d.w0(), d.h0()), (100.0, 100.0));
        let frame = d.compute_aspect(&BoundingBox::new(0.0, 0.0, 100.0, 50.0), Direction::East);
        assert_eq!((frame.sx, frame.sy), (1.0, 0.5));
    }

    #[test]
    fn test_connection_points() {
        let d = Descriptor::parse(DECISION).expect("parse");
        let points = d.connection_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].point, Point::new(0.5, 0.0));
        assert!(points[0].perimeter);
        assert_eq!(points[0].name.as_deref(), Some("N"));
        assert!(!points[1].perimeter);
    }

    #[test]
    fn test_unknown_tags_are_kept() {
        let d = Descriptor::parse(DECISION).expect("parse");
        let tags: Vec<Tag> = d.foreground().iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec![Tag::FillStroke, Tag::Unknown]);
        assert_eq!(d.foreground()[1].name, "sparkle");
        assert_eq!(d.background()[0].children.len(), 5);
    }

    #[test]
    fn test_fixed_aspect_centers() {
        let d = Descriptor::parse(DECISION).expect("parse");
        let frame = d.compute_aspect(&BoundingBox::new(0.0, 0.0, 40.0, 40.0), Direction::East);
        assert_eq!(frame.sx, 0.4);
        assert_eq!(frame.sy, 0.4);
        assert_eq!(frame.origin, Point::new(0.0, 10.0));
    }

    #[test]
    fn test_vertical_direction_swaps_scales() {
        let d = Descriptor::parse(r#"<shape w="100" h="50"/>"#).expect("parse");
        let frame = d.compute_aspect(&BoundingBox::new(0.0, 0.0, 100.0, 50.0), Direction::South);
        assert_eq!(frame.sx, 0.5);
        assert_eq!(frame.sy, 2.0);
        assert_eq!(frame.origin, Point::new(25.0, -25.0));
    }

    #[test]
    fn test_wrong_root() {
        let err = Descriptor::parse("<shapes/>").unwrap_err();
        assert!(matches!(err, DescriptorError::UnexpectedRoot { .. }));
    }

    #[test]
    fn test_syntax_error_report() {
        let source = "<shape>\n  <path>\n</shape>";
        let err = Descriptor::parse(source).unwrap_err();
        assert!(matches!(err, DescriptorError::Syntax { .. }));
        let report = err.format(source, "broken.xml");
        assert!(report.contains("broken.xml"));
    }

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset("ab\ncd", 2, 2), 4);
        assert_eq!(byte_offset("ab", 9, 9), 2);
    }
}
