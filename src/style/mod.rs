//! Resolved cell styles
//!
//! A [`Style`] is the flat key/value map a cell ends up with after its style
//! string has been applied on top of the stylesheet defaults. Lookups never
//! fail: every accessor takes the documented default for a missing or
//! malformed value.

pub mod lexer;

use std::collections::BTreeMap;

pub use lexer::{parse_style, ParsedStyle, StyleEntry};

/// Style keys understood by the layout cache, the renderer and the
/// stencil interpreter.
pub mod keys {
    pub const SHAPE: &str = "shape";
    pub const PERIMETER: &str = "perimeter";
    pub const PERIMETER_SPACING: &str = "perimeterSpacing";
    pub const SOURCE_PERIMETER_SPACING: &str = "sourcePerimeterSpacing";
    pub const TARGET_PERIMETER_SPACING: &str = "targetPerimeterSpacing";
    pub const ROTATION: &str = "rotation";
    pub const FLIP_H: &str = "flipH";
    pub const FLIP_V: &str = "flipV";
    pub const DIRECTION: &str = "direction";
    pub const EDGE: &str = "edgeStyle";
    pub const LOOP: &str = "loopStyle";
    pub const NO_EDGE_STYLE: &str = "noEdgeStyle";
    pub const ORTHOGONAL: &str = "orthogonal";
    pub const ELBOW: &str = "elbow";
    pub const SEGMENT: &str = "segment";
    pub const ROUTING_CENTER_X: &str = "routingCenterX";
    pub const ROUTING_CENTER_Y: &str = "routingCenterY";
    pub const LABEL_POSITION: &str = "labelPosition";
    pub const VERTICAL_LABEL_POSITION: &str = "verticalLabelPosition";
    pub const LABEL_WIDTH: &str = "labelWidth";
    pub const ALIGN: &str = "align";
    pub const VERTICAL_ALIGN: &str = "verticalAlign";
    pub const EXIT_X: &str = "exitX";
    pub const EXIT_Y: &str = "exitY";
    pub const EXIT_DX: &str = "exitDx";
    pub const EXIT_DY: &str = "exitDy";
    pub const EXIT_PERIMETER: &str = "exitPerimeter";
    pub const ENTRY_X: &str = "entryX";
    pub const ENTRY_Y: &str = "entryY";
    pub const ENTRY_DX: &str = "entryDx";
    pub const ENTRY_DY: &str = "entryDy";
    pub const ENTRY_PERIMETER: &str = "entryPerimeter";
    pub const FILL_COLOR: &str = "fillColor";
    pub const STROKE_COLOR: &str = "strokeColor";
    pub const STROKE_WIDTH: &str = "strokeWidth";
    pub const DASHED: &str = "dashed";
    pub const DASH_PATTERN: &str = "dashPattern";
    pub const OPACITY: &str = "opacity";
    pub const FILL_OPACITY: &str = "fillOpacity";
    pub const STROKE_OPACITY: &str = "strokeOpacity";
    pub const SHADOW: &str = "shadow";
    pub const FONT_COLOR: &str = "fontColor";
    pub const FONT_SIZE: &str = "fontSize";
    pub const FONT_FAMILY: &str = "fontFamily";
    pub const FONT_STYLE: &str = "fontStyle";
    pub const ROUNDED: &str = "rounded";
    pub const ARC_SIZE: &str = "arcSize";
    pub const IMAGE: &str = "image";
    pub const END_ARROW: &str = "endArrow";
    pub const START_ARROW: &str = "startArrow";
    pub const ANCHOR_POINT_DIRECTION: &str = "anchorPointDirection";
}

/// Shape names with built-in perimeters and renderers
pub mod shapes {
    pub const RECTANGLE: &str = "rectangle";
    pub const ELLIPSE: &str = "ellipse";
    pub const RHOMBUS: &str = "rhombus";
    pub const TRIANGLE: &str = "triangle";
    pub const CONNECTOR: &str = "connector";
}

/// Default font size in points
pub const DEFAULT_FONT_SIZE: f64 = 11.0;
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";

/// Orientation of a shape, clockwise from east
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    East,
    South,
    West,
    North,
}

impl Direction {
    /// Parse a `direction` style value, falling back to east
    pub fn parse(value: &str) -> Self {
        match value {
            "south" => Direction::South,
            "west" => Direction::West,
            "north" => Direction::North,
            _ => Direction::East,
        }
    }

    /// Clockwise rotation relative to east in degrees
    pub fn angle(&self) -> f64 {
        match self {
            Direction::East => 0.0,
            Direction::South => 90.0,
            Direction::West => 180.0,
            Direction::North => 270.0,
        }
    }

    /// North and south swap the roles of width and height
    pub fn is_vertical(&self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }
}

/// A resolved key/value style map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    entries: BTreeMap<String, String>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Copy every entry of `other` over this style
    pub fn merge(&mut self, other: &Style) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// String value or a default
    pub fn string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Numeric value; missing or malformed values read as `default`
    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    /// Boolean flag stored as `1`/`0` (or `true`/`false`)
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::trim) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    pub fn direction(&self) -> Direction {
        self.get(keys::DIRECTION)
            .map(Direction::parse)
            .unwrap_or_default()
    }

    /// Color value, treating `none` as absent
    pub fn color(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|c| *c != "none")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Style {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_defaults() {
        let style = Style::new().with(keys::ROTATION, "30").with("bad", "x1");
        assert_eq!(style.number(keys::ROTATION, 0.0), 30.0);
        assert_eq!(style.number("bad", 7.0), 7.0);
        assert_eq!(style.number("missing", 2.5), 2.5);
    }

    #[test]
    fn test_flags() {
        let style = Style::new().with(keys::FLIP_H, "1").with(keys::FLIP_V, "0");
        assert!(style.flag(keys::FLIP_H, false));
        assert!(!style.flag(keys::FLIP_V, true));
        assert!(style.flag(keys::SHADOW, true));
    }

    #[test]
    fn test_direction() {
        assert_eq!(Style::new().direction(), Direction::East);
        let style = Style::new().with(keys::DIRECTION, "north");
        assert_eq!(style.direction(), Direction::North);
        assert_eq!(style.direction().angle(), 270.0);
        assert!(style.direction().is_vertical());
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Style::new().with("a", "1").with("b", "2");
        base.merge(&Style::new().with("b", "3"));
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
    }

    #[test]
    fn test_color_none_is_absent() {
        let style = Style::new().with(keys::FILL_COLOR, "none");
        assert_eq!(style.color(keys::FILL_COLOR), None);
    }
}
