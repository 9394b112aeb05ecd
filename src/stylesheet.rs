//! Stylesheets: default and named cell styles
//!
//! A cell's style string is resolved against a stylesheet: the default
//! vertex or edge style first, then each named style and assignment of the
//! string in order. Stylesheets can be loaded from TOML:
//!
//! ```toml
//! [metadata]
//! name = "Blueprint"
//!
//! [default-vertex]
//! fillColor = "#dae8fc"
//!
//! [styles.decision]
//! shape = "rhombus"
//! perimeter = "rhombusPerimeter"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::style::{keys, parse_style, shapes, Style, StyleEntry};

/// Errors that can occur when loading or parsing stylesheets
#[derive(Error, Debug)]
pub enum StylesheetError {
    #[error("Failed to read stylesheet file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse stylesheet TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Default and named styles used to resolve cell style strings
#[derive(Debug, Clone)]
pub struct Stylesheet {
    /// Optional name for the stylesheet
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    pub default_vertex: Style,
    pub default_edge: Style,
    styles: HashMap<String, Style>,
}

/// TOML structure for deserializing stylesheets
#[derive(Deserialize)]
struct TomlStylesheet {
    metadata: Option<TomlMetadata>,
    #[serde(rename = "default-vertex", default)]
    default_vertex: HashMap<String, toml::Value>,
    #[serde(rename = "default-edge", default)]
    default_edge: HashMap<String, toml::Value>,
    #[serde(default)]
    styles: HashMap<String, HashMap<String, toml::Value>>,
}

#[derive(Deserialize)]
struct TomlMetadata {
    name: Option<String>,
    description: Option<String>,
}

fn toml_style(table: HashMap<String, toml::Value>) -> Style {
    table
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Boolean(b) => String::from(if b { "1" } else { "0" }),
                other => other.to_string(),
            };
            (key, text)
        })
        .collect()
}

impl Stylesheet {
    /// Load stylesheet from TOML file
    pub fn from_file(path: &Path) -> Result<Self, StylesheetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load stylesheet from TOML string.
    ///
    /// Default tables are merged over the built-in defaults.
    pub fn from_str(content: &str) -> Result<Self, StylesheetError> {
        let parsed: TomlStylesheet = toml::from_str(content)?;

        let mut sheet = Stylesheet::default();
        sheet.name = parsed.metadata.as_ref().and_then(|m| m.name.clone());
        sheet.description = parsed.metadata.as_ref().and_then(|m| m.description.clone());
        sheet.default_vertex.merge(&toml_style(parsed.default_vertex));
        sheet.default_edge.merge(&toml_style(parsed.default_edge));
        for (name, table) in parsed.styles {
            sheet.styles.insert(name, toml_style(table));
        }
        Ok(sheet)
    }

    /// Register or replace a named style
    pub fn put_style(&mut self, name: &str, style: Style) {
        self.styles.insert(name.to_string(), style);
    }

    pub fn named(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// Resolve a cell style string into a flat style.
    ///
    /// Unknown named styles are ignored.
    pub fn resolve(&self, style: &str, is_edge: bool) -> Style {
        let parsed = parse_style(style);
        let mut resolved = if parsed.inherit_defaults {
            if is_edge {
                self.default_edge.clone()
            } else {
                self.default_vertex.clone()
            }
        } else {
            Style::new()
        };

        for entry in &parsed.entries {
            match entry {
                StyleEntry::Named(name) => {
                    if let Some(named) = self.styles.get(name) {
                        resolved.merge(named);
                    }
                }
                StyleEntry::Set(key, value) => resolved.set(key, value.as_str()),
                StyleEntry::Remove(key) => resolved.remove(key),
            }
        }
        resolved
    }
}

impl Default for Stylesheet {
    fn default() -> Self {
        let default_vertex = Style::new()
            .with(keys::SHAPE, shapes::RECTANGLE)
            .with(keys::PERIMETER, "rectanglePerimeter")
            .with(keys::VERTICAL_ALIGN, "middle")
            .with(keys::ALIGN, "center")
            .with(keys::FILL_COLOR, "#C3D9FF")
            .with(keys::STROKE_COLOR, "#6482B9")
            .with(keys::FONT_COLOR, "#774400");
        let default_edge = Style::new()
            .with(keys::SHAPE, shapes::CONNECTOR)
            .with(keys::END_ARROW, "classic")
            .with(keys::VERTICAL_ALIGN, "middle")
            .with(keys::ALIGN, "center")
            .with(keys::STROKE_COLOR, "#6482B9")
            .with(keys::FONT_COLOR, "#446299");

        Self {
            name: None,
            description: None,
            default_vertex,
            default_edge,
            styles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stylesheet() {
        let stylesheet = Stylesheet::default();
        assert_eq!(stylesheet.default_vertex.get(keys::SHAPE), Some("rectangle"));
        assert_eq!(stylesheet.default_edge.get(keys::SHAPE), Some("connector"));
    }

    #[test]
    fn test_resolve_applies_entries_in_order() {
        let mut sheet = Stylesheet::default();
        sheet.put_style("warm", Style::new().with(keys::FILL_COLOR, "#ffcc00"));
        let style = sheet.resolve("fillColor=#000;warm", false);
        assert_eq!(style.get(keys::FILL_COLOR), Some("#ffcc00"));
        let style = sheet.resolve("warm;fillColor=#000", false);
        assert_eq!(style.get(keys::FILL_COLOR), Some("#000"));
    }

    #[test]
    fn test_resolve_none_removes_key() {
        let sheet = Stylesheet::default();
        let style = sheet.resolve("strokeColor=none", false);
        assert!(!style.contains(keys::STROKE_COLOR));
    }

    #[test]
    fn test_resolve_without_defaults() {
        let sheet = Stylesheet::default();
        let style = sheet.resolve(";shape=ellipse", false);
        assert_eq!(style.get(keys::SHAPE), Some("ellipse"));
        assert!(!style.contains(keys::PERIMETER));
    }

    #[test]
    fn test_resolve_unknown_named_style() {
        let sheet = Stylesheet::default();
        let style = sheet.resolve("doesNotExist", true);
        assert_eq!(style, sheet.default_edge);
    }

    #[test]
    fn test_parse_toml_with_metadata() {
        let toml_str = r##"
[metadata]
name = "Test Theme"
description = "A test theme"

[default-vertex]
fillColor = "#000000"
rounded = true

[styles.decision]
shape = "rhombus"
perimeter = "rhombusPerimeter"
arcSize = 12
"##;
        let stylesheet = Stylesheet::from_str(toml_str).expect("Should parse");
        assert_eq!(stylesheet.name, Some("Test Theme".to_string()));
        assert_eq!(stylesheet.description, Some("A test theme".to_string()));
        assert_eq!(stylesheet.default_vertex.get(keys::FILL_COLOR), Some("#000000"));
        assert_eq!(stylesheet.default_vertex.get(keys::ROUNDED), Some("1"));
        assert_eq!(stylesheet.default_vertex.get(keys::SHAPE), Some("rectangle"));

        let decision = stylesheet.named("decision").expect("named style");
        assert_eq!(decision.get(keys::SHAPE), Some("rhombus"));
        assert_eq!(decision.number(keys::ARC_SIZE, 0.0), 12.0);
    }

    #[test]
    fn test_parse_toml_without_metadata() {
        let stylesheet = Stylesheet::from_str("[default-edge]\nstrokeColor = \"#111111\"\n")
            .expect("Should parse");
        assert_eq!(stylesheet.name, None);
        assert_eq!(stylesheet.default_edge.get(keys::STROKE_COLOR), Some("#111111"));
    }

    #[test]
    fn test_invalid_toml_error() {
        let result = Stylesheet::from_str("this is not valid toml {{{{");
        assert!(result.is_err());
    }
}
