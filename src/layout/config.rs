//! Configuration for the layout cache

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a layout configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Size of one background page, unscaled
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageFormat {
    pub width: f64,
    pub height: f64,
}

/// Configuration options for layout computation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// View scale applied to every state
    pub scale: f64,

    /// View translation, in unscaled units
    pub translate_x: f64,
    pub translate_y: f64,

    /// Grid size, also the default loop segment length
    pub grid_size: f64,

    /// Default length of the first and last segment of entity relation routes
    pub entity_segment: f64,

    /// Edge style used for self loops without a `loopStyle`
    pub default_loop_style: String,

    /// Page size used for the background bounds
    pub page_format: Option<PageFormat>,

    /// Scale of the page relative to the diagram
    pub page_scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            grid_size: 10.0,
            entity_segment: 30.0,
            default_loop_style: "loopEdgeStyle".to_string(),
            page_format: None,
            page_scale: 1.0,
        }
    }
}

impl LayoutConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the view scale
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the view translation
    pub fn with_translate(mut self, dx: f64, dy: f64) -> Self {
        self.translate_x = dx;
        self.translate_y = dy;
        self
    }

    /// Set the grid size
    pub fn with_grid_size(mut self, grid_size: f64) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the page format used for background bounds
    pub fn with_page_format(mut self, width: f64, height: f64) -> Self {
        self.page_format = Some(PageFormat { width, height });
        self
    }

    /// Set the default self loop style
    pub fn with_default_loop_style(mut self, name: impl Into<String>) -> Self {
        self.default_loop_style = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::default();
        assert_eq!(config.scale, 1.0);
        assert_eq!(config.grid_size, 10.0);
        assert_eq!(config.entity_segment, 30.0);
        assert_eq!(config.default_loop_style, "loopEdgeStyle");
        assert_eq!(config.page_format, None);
        assert_eq!(config.page_scale, 1.0);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LayoutConfig::new()
            .with_scale(2.0)
            .with_translate(5.0, 7.0)
            .with_page_format(850.0, 1100.0);

        assert_eq!(config.scale, 2.0);
        assert_eq!((config.translate_x, config.translate_y), (5.0, 7.0));
        assert_eq!(
            config.page_format,
            Some(PageFormat {
                width: 850.0,
                height: 1100.0
            })
        );
    }

    #[test]
    fn test_from_toml_keeps_defaults() {
        let config = LayoutConfig::from_str("scale = 1.5\ngrid_size = 20\n").expect("parse");
        assert_eq!(config.scale, 1.5);
        assert_eq!(config.grid_size, 20.0);
        assert_eq!(config.entity_segment, 30.0);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(LayoutConfig::from_str("scale = \"big\"").is_err());
    }
}
