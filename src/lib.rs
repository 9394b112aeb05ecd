//! cellview - incremental diagram layout and stencil rendering
//!
//! The crate resolves a hierarchical diagram model into cached absolute
//! geometry ([`LayoutCache`]), routes its edges, and draws the result
//! through XML shape descriptors ([`stencil`]) onto an abstract [`Canvas`].
//!
//! # Example
//!
//! ```rust
//! use cellview::render;
//!
//! let svg = render(r#"
//! [[cell]]
//! id = "a"
//! value = "Start"
//! geometry = { x = 0, y = 0, width = 80, height = 40 }
//! "#).unwrap();
//! assert!(svg.contains("<svg"));
//! ```

pub mod canvas;
pub mod error;
pub mod layout;
pub mod model;
pub mod renderer;
pub mod stencil;
pub mod style;
pub mod stylesheet;

use std::rc::Rc;

use log::debug;

pub use canvas::{Canvas, RetainedCanvas, SvgCanvas};
pub use error::RenderError;
pub use layout::{BoundingBox, CellState, LayoutCache, LayoutConfig, Point};
pub use model::{CellId, DiagramModel, Geometry, GraphModel, SceneDocument};
pub use renderer::{render_svg, DiagramRenderer, SvgConfig};
pub use stencil::{Descriptor, Interpreter, ShapeContext, StencilRegistry};
pub use style::Style;
pub use stylesheet::Stylesheet;

/// Configuration for the complete render pipeline
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Layout configuration
    pub layout: LayoutConfig,
    /// SVG output configuration
    pub svg: SvgConfig,
    /// Stylesheet used to resolve cell styles
    pub stylesheet: Stylesheet,
    /// Stencils available to `shape=<name>`
    pub stencils: Rc<StencilRegistry>,
}

impl RenderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layout configuration
    pub fn with_layout(mut self, config: LayoutConfig) -> Self {
        self.layout = config;
        self
    }

    /// Set the SVG configuration
    pub fn with_svg(mut self, config: SvgConfig) -> Self {
        self.svg = config;
        self
    }

    /// Set the stylesheet
    pub fn with_stylesheet(mut self, stylesheet: Stylesheet) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    /// Set the stencil registry
    pub fn with_stencils(mut self, stencils: StencilRegistry) -> Self {
        self.stencils = Rc::new(stencils);
        self
    }
}

/// Render a TOML scene to SVG with default configuration
pub fn render(scene: &str) -> Result<String, RenderError> {
    render_with_config(scene, RenderConfig::default())
}

/// Render a TOML scene to SVG with custom configuration
///
/// # Example
///
/// ```rust
/// use cellview::{render_with_config, LayoutConfig, RenderConfig, SvgConfig};
///
/// let config = RenderConfig::new()
///     .with_layout(LayoutConfig::default().with_scale(2.0))
///     .with_svg(SvgConfig::default().with_viewbox_padding(10.0));
///
/// let scene = r#"
/// [[cell]]
/// id = "a"
/// geometry = { x = 0, y = 0, width = 40, height = 40 }
/// "#;
/// let svg = render_with_config(scene, config).unwrap();
/// assert!(svg.contains(r#"width="80""#));
/// ```
pub fn render_with_config(scene: &str, config: RenderConfig) -> Result<String, RenderError> {
    let document = SceneDocument::from_str(scene)?;
    let mut cache = LayoutCache::new(config.layout)
        .with_stylesheet(config.stylesheet)
        .with_stencils(config.stencils);
    cache.validate(&document.model);
    debug!(states = cache.states().count(); "scene validated");
    Ok(render_svg(&document.model, &cache, &config.svg))
}
