//! SVG output options

/// How [`SvgCanvas`](crate::canvas::SvgCanvas) writes its document
#[derive(Debug, Clone, PartialEq)]
pub struct SvgConfig {
    /// Margin added on every side of the drawn bounds
    pub viewbox_padding: f64,
    /// Emit the `<?xml ...?>` declaration
    pub standalone: bool,
    /// One element per line, indented by group depth
    pub pretty_print: bool,
    /// Prepended to every class and filter id; empty for none
    pub class_prefix: String,
    /// Inline local image files as base64 data URIs
    pub embed_images: bool,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            viewbox_padding: 60.0,
            standalone: true,
            pretty_print: true,
            class_prefix: "cv-".to_string(),
            embed_images: false,
        }
    }
}

impl SvgConfig {
    pub fn with_viewbox_padding(mut self, padding: f64) -> Self {
        self.viewbox_padding = padding;
        self
    }

    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_embed_images(mut self, embed: bool) -> Self {
        self.embed_images = embed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_leave_prefix() {
        let config = SvgConfig::default()
            .with_viewbox_padding(0.0)
            .with_standalone(false)
            .with_pretty_print(false)
            .with_embed_images(true);
        assert_eq!(config.class_prefix, "cv-");
        assert!(!config.standalone && !config.pretty_print && config.embed_images);
        assert_eq!(config.viewbox_padding, 0.0);
    }
}
