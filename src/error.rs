//! Errors surfaced by the render pipeline

use thiserror::Error;

use crate::layout::ConfigError;
use crate::model::DocumentError;
use crate::stencil::DescriptorError;
use crate::stylesheet::StylesheetError;

/// Errors that can occur while loading the inputs of a render
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("scene error: {0}")]
    Scene(#[from] DocumentError),

    #[error("stencil error: {0}")]
    Stencil(#[from] DescriptorError),

    #[error("stylesheet error: {0}")]
    Stylesheet(#[from] StylesheetError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl RenderError {
    /// Format the error for a terminal, with source context where the error
    /// carries a position in `source`
    pub fn format(&self, source: &str, filename: &str) -> String {
        match self {
            RenderError::Stencil(err) => err.format(source, filename),
            other => other.to_string(),
        }
    }
}
