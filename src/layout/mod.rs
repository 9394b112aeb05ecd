//! Incremental layout cache and edge router
//!
//! [`LayoutCache`] turns a [`DiagramModel`](crate::model::DiagramModel) plus
//! a view transform into cached absolute geometry. Cells are marked dirty
//! with [`LayoutCache::invalidate`] and recomputed top-down by a single
//! [`LayoutCache::validate`] pass; edges are routed through the perimeter,
//! constraint and edge-style registries in the submodules.

pub mod cache;
pub mod config;
pub mod constraint;
pub mod perimeter;
pub mod routing;
pub mod transform;
pub mod types;

pub use cache::LayoutCache;
pub use config::{ConfigError, LayoutConfig, PageFormat};
pub use constraint::{
    ConnectionConstraint, ConstraintResolver, NoConstraints, StyleConstraintResolver,
};
pub use perimeter::{PerimeterFn, PerimeterRegistry};
pub use routing::{EdgeStyle, EdgeStyleFn, EdgeStyleRegistry, RouteContext, RouteTerminal};
pub use transform::RotationTransform;
pub use types::*;
