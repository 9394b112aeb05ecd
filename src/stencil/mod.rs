//! Shape descriptors and their interpreter
//!
//! A stencil is an XML `<shape>` describing a vector drawing in its own
//! nominal coordinate space. [`Descriptor`] holds the parsed trees,
//! [`StencilRegistry`] names them, and [`Interpreter`] replays them onto any
//! [`Canvas`](crate::canvas::Canvas) scaled into target bounds.

pub mod descriptor;
pub mod interpreter;
pub mod registry;

pub use descriptor::{
    Aspect, AspectFrame, AttributeCallback, Descriptor, DescriptorError, Node, StrokeWidth, Tag,
};
pub use interpreter::{Interpreter, ShapeContext, MAX_INCLUDE_DEPTH};
pub use registry::StencilRegistry;
