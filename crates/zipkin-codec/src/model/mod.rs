//! The span data model. Every value is immutable once built.

mod dependency;
mod endpoint;
pub mod ids;
mod span;

pub use dependency::{Dependencies, DependencyLink, DependencyLinkBuilder};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use span::{Annotation, Kind, Span, SpanBuilder};
