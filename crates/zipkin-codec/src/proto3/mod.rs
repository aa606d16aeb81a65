//! Proto3 field primitives and the span layout built on them.

pub mod fields;
mod span;

pub use span::{Proto3SpanWriter, Repeated};
pub(crate) use span::read_spans;
