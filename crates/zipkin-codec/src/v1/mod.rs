//! The legacy span shape: numeric ids, endpoint-carrying annotations, and
//! typed binary annotations in place of tags and remote endpoints.

mod from_v2;
mod to_v2;

pub use to_v2::convert;

use crate::model::Endpoint;

pub const CLIENT_SEND: &str = "cs";
pub const CLIENT_RECV: &str = "cr";
pub const SERVER_SEND: &str = "ss";
pub const SERVER_RECV: &str = "sr";
pub const MESSAGE_SEND: &str = "ms";
pub const MESSAGE_RECV: &str = "mr";
pub const WIRE_SEND: &str = "ws";
pub const WIRE_RECV: &str = "wr";

pub const CLIENT_ADDR: &str = "ca";
pub const SERVER_ADDR: &str = "sa";
pub const MESSAGE_ADDR: &str = "ma";

/// Marks a span as local and carries its endpoint when nothing else does.
pub const LOCAL_COMPONENT: &str = "lc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1Annotation {
    pub timestamp: u64,
    pub value: String,
    pub endpoint: Option<Endpoint>,
}

impl V1Annotation {
    /// An empty endpoint is dropped.
    pub fn new(timestamp: u64, value: impl Into<String>, endpoint: Option<Endpoint>) -> Self {
        Self {
            timestamp,
            value: value.into(),
            endpoint: endpoint.filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryValue {
    Bool(bool),
    String(String),
}

impl BinaryValue {
    pub const TYPE_BOOL: i32 = 0;
    pub const TYPE_STRING: i32 = 6;

    pub fn type_code(&self) -> i32 {
        match self {
            BinaryValue::Bool(_) => Self::TYPE_BOOL,
            BinaryValue::String(_) => Self::TYPE_STRING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1BinaryAnnotation {
    pub key: String,
    pub value: BinaryValue,
    pub endpoint: Option<Endpoint>,
}

impl V1BinaryAnnotation {
    pub fn string(key: impl Into<String>, value: impl Into<String>, endpoint: Option<Endpoint>) -> Self {
        Self {
            key: key.into(),
            value: BinaryValue::String(value.into()),
            endpoint: endpoint.filter(|e| !e.is_empty()),
        }
    }

    pub fn bool(key: impl Into<String>, value: bool, endpoint: Option<Endpoint>) -> Self {
        Self {
            key: key.into(),
            value: BinaryValue::Bool(value),
            endpoint: endpoint.filter(|e| !e.is_empty()),
        }
    }

    /// An address annotation, or `None` when there is no endpoint to point at.
    pub fn address(key: impl Into<String>, endpoint: Option<Endpoint>) -> Option<Self> {
        let endpoint = endpoint.filter(|e| !e.is_empty())?;
        Some(Self::bool(key, true, Some(endpoint)))
    }
}

/// A legacy span. Zero means absent for ids, timestamp and duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V1Span {
    pub trace_id_high: u64,
    pub trace_id: u64,
    pub id: u64,
    pub parent_id: u64,
    /// Empty when unknown.
    pub name: String,
    pub timestamp: u64,
    pub duration: u64,
    pub annotations: Vec<V1Annotation>,
    pub binary_annotations: Vec<V1BinaryAnnotation>,
    pub debug: bool,
}

impl V1Span {
    /// The trace id as 16 or 32 lower-hex characters.
    pub fn trace_id_hex(&self) -> String {
        if self.trace_id_high != 0 {
            format!("{:016x}{:016x}", self.trace_id_high, self.trace_id)
        } else {
            format!("{:016x}", self.trace_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoints_are_dropped() {
        let annotation = V1Annotation::new(1, "foo", Some(Endpoint::default()));
        assert_eq!(annotation.endpoint, None);

        let binary = V1BinaryAnnotation::string("k", "v", Some(Endpoint::default()));
        assert_eq!(binary.endpoint, None);
    }

    #[test]
    fn test_address_needs_endpoint() {
        assert_eq!(V1BinaryAnnotation::address(SERVER_ADDR, None), None);
        assert_eq!(V1BinaryAnnotation::address(SERVER_ADDR, Some(Endpoint::default())), None);
    }

    #[test]
    fn test_trace_id_hex() {
        let mut span = V1Span {
            trace_id: 0xa,
            ..Default::default()
        };
        assert_eq!(span.trace_id_hex(), "000000000000000a");
        span.trace_id_high = 1;
        assert_eq!(span.trace_id_hex(), "0000000000000001000000000000000a");
    }
}
