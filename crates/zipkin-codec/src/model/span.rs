use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::model::ids;
use crate::model::Endpoint;

/// The role of a span in an RPC or messaging exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Client,
    Server,
    Producer,
    Consumer,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Client => "CLIENT",
            Kind::Server => "SERVER",
            Kind::Producer => "PRODUCER",
            Kind::Consumer => "CONSUMER",
        }
    }
}

impl FromStr for Kind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIENT" => Ok(Kind::Client),
            "SERVER" => Ok(Kind::Server),
            "PRODUCER" => Ok(Kind::Producer),
            "CONSUMER" => Ok(Kind::Consumer),
            other => Err(CodecError::invalid_argument(format!("unknown kind {other}"))),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event at a point in time, in epoch microseconds.
///
/// Orders by timestamp, then value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Annotation {
    timestamp: u64,
    value: String,
}

impl Annotation {
    pub fn new(timestamp: u64, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Annotation{{timestamp={}, value={}}}", self.timestamp, self.value)
    }
}

/// A timed operation in a trace.
///
/// Built once via [`SpanBuilder`], which validates and normalizes identifiers.
/// `trace_id` is 16 or 32 lower-hex characters; `id` and `parent_id` are 16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    trace_id: String,
    parent_id: Option<String>,
    id: String,
    kind: Option<Kind>,
    name: Option<String>,
    timestamp: Option<u64>,
    duration: Option<u64>,
    local_endpoint: Option<Endpoint>,
    remote_endpoint: Option<Endpoint>,
    annotations: Vec<Annotation>,
    tags: BTreeMap<String, String>,
    debug: bool,
    shared: bool,
}

impl Span {
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    pub fn to_builder(&self) -> SpanBuilder {
        SpanBuilder {
            trace_id: Some(self.trace_id.clone()),
            parent_id: self.parent_id.clone(),
            id: Some(self.id.clone()),
            kind: self.kind,
            name: self.name.clone(),
            timestamp: self.timestamp,
            duration: self.duration,
            local_endpoint: self.local_endpoint.clone(),
            remote_endpoint: self.remote_endpoint.clone(),
            annotations: self.annotations.clone(),
            tags: self.tags.clone(),
            debug: self.debug,
            shared: self.shared,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// The high 64 bits of a 128-bit trace id, or 0.
    pub fn trace_id_high(&self) -> u64 {
        if self.trace_id.len() == 32 {
            ids::parse_lower_hex(&self.trace_id[..16]).unwrap_or(0)
        } else {
            0
        }
    }

    pub fn trace_id_low(&self) -> u64 {
        let start = self.trace_id.len() - 16;
        ids::parse_lower_hex(&self.trace_id[start..]).unwrap_or(0)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// The parent id as a number, or 0 for a root span.
    pub fn parent_id_u64(&self) -> u64 {
        self.parent_id
            .as_deref()
            .and_then(ids::parse_lower_hex)
            .unwrap_or(0)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_u64(&self) -> u64 {
        ids::parse_lower_hex(&self.id).unwrap_or(0)
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Epoch microseconds of the start of this span.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Microseconds of the critical path, if known.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn local_endpoint(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }

    pub fn local_service_name(&self) -> Option<&str> {
        self.local_endpoint.as_ref().and_then(Endpoint::service_name)
    }

    pub fn remote_endpoint(&self) -> Option<&Endpoint> {
        self.remote_endpoint.as_ref()
    }

    pub fn remote_service_name(&self) -> Option<&str> {
        self.remote_endpoint.as_ref().and_then(Endpoint::service_name)
    }

    /// Sorted by timestamp, then value.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn shared(&self) -> bool {
        self.shared
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = crate::buffer::write_exact(&crate::json::V2SpanWriter, self, "json");
        f.write_str(&String::from_utf8_lossy(&json))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanBuilder {
    pub(crate) trace_id: Option<String>,
    pub(crate) parent_id: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) kind: Option<Kind>,
    pub(crate) name: Option<String>,
    pub(crate) timestamp: Option<u64>,
    pub(crate) duration: Option<u64>,
    pub(crate) local_endpoint: Option<Endpoint>,
    pub(crate) remote_endpoint: Option<Endpoint>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) debug: bool,
    pub(crate) shared: bool,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn trace_id_u128(mut self, high: u64, low: u64) -> Self {
        self.trace_id = Some(if high == 0 {
            ids::to_lower_hex(low)
        } else {
            format!("{high:016x}{low:016x}")
        });
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Zero means no parent.
    pub fn parent_id_u64(mut self, parent_id: u64) -> Self {
        self.parent_id = (parent_id != 0).then(|| ids::to_lower_hex(parent_id));
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id_u64(mut self, id: u64) -> Self {
        self.id = Some(ids::to_lower_hex(id));
        self
    }

    pub fn kind(mut self, kind: impl Into<Option<Kind>>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Zero means unknown.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = (timestamp != 0).then_some(timestamp);
        self
    }

    /// Zero means unknown.
    pub fn duration(mut self, duration: u64) -> Self {
        self.duration = (duration != 0).then_some(duration);
        self
    }

    pub fn local_endpoint(mut self, endpoint: impl Into<Option<Endpoint>>) -> Self {
        self.local_endpoint = endpoint.into();
        self
    }

    pub fn remote_endpoint(mut self, endpoint: impl Into<Option<Endpoint>>) -> Self {
        self.remote_endpoint = endpoint.into();
        self
    }

    pub fn add_annotation(mut self, timestamp: u64, value: impl Into<String>) -> Self {
        self.annotations.push(Annotation::new(timestamp, value));
        self
    }

    pub fn clear_annotations(mut self) -> Self {
        self.annotations.clear();
        self
    }

    pub fn put_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn clear_tags(mut self) -> Self {
        self.tags.clear();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Validates identifiers and snapshots the builder into a [`Span`].
    pub fn build(self) -> Result<Span, CodecError> {
        let (trace_id, id) = match (&self.trace_id, &self.id) {
            (Some(trace_id), Some(id)) => (trace_id, id),
            (None, Some(_)) => return Err(CodecError::invalid_argument("Missing: traceId")),
            (Some(_), None) => return Err(CodecError::invalid_argument("Missing: id")),
            (None, None) => return Err(CodecError::invalid_argument("Missing: traceId id")),
        };
        let trace_id = ids::normalize_trace_id(trace_id)?;
        let id = ids::normalize_span_id(id, "id")?;
        let parent_id = match &self.parent_id {
            Some(parent_id) => ids::normalize_parent_id(parent_id)?,
            None => None,
        };

        let mut annotations = self.annotations;
        annotations.sort();
        annotations.dedup();

        Ok(Span {
            trace_id,
            parent_id,
            id,
            kind: self.kind,
            name: self.name.filter(|name| !name.is_empty()),
            timestamp: self.timestamp.filter(|t| *t != 0),
            duration: self.duration.filter(|d| *d != 0),
            local_endpoint: self.local_endpoint.filter(|e| !e.is_empty()),
            remote_endpoint: self.remote_endpoint.filter(|e| !e.is_empty()),
            annotations,
            tags: self.tags,
            debug: self.debug,
            shared: self.shared,
        })
    }
}
