//! The `zipkin.proto3` span layout.
//!
//! A list of spans is the repeated field 1 of `ListOfSpans`, so one encoded
//! span is byte-identical to a list holding only that span.

use crate::buffer::{ReadBuffer, WriteBuffer, Writer};
use crate::error::CodecError;
use crate::model::{Annotation, Endpoint, Kind, Span, SpanBuilder};
use crate::proto3::fields::*;

const LD: u32 = WIRETYPE_LENGTH_DELIMITED as u32;
const VARINT: u32 = WIRETYPE_VARINT as u32;
const FIXED64: u32 = WIRETYPE_FIXED64 as u32;

pub(crate) const SPAN: Field = Field::new(1 << 3 | LD);

const TRACE_ID: HexField = HexField::new(1 << 3 | LD);
const PARENT_ID: HexField = HexField::new(2 << 3 | LD);
const ID: HexField = HexField::new(3 << 3 | LD);
const KIND: VarintField = VarintField::new(4 << 3 | VARINT);
const NAME: Utf8Field = Utf8Field::new(5 << 3 | LD);
const TIMESTAMP: Fixed64Field = Fixed64Field::new(6 << 3 | FIXED64);
const DURATION: VarintField = VarintField::new(7 << 3 | VARINT);
const LOCAL_ENDPOINT: Field = Field::new(8 << 3 | LD);
const REMOTE_ENDPOINT: Field = Field::new(9 << 3 | LD);
const ANNOTATIONS: Field = Field::new(10 << 3 | LD);
const TAGS: Field = Field::new(11 << 3 | LD);
const DEBUG: BooleanField = BooleanField::new(12 << 3 | VARINT);
const SHARED: BooleanField = BooleanField::new(13 << 3 | VARINT);

// === Endpoint ===

const SERVICE_NAME: Utf8Field = Utf8Field::new(1 << 3 | LD);
const IPV4: BytesField = BytesField::new(2 << 3 | LD);
const IPV6: BytesField = BytesField::new(3 << 3 | LD);
const PORT: VarintField = VarintField::new(4 << 3 | VARINT);

// === Annotation ===

const ANNOTATION_TIMESTAMP: Fixed64Field = Fixed64Field::new(1 << 3 | FIXED64);
const ANNOTATION_VALUE: Utf8Field = Utf8Field::new(2 << 3 | LD);

// === Tag map entry ===

const TAG_KEY: Utf8Field = Utf8Field::new(1 << 3 | LD);
const TAG_VALUE: Utf8Field = Utf8Field::new(2 << 3 | LD);

fn kind_number(kind: Option<Kind>) -> u64 {
    match kind {
        None => 0,
        Some(Kind::Client) => 1,
        Some(Kind::Server) => 2,
        Some(Kind::Producer) => 3,
        Some(Kind::Consumer) => 4,
    }
}

fn kind_from_number(number: u64) -> Option<Kind> {
    match number {
        1 => Some(Kind::Client),
        2 => Some(Kind::Server),
        3 => Some(Kind::Producer),
        4 => Some(Kind::Consumer),
        _ => None,
    }
}

fn endpoint_size_of_value(endpoint: &Endpoint) -> usize {
    SERVICE_NAME.size_in_bytes(endpoint.service_name().unwrap_or(""))
        + endpoint.ipv4_bytes().map_or(0, |ip| IPV4.size_in_bytes(&ip))
        + endpoint.ipv6_bytes().map_or(0, |ip| IPV6.size_in_bytes(&ip))
        + PORT.size_in_bytes(endpoint.port().map_or(0, u64::from))
}

fn write_endpoint_value(buffer: &mut WriteBuffer<'_>, endpoint: &Endpoint) {
    SERVICE_NAME.write(buffer, endpoint.service_name().unwrap_or(""));
    if let Some(ip) = endpoint.ipv4_bytes() {
        IPV4.write(buffer, &ip);
    }
    if let Some(ip) = endpoint.ipv6_bytes() {
        IPV6.write(buffer, &ip);
    }
    PORT.write(buffer, endpoint.port().map_or(0, u64::from));
}

fn endpoint_size(field: Field, endpoint: Option<&Endpoint>) -> usize {
    endpoint.map_or(0, |e| field.length_delimited_size(endpoint_size_of_value(e)))
}

fn write_endpoint(buffer: &mut WriteBuffer<'_>, field: Field, endpoint: Option<&Endpoint>) {
    if let Some(endpoint) = endpoint {
        field.write_length_prefix(buffer, endpoint_size_of_value(endpoint));
        write_endpoint_value(buffer, endpoint);
    }
}

fn annotation_size_of_value(annotation: &Annotation) -> usize {
    ANNOTATION_TIMESTAMP.size_in_bytes(annotation.timestamp())
        + ANNOTATION_VALUE.size_in_bytes(annotation.value())
}

fn tag_size_of_value(key: &str, value: &str) -> usize {
    TAG_KEY.size_in_bytes(key) + TAG_VALUE.size_in_bytes(value)
}

/// Size of the span message, without its own key and length prefix.
fn span_size_of_value(span: &Span) -> usize {
    let mut size = TRACE_ID.size_in_bytes(span.trace_id())
        + PARENT_ID.size_in_bytes(span.parent_id().unwrap_or(""))
        + ID.size_in_bytes(span.id())
        + KIND.size_in_bytes(kind_number(span.kind()))
        + NAME.size_in_bytes(span.name().unwrap_or(""))
        + TIMESTAMP.size_in_bytes(span.timestamp().unwrap_or(0))
        + DURATION.size_in_bytes(span.duration().unwrap_or(0))
        + endpoint_size(LOCAL_ENDPOINT, span.local_endpoint())
        + endpoint_size(REMOTE_ENDPOINT, span.remote_endpoint());
    for annotation in span.annotations() {
        size += ANNOTATIONS.length_delimited_size(annotation_size_of_value(annotation));
    }
    for (key, value) in span.tags() {
        size += TAGS.length_delimited_size(tag_size_of_value(key, value));
    }
    size + DEBUG.size_in_bytes(span.debug()) + SHARED.size_in_bytes(span.shared())
}

fn write_span_value(buffer: &mut WriteBuffer<'_>, span: &Span) {
    TRACE_ID.write(buffer, span.trace_id());
    PARENT_ID.write(buffer, span.parent_id().unwrap_or(""));
    ID.write(buffer, span.id());
    KIND.write(buffer, kind_number(span.kind()));
    NAME.write(buffer, span.name().unwrap_or(""));
    TIMESTAMP.write(buffer, span.timestamp().unwrap_or(0));
    DURATION.write(buffer, span.duration().unwrap_or(0));
    write_endpoint(buffer, LOCAL_ENDPOINT, span.local_endpoint());
    write_endpoint(buffer, REMOTE_ENDPOINT, span.remote_endpoint());
    for annotation in span.annotations() {
        ANNOTATIONS.write_length_prefix(buffer, annotation_size_of_value(annotation));
        ANNOTATION_TIMESTAMP.write(buffer, annotation.timestamp());
        ANNOTATION_VALUE.write(buffer, annotation.value());
    }
    for (key, value) in span.tags() {
        TAGS.write_length_prefix(buffer, tag_size_of_value(key, value));
        TAG_KEY.write(buffer, key);
        TAG_VALUE.write(buffer, value);
    }
    DEBUG.write(buffer, span.debug());
    SHARED.write(buffer, span.shared());
}

/// Writes a span as one element of `ListOfSpans`: key, length, message.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proto3SpanWriter;

impl Writer<Span> for Proto3SpanWriter {
    fn size_in_bytes(&self, span: &Span) -> usize {
        SPAN.length_delimited_size(span_size_of_value(span))
    }

    fn write(&self, span: &Span, buffer: &mut WriteBuffer<'_>) {
        SPAN.write_length_prefix(buffer, span_size_of_value(span));
        write_span_value(buffer, span);
    }
}

/// Repeats a writer with no envelope, as proto3 does for repeated fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Repeated<W>(pub W);

impl<T, W: Writer<T>> Writer<[T]> for Repeated<W> {
    fn size_in_bytes(&self, values: &[T]) -> usize {
        values.iter().map(|v| self.0.size_in_bytes(v)).sum()
    }

    fn write(&self, values: &[T], buffer: &mut WriteBuffer<'_>) {
        for value in values {
            self.0.write(value, buffer);
        }
    }
}

/// Reads spans from a `ListOfSpans` message, skipping unknown fields.
///
/// Stops after the first span when `one` is set.
pub(crate) fn read_spans(bytes: &[u8], out: &mut Vec<Span>, one: bool) -> Result<bool, CodecError> {
    let mut buffer = ReadBuffer::wrap(bytes);
    let mut read = false;
    while buffer.has_remaining() {
        let field = Field::read_key(&mut buffer)?;
        if field != SPAN {
            log::trace!(
                "skipping unknown ListOfSpans field {} at byte {}",
                field.field_number,
                buffer.pos()
            );
            Field::skip_value(&mut buffer, field.wire_type)?;
            continue;
        }
        let length = read_length_prefix(&mut buffer)?;
        let mut message = buffer.read_nested(length)?;
        out.push(read_span(&mut message)?);
        read = true;
        if one {
            break;
        }
    }
    Ok(read)
}

fn read_span(buffer: &mut ReadBuffer<'_>) -> Result<Span, CodecError> {
    let mut builder = SpanBuilder::default();
    while buffer.has_remaining() {
        let field = Field::read_key(buffer)?;
        match field {
            f if f == TRACE_ID.0 => {
                builder.trace_id = Some(TRACE_ID.read_length_prefix_and_value(buffer)?)
            }
            f if f == PARENT_ID.0 => {
                builder.parent_id = Some(PARENT_ID.read_length_prefix_and_value(buffer)?)
            }
            f if f == ID.0 => builder.id = Some(ID.read_length_prefix_and_value(buffer)?),
            f if f == KIND.0 => builder.kind = kind_from_number(KIND.read(buffer)?),
            f if f == NAME.0 => builder.name = Some(NAME.read_length_prefix_and_value(buffer)?),
            f if f == TIMESTAMP.0 => builder.timestamp = Some(TIMESTAMP.read(buffer)?),
            f if f == DURATION.0 => builder.duration = Some(DURATION.read(buffer)?),
            f if f == LOCAL_ENDPOINT => builder.local_endpoint = read_endpoint(buffer)?,
            f if f == REMOTE_ENDPOINT => builder.remote_endpoint = read_endpoint(buffer)?,
            f if f == ANNOTATIONS => {
                if let Some(annotation) = read_annotation(buffer)? {
                    builder.annotations.push(annotation);
                }
            }
            f if f == TAGS => {
                let (key, value) = read_tag(buffer)?;
                builder.tags.insert(key, value);
            }
            f if f == DEBUG.0 => builder.debug = DEBUG.read(buffer)?,
            f if f == SHARED.0 => builder.shared = SHARED.read(buffer)?,
            f => skip_unknown(buffer, f, "Span")?,
        }
    }
    builder.build()
}

fn skip_unknown(buffer: &mut ReadBuffer<'_>, field: Field, message: &str) -> Result<(), CodecError> {
    log::trace!(
        "skipping unknown {message} field {} at byte {}",
        field.field_number,
        buffer.pos()
    );
    Field::skip_value(buffer, field.wire_type)
}

fn read_endpoint(buffer: &mut ReadBuffer<'_>) -> Result<Option<Endpoint>, CodecError> {
    let length = read_length_prefix(buffer)?;
    let mut message = buffer.read_nested(length)?;
    let mut builder = Endpoint::builder();
    while message.has_remaining() {
        let field = Field::read_key(&mut message)?;
        match field {
            f if f == SERVICE_NAME.0 => {
                let name = SERVICE_NAME.read_length_prefix_and_value(&mut message)?;
                builder.set_service_name(&name);
            }
            f if f == IPV4.0 || f == IPV6.0 => {
                let ip = IPV4.read_length_prefix_and_value(&mut message)?;
                builder.parse_ip_bytes(ip);
            }
            f if f == PORT.0 => builder.set_port(i64::from(PORT.read_u32(&mut message)?)),
            f => skip_unknown(&mut message, f, "Endpoint")?,
        }
    }
    builder.build_non_empty()
}

fn read_annotation(buffer: &mut ReadBuffer<'_>) -> Result<Option<Annotation>, CodecError> {
    let length = read_length_prefix(buffer)?;
    let mut message = buffer.read_nested(length)?;
    let mut timestamp = 0;
    let mut value = String::new();
    while message.has_remaining() {
        let field = Field::read_key(&mut message)?;
        match field {
            f if f == ANNOTATION_TIMESTAMP.0 => timestamp = ANNOTATION_TIMESTAMP.read(&mut message)?,
            f if f == ANNOTATION_VALUE.0 => {
                value = ANNOTATION_VALUE.read_length_prefix_and_value(&mut message)?
            }
            f => skip_unknown(&mut message, f, "Annotation")?,
        }
    }
    if timestamp == 0 && value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Annotation::new(timestamp, value)))
}

fn read_tag(buffer: &mut ReadBuffer<'_>) -> Result<(String, String), CodecError> {
    let length = read_length_prefix(buffer)?;
    let mut message = buffer.read_nested(length)?;
    let mut key = String::new();
    let mut value = String::new();
    while message.has_remaining() {
        let field = Field::read_key(&mut message)?;
        match field {
            f if f == TAG_KEY.0 => key = TAG_KEY.read_length_prefix_and_value(&mut message)?,
            f if f == TAG_VALUE.0 => value = TAG_VALUE.read_length_prefix_and_value(&mut message)?,
            f => skip_unknown(&mut message, f, "Tag")?,
        }
    }
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::write_exact;
    use assert_matches::assert_matches;

    fn frontend() -> Endpoint {
        Endpoint::builder()
            .service_name("frontend")
            .ip("172.17.0.13")
            .build()
            .unwrap()
    }

    fn span() -> Span {
        Span::builder()
            .trace_id("7180c278b62e8f6a216a2aea45d08fc9")
            .parent_id("6b221d5bc9e6496c")
            .id("5b4185666d50f68b")
            .name("get")
            .kind(Kind::Client)
            .local_endpoint(frontend())
            .timestamp(1_472_470_996_199_000)
            .duration(207_000)
            .add_annotation(1_472_470_996_238_000, "foo")
            .put_tag("http.path", "/api")
            .build()
            .unwrap()
    }

    fn round_trip(span: &Span) -> Span {
        let bytes = write_exact(&Proto3SpanWriter, span, "proto3");
        let mut out = Vec::new();
        assert!(read_spans(&bytes, &mut out, true).unwrap());
        out.remove(0)
    }

    #[test]
    fn test_write_starts_with_list_field() {
        let bytes = write_exact(&Proto3SpanWriter, &span(), "proto3");
        assert_eq!(bytes[0], 0x0a);
        // Trace id is written as its 16 raw bytes.
        assert_eq!(usize::from(bytes[1]), bytes.len() - 2);
        assert_eq!(&bytes[2..4], &[0x0a, 16]);
        assert_eq!(&bytes[4..6], &[0x71, 0x80]);
    }

    #[test]
    fn test_endpoint_bytes() {
        let size = endpoint_size(LOCAL_ENDPOINT, Some(&frontend()));
        let mut out = vec![0u8; size];
        let mut buffer = WriteBuffer::wrap(&mut out);
        write_endpoint(&mut buffer, LOCAL_ENDPOINT, Some(&frontend()));
        assert_eq!(buffer.pos(), size);
        assert_eq!(
            out,
            [
                0x42, 16, // field 8, length
                0x0a, 8, b'f', b'r', b'o', b'n', b't', b'e', b'n', b'd', // service name
                0x12, 4, 172, 17, 0, 13, // ipv4
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let span = span();
        assert_eq!(round_trip(&span), span);
    }

    #[test]
    fn test_round_trip_empty_tag_value_and_flags() {
        let span = Span::builder()
            .trace_id("1")
            .id("2")
            .kind(Kind::Server)
            .put_tag("error", "")
            .debug(true)
            .shared(true)
            .build()
            .unwrap();
        assert_eq!(round_trip(&span), span);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let span = Span::builder().trace_id("1").id("2").build().unwrap();
        let mut bytes = write_exact(&Proto3SpanWriter, &span, "proto3");
        // Append field 20 (varint 150) inside the span message, and fix the length.
        bytes.extend_from_slice(&[0xa0, 0x01, 0x96, 0x01]);
        bytes[1] += 4;
        // Then an unknown top-level fixed32 field.
        bytes.extend_from_slice(&[0x15, 1, 2, 3, 4]);

        let mut out = Vec::new();
        assert!(read_spans(&bytes, &mut out, false).unwrap());
        assert_eq!(out, vec![span]);
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        let span = Span::builder().trace_id("1").id("2").build().unwrap();
        let mut bytes = write_exact(&Proto3SpanWriter, &span, "proto3");
        bytes.extend_from_slice(&[0x20, 9]);
        bytes[1] += 2;

        let mut out = Vec::new();
        read_spans(&bytes, &mut out, true).unwrap();
        assert_eq!(out[0].kind(), None);
    }

    #[test]
    fn test_invalid_wire_type() {
        // field 1, wire type 7
        let mut out = Vec::new();
        assert_matches!(
            read_spans(&[0x0f], &mut out, false),
            Err(CodecError::Malformed { message, .. }) if message == "Malformed: invalid wireType 7 at byte 0"
        );
    }

    #[test]
    fn test_truncated_span() {
        let bytes = write_exact(&Proto3SpanWriter, &span(), "proto3");
        let length = span_size_of_value(&span());
        let available = 10 - 1 - crate::buffer::varint_size_u32(length as u32);
        let mut out = Vec::new();
        let err = read_spans(&bytes[..10], &mut out, false).unwrap_err();
        assert_eq!(err, CodecError::truncated(length as u64, available));
    }
}
