use super::*;
use crate::model::{Endpoint, Span};
use crate::v1::{BinaryValue, V1Annotation, V1BinaryAnnotation, V1Span};

const TRACE_ID: ThriftField = ThriftField::new(TYPE_I64, 1);
const NAME: ThriftField = ThriftField::new(TYPE_STRING, 3);
const ID: ThriftField = ThriftField::new(TYPE_I64, 4);
const PARENT_ID: ThriftField = ThriftField::new(TYPE_I64, 5);
const ANNOTATIONS: ThriftField = ThriftField::new(TYPE_LIST, 6);
const BINARY_ANNOTATIONS: ThriftField = ThriftField::new(TYPE_LIST, 8);
const DEBUG: ThriftField = ThriftField::new(TYPE_BOOL, 9);
const TIMESTAMP: ThriftField = ThriftField::new(TYPE_I64, 10);
const DURATION: ThriftField = ThriftField::new(TYPE_I64, 11);
const TRACE_ID_HIGH: ThriftField = ThriftField::new(TYPE_I64, 12);

const ANNOTATION_TIMESTAMP: ThriftField = ThriftField::new(TYPE_I64, 1);
const ANNOTATION_VALUE: ThriftField = ThriftField::new(TYPE_STRING, 2);
const ANNOTATION_HOST: ThriftField = ThriftField::new(TYPE_STRUCT, 3);

const BINARY_KEY: ThriftField = ThriftField::new(TYPE_STRING, 1);
const BINARY_VALUE: ThriftField = ThriftField::new(TYPE_STRING, 2);
const BINARY_TYPE: ThriftField = ThriftField::new(TYPE_I32, 3);
const BINARY_HOST: ThriftField = ThriftField::new(TYPE_STRUCT, 4);

/// A 64-bit field costs its header plus eight bytes.
const I64_FIELD_SIZE: usize = ThriftField::SIZE + 8;

/// Writes a span as the legacy thrift struct.
///
/// Spans are converted to their V1 shape first, so remote endpoints and tags
/// become binary annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1ThriftSpanWriter;

fn host_size(host: &Option<Endpoint>) -> usize {
    host.as_ref()
        .map_or(0, |e| ThriftField::SIZE + endpoint::size_in_bytes(e))
}

fn write_host(field: ThriftField, host: &Option<Endpoint>, buffer: &mut WriteBuffer<'_>) {
    if let Some(host) = host {
        field.write(buffer);
        endpoint::write(host, buffer);
    }
}

fn annotation_size(annotation: &V1Annotation) -> usize {
    I64_FIELD_SIZE
        + ThriftField::SIZE
        + string_size(&annotation.value)
        + host_size(&annotation.endpoint)
        + 1
}

fn write_annotation(annotation: &V1Annotation, buffer: &mut WriteBuffer<'_>) {
    ANNOTATION_TIMESTAMP.write(buffer);
    buffer.write_long_be(annotation.timestamp);
    ANNOTATION_VALUE.write(buffer);
    write_string(buffer, &annotation.value);
    write_host(ANNOTATION_HOST, &annotation.endpoint, buffer);
    buffer.write_byte(TYPE_STOP);
}

fn binary_value_len(value: &BinaryValue) -> usize {
    match value {
        BinaryValue::Bool(_) => 1,
        BinaryValue::String(s) => s.len(),
    }
}

fn binary_annotation_size(binary: &V1BinaryAnnotation) -> usize {
    ThriftField::SIZE
        + string_size(&binary.key)
        + ThriftField::SIZE
        + 4
        + binary_value_len(&binary.value)
        + ThriftField::SIZE
        + 4
        + host_size(&binary.endpoint)
        + 1
}

fn write_binary_annotation(binary: &V1BinaryAnnotation, buffer: &mut WriteBuffer<'_>) {
    BINARY_KEY.write(buffer);
    write_string(buffer, &binary.key);
    BINARY_VALUE.write(buffer);
    match &binary.value {
        BinaryValue::Bool(value) => write_binary(buffer, &[u8::from(*value)]),
        BinaryValue::String(value) => write_string(buffer, value),
    }
    BINARY_TYPE.write(buffer);
    buffer.write_int_be(binary.value.type_code());
    write_host(BINARY_HOST, &binary.endpoint, buffer);
    buffer.write_byte(TYPE_STOP);
}

impl Writer<V1Span> for V1ThriftSpanWriter {
    fn size_in_bytes(&self, span: &V1Span) -> usize {
        let mut size = I64_FIELD_SIZE // trace id
            + ThriftField::SIZE + string_size(&span.name)
            + I64_FIELD_SIZE; // id
        if span.parent_id != 0 {
            size += I64_FIELD_SIZE;
        }
        size += ThriftField::SIZE + 5;
        size += span.annotations.iter().map(annotation_size).sum::<usize>();
        size += ThriftField::SIZE + 5;
        size += span
            .binary_annotations
            .iter()
            .map(binary_annotation_size)
            .sum::<usize>();
        if span.debug {
            size += ThriftField::SIZE + 1;
        }
        for value in [span.timestamp, span.duration, span.trace_id_high] {
            if value != 0 {
                size += I64_FIELD_SIZE;
            }
        }
        size + 1
    }

    fn write(&self, span: &V1Span, buffer: &mut WriteBuffer<'_>) {
        TRACE_ID.write(buffer);
        buffer.write_long_be(span.trace_id);

        NAME.write(buffer);
        write_string(buffer, &span.name);

        ID.write(buffer);
        buffer.write_long_be(span.id);

        if span.parent_id != 0 {
            PARENT_ID.write(buffer);
            buffer.write_long_be(span.parent_id);
        }

        ANNOTATIONS.write(buffer);
        write_list_begin(buffer, TYPE_STRUCT, span.annotations.len());
        for annotation in &span.annotations {
            write_annotation(annotation, buffer);
        }

        BINARY_ANNOTATIONS.write(buffer);
        write_list_begin(buffer, TYPE_STRUCT, span.binary_annotations.len());
        for binary in &span.binary_annotations {
            write_binary_annotation(binary, buffer);
        }

        if span.debug {
            DEBUG.write(buffer);
            buffer.write_byte(1);
        }

        for (field, value) in [
            (TIMESTAMP, span.timestamp),
            (DURATION, span.duration),
            (TRACE_ID_HIGH, span.trace_id_high),
        ] {
            if value != 0 {
                field.write(buffer);
                buffer.write_long_be(value);
            }
        }
        buffer.write_byte(TYPE_STOP);
    }
}

impl Writer<Span> for V1ThriftSpanWriter {
    fn size_in_bytes(&self, span: &Span) -> usize {
        <Self as Writer<V1Span>>::size_in_bytes(self, &V1Span::from(span))
    }

    fn write(&self, span: &Span, buffer: &mut WriteBuffer<'_>) {
        <Self as Writer<V1Span>>::write(self, &V1Span::from(span), buffer)
    }
}

pub(crate) fn read_span(buffer: &mut ReadBuffer<'_>) -> Result<V1Span, CodecError> {
    let mut span = V1Span::default();
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_I64) => span.trace_id = buffer.read_long_be()?,
            (3, TYPE_STRING) => span.name = read_string(buffer)?,
            (4, TYPE_I64) => span.id = buffer.read_long_be()?,
            (5, TYPE_I64) => span.parent_id = buffer.read_long_be()?,
            (6, TYPE_LIST) => {
                let count = read_struct_list_begin(buffer)?;
                span.annotations.reserve(capacity_hint(count, buffer));
                for _ in 0..count {
                    span.annotations.push(read_annotation(buffer)?);
                }
            }
            (8, TYPE_LIST) => {
                let count = read_struct_list_begin(buffer)?;
                span.binary_annotations.reserve(capacity_hint(count, buffer));
                for _ in 0..count {
                    span.binary_annotations.extend(read_binary_annotation(buffer)?);
                }
            }
            (9, TYPE_BOOL) => span.debug = buffer.read_byte()? == 1,
            (10, TYPE_I64) => span.timestamp = buffer.read_long_be()?,
            (11, TYPE_I64) => span.duration = buffer.read_long_be()?,
            (12, TYPE_I64) => span.trace_id_high = buffer.read_long_be()?,
            _ => skip(buffer, field.type_)?,
        }
    }
    Ok(span)
}

pub(crate) fn read_span_list(buffer: &mut ReadBuffer<'_>) -> Result<Vec<V1Span>, CodecError> {
    let count = read_struct_list_begin(buffer)?;
    let mut spans = Vec::with_capacity(capacity_hint(count, buffer));
    for _ in 0..count {
        spans.push(read_span(buffer)?);
    }
    Ok(spans)
}

fn read_annotation(buffer: &mut ReadBuffer<'_>) -> Result<V1Annotation, CodecError> {
    let (mut timestamp, mut value, mut host) = (0, String::new(), None);
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_I64) => timestamp = buffer.read_long_be()?,
            (2, TYPE_STRING) => value = read_string(buffer)?,
            (3, TYPE_STRUCT) => host = endpoint::read(buffer)?,
            _ => skip(buffer, field.type_)?,
        }
    }
    Ok(V1Annotation::new(timestamp, value, host))
}

/// Only string and boolean values carry meaning; others are dropped.
fn read_binary_annotation(
    buffer: &mut ReadBuffer<'_>,
) -> Result<Option<V1BinaryAnnotation>, CodecError> {
    let (mut key, mut value, mut type_, mut host) = (String::new(), &[][..], None, None);
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_STRING) => key = read_string(buffer)?,
            (2, TYPE_STRING) => value = read_binary(buffer)?,
            (3, TYPE_I32) => type_ = Some(buffer.read_int_be()?),
            (4, TYPE_STRUCT) => host = endpoint::read(buffer)?,
            _ => skip(buffer, field.type_)?,
        }
    }
    match type_ {
        Some(BinaryValue::TYPE_BOOL) => Ok(Some(V1BinaryAnnotation::bool(
            key,
            value == [1],
            host,
        ))),
        Some(BinaryValue::TYPE_STRING) => Ok(Some(V1BinaryAnnotation::string(
            key,
            String::from_utf8_lossy(value),
            host,
        ))),
        other => {
            log::trace!("dropping binary annotation {key} of type {other:?}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::write_exact;
    use crate::v1::{CLIENT_RECV, CLIENT_SEND, SERVER_ADDR};
    use assert_matches::assert_matches;

    fn frontend() -> Endpoint {
        Endpoint::builder()
            .service_name("frontend")
            .ip("172.17.0.13")
            .build()
            .unwrap()
    }

    fn backend() -> Endpoint {
        Endpoint::builder()
            .service_name("backend")
            .ip("192.168.99.101")
            .port(9000)
            .build()
            .unwrap()
    }

    fn client_span() -> V1Span {
        V1Span {
            trace_id_high: 0x7180c278b62e8f6a,
            trace_id: 0x216a2aea45d08fc9,
            parent_id: 0x6b221d5bc9e6496c,
            id: 0x5b4185666d50f68b,
            name: "get".to_string(),
            timestamp: 1_472_470_996_199_000,
            duration: 207_000,
            annotations: vec![
                V1Annotation::new(1_472_470_996_199_000, CLIENT_SEND, Some(frontend())),
                V1Annotation::new(1_472_470_996_238_000, "foo", Some(frontend())),
                V1Annotation::new(1_472_470_996_406_000, CLIENT_RECV, Some(frontend())),
            ],
            binary_annotations: vec![
                V1BinaryAnnotation::string("clnt/finagle.version", "6.45.0", Some(frontend())),
                V1BinaryAnnotation::bool(SERVER_ADDR, true, Some(backend())),
            ],
            debug: true,
        }
    }

    #[test]
    fn test_minimal_span_bytes() {
        let span = V1Span {
            trace_id: 1,
            id: 2,
            ..Default::default()
        };
        let bytes = write_exact(&V1ThriftSpanWriter, &span, "TBinary");

        #[rustfmt::skip]
        assert_eq!(bytes, [
            TYPE_I64, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1,
            TYPE_STRING, 0, 3, 0, 0, 0, 0,
            TYPE_I64, 0, 4, 0, 0, 0, 0, 0, 0, 0, 2,
            TYPE_LIST, 0, 6, TYPE_STRUCT, 0, 0, 0, 0,
            TYPE_LIST, 0, 8, TYPE_STRUCT, 0, 0, 0, 0,
            TYPE_STOP,
        ]);
    }

    #[test]
    fn test_round_trip() {
        let span = client_span();
        let bytes = write_exact(&V1ThriftSpanWriter, &span, "TBinary");
        let mut buffer = ReadBuffer::wrap(&bytes);
        assert_eq!(read_span(&mut buffer).unwrap(), span);
        assert!(!buffer.has_remaining());
    }

    #[test]
    fn test_legacy_list_header() {
        let mut span = client_span();
        span.binary_annotations.clear();
        let mut bytes = write_exact(&V1ThriftSpanWriter, &span, "TBinary");
        // Past the trace id, name, id and parent id fields and the list's field header.
        let list_type = 11 + 10 + 11 + 11 + 3;
        assert_eq!(bytes[list_type], TYPE_STRUCT);
        bytes[list_type] = TYPE_STRING;

        assert_eq!(read_span(&mut ReadBuffer::wrap(&bytes)).unwrap(), span);
    }

    #[test]
    fn test_other_binary_types_are_dropped() {
        #[rustfmt::skip]
        let bytes = [
            TYPE_LIST, 0, 8, TYPE_STRUCT, 0, 0, 0, 1,
            TYPE_STRING, 0, 1, 0, 0, 0, 1, b'n',
            TYPE_STRING, 0, 2, 0, 0, 0, 4, 0, 0, 0, 1,
            TYPE_I32, 0, 3, 0, 0, 0, 3,
            TYPE_STOP,
            TYPE_STOP,
        ];
        let span = read_span(&mut ReadBuffer::wrap(&bytes)).unwrap();
        assert!(span.binary_annotations.is_empty());
    }

    #[test]
    fn test_truncated_span() {
        let bytes = write_exact(&V1ThriftSpanWriter, &client_span(), "TBinary");
        let err = read_span(&mut ReadBuffer::wrap(&bytes[..bytes.len() - 20])).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_list_of_wrong_type() {
        let bytes = [TYPE_I64, 0, 0, 0, 1];
        assert_matches!(
            read_span_list(&mut ReadBuffer::wrap(&bytes)),
            Err(CodecError::Malformed { .. })
        );
    }

    #[test]
    fn test_span_writer_converts() {
        let span = Span::builder().trace_id("1").id("2").build().unwrap();
        let v2 = write_exact(&V1ThriftSpanWriter, &span, "TBinary");
        let v1 = write_exact(&V1ThriftSpanWriter, &V1Span::from(&span), "TBinary");
        assert_eq!(v2, v1);
    }
}
