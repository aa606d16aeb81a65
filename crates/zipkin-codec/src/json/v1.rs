use super::*;
use crate::buffer::ReadBuffer;
use crate::model::ids::{lower_hex_to_unsigned_long, lower_hex_to_unsigned_long_high};
use crate::model::Span;
use crate::v1::{BinaryValue, V1Annotation, V1BinaryAnnotation, V1Span};

const ENDPOINT: EndpointWriter = EndpointWriter {
    always_service_name: true,
};

/// Writes the legacy span schema, with `annotations` and `binaryAnnotations`
/// carrying endpoints in place of `localEndpoint`, `remoteEndpoint` and `tags`.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1JsonSpanWriter;

fn endpoint_size(endpoint: &Option<Endpoint>) -> usize {
    endpoint
        .as_ref()
        .map_or(0, |e| name_size("endpoint", false) + ENDPOINT.size_in_bytes(e))
}

fn write_endpoint(endpoint: &Option<Endpoint>, buffer: &mut WriteBuffer<'_>) {
    if let Some(endpoint) = endpoint {
        write_name(buffer, "endpoint", false);
        ENDPOINT.write(endpoint, buffer);
    }
}

fn annotation_size(annotation: &V1Annotation) -> usize {
    1 + name_size("timestamp", true)
        + number_size(annotation.timestamp)
        + name_size("value", false)
        + string_size(&annotation.value)
        + endpoint_size(&annotation.endpoint)
        + 1
}

fn write_annotation(annotation: &V1Annotation, buffer: &mut WriteBuffer<'_>) {
    buffer.write_byte(b'{');
    write_name(buffer, "timestamp", true);
    buffer.write_ascii_u64(annotation.timestamp);
    write_name(buffer, "value", false);
    write_string(buffer, &annotation.value);
    write_endpoint(&annotation.endpoint, buffer);
    buffer.write_byte(b'}');
}

fn binary_annotation_size(binary: &V1BinaryAnnotation) -> usize {
    let value_size = match &binary.value {
        BinaryValue::Bool(true) => 4,
        BinaryValue::Bool(false) => 5,
        BinaryValue::String(value) => string_size(value),
    };
    1 + name_size("key", true)
        + string_size(&binary.key)
        + name_size("value", false)
        + value_size
        + endpoint_size(&binary.endpoint)
        + 1
}

fn write_binary_annotation(binary: &V1BinaryAnnotation, buffer: &mut WriteBuffer<'_>) {
    buffer.write_byte(b'{');
    write_name(buffer, "key", true);
    write_string(buffer, &binary.key);
    write_name(buffer, "value", false);
    match &binary.value {
        BinaryValue::Bool(value) => buffer.write_ascii(if *value { "true" } else { "false" }),
        BinaryValue::String(value) => write_string(buffer, value),
    }
    write_endpoint(&binary.endpoint, buffer);
    buffer.write_byte(b'}');
}

fn hex_size(span: &V1Span) -> (usize, usize) {
    let trace_id = if span.trace_id_high != 0 { 32 } else { 16 };
    (trace_id + 2, 16 + 2)
}

impl Writer<V1Span> for V1JsonSpanWriter {
    fn size_in_bytes(&self, span: &V1Span) -> usize {
        let (trace_id, id) = hex_size(span);
        let mut size = 1 + name_size("traceId", true) + trace_id;
        if span.parent_id != 0 {
            size += name_size("parentId", false) + id;
        }
        size += name_size("id", false) + id;
        size += name_size("name", false) + string_size(&span.name);
        if span.timestamp != 0 {
            size += name_size("timestamp", false) + number_size(span.timestamp);
        }
        if span.duration != 0 {
            size += name_size("duration", false) + number_size(span.duration);
        }
        if !span.annotations.is_empty() {
            size += name_size("annotations", false) + 2 + span.annotations.len() - 1;
            size += span.annotations.iter().map(annotation_size).sum::<usize>();
        }
        if !span.binary_annotations.is_empty() {
            size += name_size("binaryAnnotations", false) + 2 + span.binary_annotations.len() - 1;
            size += span
                .binary_annotations
                .iter()
                .map(binary_annotation_size)
                .sum::<usize>();
        }
        if span.debug {
            size += name_size("debug", false) + 4;
        }
        size + 1
    }

    fn write(&self, span: &V1Span, buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(b'{');
        write_name(buffer, "traceId", true);
        buffer.write_byte(b'"');
        if span.trace_id_high != 0 {
            buffer.write_lower_hex_u64(span.trace_id_high);
        }
        buffer.write_lower_hex_u64(span.trace_id);
        buffer.write_byte(b'"');
        if span.parent_id != 0 {
            write_name(buffer, "parentId", false);
            buffer.write_byte(b'"');
            buffer.write_lower_hex_u64(span.parent_id);
            buffer.write_byte(b'"');
        }
        write_name(buffer, "id", false);
        buffer.write_byte(b'"');
        buffer.write_lower_hex_u64(span.id);
        buffer.write_byte(b'"');
        write_name(buffer, "name", false);
        write_string(buffer, &span.name);
        if span.timestamp != 0 {
            write_name(buffer, "timestamp", false);
            buffer.write_ascii_u64(span.timestamp);
        }
        if span.duration != 0 {
            write_name(buffer, "duration", false);
            buffer.write_ascii_u64(span.duration);
        }
        if !span.annotations.is_empty() {
            write_name(buffer, "annotations", false);
            buffer.write_byte(b'[');
            for (i, annotation) in span.annotations.iter().enumerate() {
                if i > 0 {
                    buffer.write_byte(b',');
                }
                write_annotation(annotation, buffer);
            }
            buffer.write_byte(b']');
        }
        if !span.binary_annotations.is_empty() {
            write_name(buffer, "binaryAnnotations", false);
            buffer.write_byte(b'[');
            for (i, binary) in span.binary_annotations.iter().enumerate() {
                if i > 0 {
                    buffer.write_byte(b',');
                }
                write_binary_annotation(binary, buffer);
            }
            buffer.write_byte(b']');
        }
        if span.debug {
            write_name(buffer, "debug", false);
            buffer.write_ascii("true");
        }
        buffer.write_byte(b'}');
    }
}

impl Writer<Span> for V1JsonSpanWriter {
    fn size_in_bytes(&self, span: &Span) -> usize {
        <Self as Writer<V1Span>>::size_in_bytes(self, &V1Span::from(span))
    }

    fn write(&self, span: &Span, buffer: &mut WriteBuffer<'_>) {
        <Self as Writer<V1Span>>::write(self, &V1Span::from(span), buffer)
    }
}

pub(crate) fn read_v1_span(buffer: ReadBuffer<'_>) -> Result<V1Span, CodecError> {
    let mut reader = JsonReader::new(buffer);
    let span = read_span_object(&mut reader)?;
    expect_end(&mut reader)?;
    Ok(span)
}

pub(crate) fn read_v1_spans(buffer: ReadBuffer<'_>) -> Result<Vec<V1Span>, CodecError> {
    let mut reader = JsonReader::new(buffer);
    read_list(&mut reader, read_span_object)
}

fn read_span_object(reader: &mut JsonReader<'_>) -> Result<V1Span, CodecError> {
    let mut span = V1Span::default();
    let (mut has_trace_id, mut has_id) = (false, false);
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        match name.as_str() {
            "traceId" => {
                let trace_id = reader.next_string()?;
                span.trace_id_high = lower_hex_to_unsigned_long_high(&trace_id)?;
                span.trace_id = lower_hex_to_unsigned_long(&trace_id)?;
                has_trace_id = true;
                continue;
            }
            "id" => {
                span.id = lower_hex_to_unsigned_long(&reader.next_string()?)?;
                has_id = true;
                continue;
            }
            _ => {}
        }
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "parentId" => span.parent_id = lower_hex_to_unsigned_long(&reader.next_string()?)?,
            "name" => span.name = reader.next_string()?,
            "timestamp" => span.timestamp = reader.next_u64()?,
            "duration" => span.duration = reader.next_u64()?,
            "annotations" => {
                reader.begin_array()?;
                while reader.has_next()? {
                    span.annotations.push(read_annotation(reader)?);
                }
                reader.end_array()?;
            }
            "binaryAnnotations" => {
                reader.begin_array()?;
                while reader.has_next()? {
                    span.binary_annotations.extend(read_binary_annotation(reader)?);
                }
                reader.end_array()?;
            }
            "debug" => span.debug = reader.next_bool()?,
            _ => reader.skip_value()?,
        }
    }
    reader.end_object()?;
    match (has_trace_id, has_id) {
        (true, true) => Ok(span),
        (false, true) => Err(CodecError::invalid_argument("Missing: traceId")),
        (true, false) => Err(CodecError::invalid_argument("Missing: id")),
        (false, false) => Err(CodecError::invalid_argument("Missing: traceId id")),
    }
}

fn read_annotation(reader: &mut JsonReader<'_>) -> Result<V1Annotation, CodecError> {
    let (mut timestamp, mut value, mut endpoint) = (None, None, None);
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "timestamp" => timestamp = Some(reader.next_u64()?),
            "value" => value = Some(reader.next_string()?),
            "endpoint" => endpoint = read_endpoint(reader)?,
            _ => reader.skip_value()?,
        }
    }
    let (Some(timestamp), Some(value)) = (timestamp, value) else {
        return Err(CodecError::malformed(format!(
            "Incomplete annotation at {}",
            reader.path()
        )));
    };
    reader.end_object()?;
    Ok(V1Annotation::new(timestamp, value, endpoint))
}

/// String and boolean values are kept; other types are dropped.
fn read_binary_annotation(
    reader: &mut JsonReader<'_>,
) -> Result<Option<V1BinaryAnnotation>, CodecError> {
    let (mut key, mut value, mut type_, mut endpoint) = (None, None, None, None);
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "key" => key = Some(reader.next_string()?),
            "value" => {
                value = match reader.peek()? {
                    Token::Boolean => Some(BinaryValue::Bool(reader.next_bool()?)),
                    Token::String => Some(BinaryValue::String(reader.next_string()?)),
                    _ => {
                        reader.skip_value()?;
                        None
                    }
                }
            }
            "type" => type_ = Some(reader.next_string()?),
            "endpoint" => endpoint = read_endpoint(reader)?,
            _ => reader.skip_value()?,
        }
    }
    let Some(key) = key else {
        return Err(CodecError::malformed(format!(
            "Incomplete binary annotation at {}",
            reader.path()
        )));
    };
    reader.end_object()?;

    let value = match (value, type_.as_deref()) {
        (Some(value @ BinaryValue::String(_)), None | Some("STRING")) => value,
        (Some(value @ BinaryValue::Bool(_)), None | Some("BOOL")) => value,
        (_, type_) => {
            log::trace!("dropping binary annotation {key} of type {type_:?}");
            return Ok(None);
        }
    };
    Ok(Some(V1BinaryAnnotation {
        key,
        value,
        endpoint,
    }))
}
