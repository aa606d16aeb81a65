use std::str::FromStr;

use super::*;
use crate::buffer::{ReadBuffer, Writer};
use crate::model::{Annotation, Kind, Span, SpanBuilder};

const ENDPOINT: EndpointWriter = EndpointWriter {
    always_service_name: false,
};

/// Writes the current span schema: one flat object, absent fields omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct V2SpanWriter;

fn annotation_size(annotation: &Annotation) -> usize {
    1 + name_size("timestamp", true)
        + number_size(annotation.timestamp())
        + name_size("value", false)
        + string_size(annotation.value())
        + 1
}

fn write_annotation(annotation: &Annotation, buffer: &mut WriteBuffer<'_>) {
    buffer.write_byte(b'{');
    write_name(buffer, "timestamp", true);
    buffer.write_ascii_u64(annotation.timestamp());
    write_name(buffer, "value", false);
    write_string(buffer, annotation.value());
    buffer.write_byte(b'}');
}

impl Writer<Span> for V2SpanWriter {
    fn size_in_bytes(&self, span: &Span) -> usize {
        let mut size = 1 + name_size("traceId", true) + string_size(span.trace_id());
        if let Some(parent_id) = span.parent_id() {
            size += name_size("parentId", false) + string_size(parent_id);
        }
        size += name_size("id", false) + string_size(span.id());
        if let Some(kind) = span.kind() {
            size += name_size("kind", false) + string_size(kind.as_str());
        }
        if let Some(name) = span.name() {
            size += name_size("name", false) + string_size(name);
        }
        if let Some(timestamp) = span.timestamp() {
            size += name_size("timestamp", false) + number_size(timestamp);
        }
        if let Some(duration) = span.duration() {
            size += name_size("duration", false) + number_size(duration);
        }
        if let Some(endpoint) = span.local_endpoint() {
            size += name_size("localEndpoint", false) + ENDPOINT.size_in_bytes(endpoint);
        }
        if let Some(endpoint) = span.remote_endpoint() {
            size += name_size("remoteEndpoint", false) + ENDPOINT.size_in_bytes(endpoint);
        }
        if !span.annotations().is_empty() {
            size += name_size("annotations", false) + 2 + span.annotations().len() - 1;
            size += span.annotations().iter().map(annotation_size).sum::<usize>();
        }
        if !span.tags().is_empty() {
            size += name_size("tags", false) + 2 + span.tags().len() - 1;
            size += span
                .tags()
                .iter()
                .map(|(key, value)| string_size(key) + 1 + string_size(value))
                .sum::<usize>();
        }
        if span.debug() {
            size += name_size("debug", false) + 4;
        }
        if span.shared() {
            size += name_size("shared", false) + 4;
        }
        size + 1
    }

    fn write(&self, span: &Span, buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(b'{');
        write_name(buffer, "traceId", true);
        write_string(buffer, span.trace_id());
        if let Some(parent_id) = span.parent_id() {
            write_name(buffer, "parentId", false);
            write_string(buffer, parent_id);
        }
        write_name(buffer, "id", false);
        write_string(buffer, span.id());
        if let Some(kind) = span.kind() {
            write_name(buffer, "kind", false);
            write_string(buffer, kind.as_str());
        }
        if let Some(name) = span.name() {
            write_name(buffer, "name", false);
            write_string(buffer, name);
        }
        if let Some(timestamp) = span.timestamp() {
            write_name(buffer, "timestamp", false);
            buffer.write_ascii_u64(timestamp);
        }
        if let Some(duration) = span.duration() {
            write_name(buffer, "duration", false);
            buffer.write_ascii_u64(duration);
        }
        if let Some(endpoint) = span.local_endpoint() {
            write_name(buffer, "localEndpoint", false);
            ENDPOINT.write(endpoint, buffer);
        }
        if let Some(endpoint) = span.remote_endpoint() {
            write_name(buffer, "remoteEndpoint", false);
            ENDPOINT.write(endpoint, buffer);
        }
        if !span.annotations().is_empty() {
            write_name(buffer, "annotations", false);
            buffer.write_byte(b'[');
            for (i, annotation) in span.annotations().iter().enumerate() {
                if i > 0 {
                    buffer.write_byte(b',');
                }
                write_annotation(annotation, buffer);
            }
            buffer.write_byte(b']');
        }
        if !span.tags().is_empty() {
            write_name(buffer, "tags", false);
            buffer.write_byte(b'{');
            for (i, (key, value)) in span.tags().iter().enumerate() {
                if i > 0 {
                    buffer.write_byte(b',');
                }
                write_string(buffer, key);
                buffer.write_byte(b':');
                write_string(buffer, value);
            }
            buffer.write_byte(b'}');
        }
        if span.debug() {
            write_name(buffer, "debug", false);
            buffer.write_ascii("true");
        }
        if span.shared() {
            write_name(buffer, "shared", false);
            buffer.write_ascii("true");
        }
        buffer.write_byte(b'}');
    }
}

pub(crate) fn read_span(buffer: ReadBuffer<'_>) -> Result<Span, CodecError> {
    let mut reader = JsonReader::new(buffer);
    let span = read_span_object(&mut reader)?;
    expect_end(&mut reader)?;
    Ok(span)
}

pub(crate) fn read_spans(buffer: ReadBuffer<'_>) -> Result<Vec<Span>, CodecError> {
    let mut reader = JsonReader::new(buffer);
    read_list(&mut reader, read_span_object)
}

fn read_span_object(reader: &mut JsonReader<'_>) -> Result<Span, CodecError> {
    let mut builder = SpanBuilder::default();
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        // Identifiers are required, so a null one is an error rather than absent.
        match name.as_str() {
            "traceId" => {
                builder.trace_id = Some(reader.next_string()?);
                continue;
            }
            "id" => {
                builder.id = Some(reader.next_string()?);
                continue;
            }
            _ => {}
        }
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "parentId" => builder.parent_id = Some(reader.next_string()?),
            "kind" => {
                let kind = reader.next_string()?;
                match Kind::from_str(&kind) {
                    Ok(kind) => builder.kind = Some(kind),
                    Err(_) => log::trace!("ignoring unknown kind {kind}"),
                }
            }
            "name" => builder.name = Some(reader.next_string()?),
            "timestamp" => builder.timestamp = Some(reader.next_u64()?),
            "duration" => builder.duration = Some(reader.next_u64()?),
            "localEndpoint" => builder.local_endpoint = read_endpoint(reader)?,
            "remoteEndpoint" => builder.remote_endpoint = read_endpoint(reader)?,
            "annotations" => {
                reader.begin_array()?;
                while reader.has_next()? {
                    builder.annotations.push(read_annotation(reader)?);
                }
                reader.end_array()?;
            }
            "tags" => {
                reader.begin_object()?;
                while reader.has_next()? {
                    let key = reader.next_name()?;
                    let value = match reader.peek()? {
                        Token::Null => {
                            return Err(CodecError::malformed(format!(
                                "No value at {}",
                                reader.path()
                            )))
                        }
                        Token::Boolean => reader.next_bool()?.to_string(),
                        _ => reader.next_string()?,
                    };
                    builder.tags.insert(key, value);
                }
                reader.end_object()?;
            }
            "debug" => builder.debug = reader.next_bool()?,
            "shared" => builder.shared = reader.next_bool()?,
            _ => reader.skip_value()?,
        }
    }
    reader.end_object()?;
    builder.build()
}

fn read_annotation(reader: &mut JsonReader<'_>) -> Result<Annotation, CodecError> {
    let (mut timestamp, mut value) = (None, None);
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "timestamp" => timestamp = Some(reader.next_u64()?),
            "value" => value = Some(reader.next_string()?),
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
    Ok(Annotation::new(timestamp, value))
}
