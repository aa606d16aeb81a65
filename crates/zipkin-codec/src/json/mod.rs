//! JSON encodings, written directly into a pre-sized buffer and read with a
//! pull tokenizer. No intermediate document is built in either direction.

mod dependency;
mod escape;
mod reader;
mod v1;
mod v2;

pub use dependency::DependencyLinkWriter;
pub(crate) use dependency::{read_link, read_links};
pub use escape::{json_escape, json_escaped_size_in_bytes};
pub use reader::{JsonReader, Token};
pub use v1::V1JsonSpanWriter;
pub(crate) use v1::{read_v1_span, read_v1_spans};
pub use v2::V2SpanWriter;
pub(crate) use v2::{read_span, read_spans};

use crate::buffer::{ascii_size_in_bytes, write_exact, WriteBuffer, Writer};
use crate::error::CodecError;
use crate::model::Endpoint;

/// Writes `[a,b,...]` using the element writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonList<W>(pub W);

impl<T, W: Writer<T>> Writer<[T]> for JsonList<W> {
    fn size_in_bytes(&self, values: &[T]) -> usize {
        let commas = values.len().saturating_sub(1);
        2 + commas + values.iter().map(|v| self.0.size_in_bytes(v)).sum::<usize>()
    }

    fn write(&self, values: &[T], buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(b'[');
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                buffer.write_byte(b',');
            }
            self.0.write(value, buffer);
        }
        buffer.write_byte(b']');
    }
}

/// Size of a quoted, escaped string.
pub(crate) fn string_size(value: &str) -> usize {
    2 + json_escaped_size_in_bytes(value)
}

pub(crate) fn write_string(buffer: &mut WriteBuffer<'_>, value: &str) {
    buffer.write_byte(b'"');
    escape::write_escaped(buffer, value);
    buffer.write_byte(b'"');
}

/// Size of `"name":`, with a leading comma unless it is the first member.
pub(crate) fn name_size(name: &str, first: bool) -> usize {
    usize::from(!first) + name.len() + 3
}

pub(crate) fn write_name(buffer: &mut WriteBuffer<'_>, name: &str, first: bool) {
    if !first {
        buffer.write_byte(b',');
    }
    buffer.write_byte(b'"');
    buffer.write_ascii(name);
    buffer.write_ascii("\":");
}

pub(crate) fn number_size(value: u64) -> usize {
    ascii_size_in_bytes(value)
}

/// Writes endpoints as objects. The legacy schema always carries a service name.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndpointWriter {
    pub(crate) always_service_name: bool,
}

impl Writer<Endpoint> for EndpointWriter {
    fn size_in_bytes(&self, endpoint: &Endpoint) -> usize {
        let mut size = 1;
        let mut first = true;
        let service_name = endpoint.service_name();
        if service_name.is_some() || self.always_service_name {
            size += name_size("serviceName", first) + string_size(service_name.unwrap_or(""));
            first = false;
        }
        if let Some(ip) = endpoint.ipv4() {
            size += name_size("ipv4", first) + string_size(&ip);
            first = false;
        }
        if let Some(ip) = endpoint.ipv6() {
            size += name_size("ipv6", first) + string_size(&ip);
            first = false;
        }
        if let Some(port) = endpoint.port() {
            size += name_size("port", first) + number_size(u64::from(port));
        }
        size + 1
    }

    fn write(&self, endpoint: &Endpoint, buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(b'{');
        let mut first = true;
        let service_name = endpoint.service_name();
        if service_name.is_some() || self.always_service_name {
            write_name(buffer, "serviceName", first);
            write_string(buffer, service_name.unwrap_or(""));
            first = false;
        }
        if let Some(ip) = endpoint.ipv4() {
            write_name(buffer, "ipv4", first);
            write_string(buffer, &ip);
            first = false;
        }
        if let Some(ip) = endpoint.ipv6() {
            write_name(buffer, "ipv6", first);
            write_string(buffer, &ip);
            first = false;
        }
        if let Some(port) = endpoint.port() {
            write_name(buffer, "port", first);
            buffer.write_ascii_u64(u64::from(port));
        }
        buffer.write_byte(b'}');
    }
}

pub(crate) fn endpoint_to_json(endpoint: &Endpoint) -> String {
    let writer = EndpointWriter {
        always_service_name: false,
    };
    String::from_utf8_lossy(&write_exact(&writer, endpoint, "json")).into_owned()
}

/// Reads an endpoint object; one with nothing usable in it reads as `None`.
pub(crate) fn read_endpoint(reader: &mut JsonReader<'_>) -> Result<Option<Endpoint>, CodecError> {
    let mut builder = Endpoint::builder();
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "serviceName" => builder.set_service_name(&reader.next_string()?),
            "ipv4" | "ipv6" => {
                let ip = reader.next_string()?;
                if !builder.parse_ip(&ip) {
                    log::trace!("ignoring unparseable ip {ip} at {}", reader.path());
                }
            }
            "port" => builder.set_port(reader.next_i64()?),
            _ => reader.skip_value()?,
        }
    }
    reader.end_object()?;
    builder.build_non_empty()
}

/// Reads `[...]` with `read_item`, requiring nothing after the closing bracket.
pub(crate) fn read_list<'a, T>(
    reader: &mut JsonReader<'a>,
    mut read_item: impl FnMut(&mut JsonReader<'a>) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    let mut values = Vec::new();
    reader.begin_array()?;
    while reader.has_next()? {
        values.push(read_item(reader)?);
    }
    reader.end_array()?;
    expect_end(reader)?;
    Ok(values)
}

pub(crate) fn expect_end(reader: &mut JsonReader<'_>) -> Result<(), CodecError> {
    match reader.peek()? {
        Token::EndDocument => Ok(()),
        other => Err(CodecError::malformed(format!(
            "Expected END_DOCUMENT but was {other} at path {}",
            reader.path()
        ))),
    }
}
