use super::*;
use crate::model::Endpoint;

const IPV4: ThriftField = ThriftField::new(TYPE_I32, 1);
const PORT: ThriftField = ThriftField::new(TYPE_I16, 2);
const SERVICE_NAME: ThriftField = ThriftField::new(TYPE_STRING, 3);
const IPV6: ThriftField = ThriftField::new(TYPE_STRING, 4);

pub(crate) fn size_in_bytes(endpoint: &Endpoint) -> usize {
    let mut size = ThriftField::SIZE + 4 // ipv4
        + ThriftField::SIZE + 2 // port
        + ThriftField::SIZE + string_size(endpoint.service_name().unwrap_or(""));
    if endpoint.ipv6_addr().is_some() {
        size += ThriftField::SIZE + 4 + 16;
    }
    size + 1
}

/// Absent values are written as zero or empty; the legacy struct has no optionals.
pub(crate) fn write(endpoint: &Endpoint, buffer: &mut WriteBuffer<'_>) {
    IPV4.write(buffer);
    buffer.write_int_be(endpoint.ipv4_bytes().map_or(0, i32::from_be_bytes));

    PORT.write(buffer);
    buffer.write_short_be(endpoint.port().unwrap_or(0) as i16);

    SERVICE_NAME.write(buffer);
    write_string(buffer, endpoint.service_name().unwrap_or(""));

    if let Some(ip) = endpoint.ipv6_bytes() {
        IPV6.write(buffer);
        write_binary(buffer, &ip);
    }
    buffer.write_byte(TYPE_STOP);
}

/// Reads an endpoint struct, returning `None` when nothing in it was set.
pub(crate) fn read(buffer: &mut ReadBuffer<'_>) -> Result<Option<Endpoint>, CodecError> {
    let mut builder = Endpoint::builder();
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_I32) => {
                let ipv4 = buffer.read_int_be()?;
                if ipv4 != 0 {
                    builder.parse_ip_bytes(&ipv4.to_be_bytes());
                }
            }
            // Ports above 32767 arrive negative.
            (2, TYPE_I16) => builder.set_port(i64::from(buffer.read_short_be()? as u16)),
            (3, TYPE_STRING) => builder.set_service_name(&read_string(buffer)?),
            (4, TYPE_STRING) => {
                let ipv6 = read_binary(buffer)?;
                if !builder.parse_ip_bytes(ipv6) {
                    log::trace!("ignoring ipv6 of {} bytes", ipv6.len());
                }
            }
            _ => skip(buffer, field.type_)?,
        }
    }
    builder.build_non_empty()
}
