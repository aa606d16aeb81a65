use super::*;
use crate::buffer::ReadBuffer;
use crate::model::{DependencyLink, DependencyLinkBuilder};

/// Writes `{"parent":..,"child":..,"callCount":..}`, adding `errorCount` when nonzero.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyLinkWriter;

impl Writer<DependencyLink> for DependencyLinkWriter {
    fn size_in_bytes(&self, link: &DependencyLink) -> usize {
        let mut size = 1
            + name_size("parent", true)
            + string_size(link.parent())
            + name_size("child", false)
            + string_size(link.child())
            + name_size("callCount", false)
            + number_size(link.call_count());
        if link.error_count() > 0 {
            size += name_size("errorCount", false) + number_size(link.error_count());
        }
        size + 1
    }

    fn write(&self, link: &DependencyLink, buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(b'{');
        write_name(buffer, "parent", true);
        write_string(buffer, link.parent());
        write_name(buffer, "child", false);
        write_string(buffer, link.child());
        write_name(buffer, "callCount", false);
        buffer.write_ascii_u64(link.call_count());
        if link.error_count() > 0 {
            write_name(buffer, "errorCount", false);
            buffer.write_ascii_u64(link.error_count());
        }
        buffer.write_byte(b'}');
    }
}

pub(crate) fn read_link(buffer: ReadBuffer<'_>) -> Result<DependencyLink, CodecError> {
    let mut reader = JsonReader::new(buffer);
    let link = read_link_object(&mut reader)?;
    expect_end(&mut reader)?;
    Ok(link)
}

pub(crate) fn read_links(buffer: ReadBuffer<'_>) -> Result<Vec<DependencyLink>, CodecError> {
    let mut reader = JsonReader::new(buffer);
    read_list(&mut reader, read_link_object)
}

fn read_link_object(reader: &mut JsonReader<'_>) -> Result<DependencyLink, CodecError> {
    let mut builder = DependencyLinkBuilder::default();
    reader.begin_object()?;
    while reader.has_next()? {
        let name = reader.next_name()?;
        if reader.skip_null()? {
            continue;
        }
        match name.as_str() {
            "parent" => builder = builder.parent(reader.next_string()?),
            "child" => builder = builder.child(reader.next_string()?),
            "callCount" => builder.call_count = reader.next_u64()?,
            "errorCount" => builder.error_count = reader.next_u64()?,
            _ => reader.skip_value()?,
        }
    }
    reader.end_object()?;
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::write_exact;

    fn link(errors: u64) -> DependencyLink {
        DependencyLink::builder()
            .parent("web")
            .child("app")
            .call_count(10)
            .error_count(errors)
            .build()
            .unwrap()
    }

    #[test]
    fn test_error_count_omitted_when_zero() {
        let json = write_exact(&DependencyLinkWriter, &link(0), "json");
        assert_eq!(json, br#"{"parent":"web","child":"app","callCount":10}"#);

        let json = write_exact(&DependencyLinkWriter, &link(2), "json");
        assert_eq!(
            json,
            br#"{"parent":"web","child":"app","callCount":10,"errorCount":2}"#
        );
    }

    #[test]
    fn test_round_trip_list() {
        let links = vec![link(0), link(3)];
        let json = write_exact(&JsonList(DependencyLinkWriter), &links[..], "json");
        assert_eq!(read_links(ReadBuffer::wrap(&json)).unwrap(), links);
    }

    #[test]
    fn test_missing_parent() {
        let err = read_link(ReadBuffer::wrap(br#"{"child":"app","callCount":1}"#)).unwrap_err();
        assert_eq!(err.to_string(), "Missing: parent");
    }
}
