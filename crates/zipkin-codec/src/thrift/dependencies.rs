use bytes::Bytes;

use super::*;
use crate::buffer::write_exact;
use crate::model::{Dependencies, DependencyLink};

const START_TS: ThriftField = ThriftField::new(TYPE_I64, 1);
const END_TS: ThriftField = ThriftField::new(TYPE_I64, 2);
const LINKS: ThriftField = ThriftField::new(TYPE_LIST, 3);

const PARENT: ThriftField = ThriftField::new(TYPE_STRING, 1);
const CHILD: ThriftField = ThriftField::new(TYPE_STRING, 2);
const CALL_COUNT: ThriftField = ThriftField::new(TYPE_I64, 4);
const ERROR_COUNT: ThriftField = ThriftField::new(TYPE_I64, 5);

struct LinkWriter;

impl Writer<DependencyLink> for LinkWriter {
    fn size_in_bytes(&self, link: &DependencyLink) -> usize {
        let mut size = ThriftField::SIZE
            + string_size(link.parent())
            + ThriftField::SIZE
            + string_size(link.child())
            + ThriftField::SIZE
            + 8;
        if link.error_count() > 0 {
            size += ThriftField::SIZE + 8;
        }
        size + 1
    }

    fn write(&self, link: &DependencyLink, buffer: &mut WriteBuffer<'_>) {
        PARENT.write(buffer);
        write_string(buffer, link.parent());
        CHILD.write(buffer);
        write_string(buffer, link.child());
        CALL_COUNT.write(buffer);
        buffer.write_long_be(link.call_count());
        if link.error_count() > 0 {
            ERROR_COUNT.write(buffer);
            buffer.write_long_be(link.error_count());
        }
        buffer.write_byte(TYPE_STOP);
    }
}

struct DependenciesWriter;

impl Writer<Dependencies> for DependenciesWriter {
    fn size_in_bytes(&self, value: &Dependencies) -> usize {
        2 * (ThriftField::SIZE + 8)
            + ThriftField::SIZE
            + ThriftList(LinkWriter).size_in_bytes(value.links())
            + 1
    }

    fn write(&self, value: &Dependencies, buffer: &mut WriteBuffer<'_>) {
        START_TS.write(buffer);
        buffer.write_long_be(value.start_ts());
        END_TS.write(buffer);
        buffer.write_long_be(value.end_ts());
        LINKS.write(buffer);
        ThriftList(LinkWriter).write(value.links(), buffer);
        buffer.write_byte(TYPE_STOP);
    }
}

fn read_link(buffer: &mut ReadBuffer<'_>) -> Result<DependencyLink, CodecError> {
    let mut builder = DependencyLink::builder();
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_STRING) => builder = builder.parent(read_string(buffer)?),
            (2, TYPE_STRING) => builder = builder.child(read_string(buffer)?),
            (4, TYPE_I64) => builder = builder.call_count(buffer.read_long_be()?),
            (5, TYPE_I64) => builder = builder.error_count(buffer.read_long_be()?),
            _ => skip(buffer, field.type_)?,
        }
    }
    builder.build()
}

fn read_dependencies(buffer: &mut ReadBuffer<'_>) -> Result<Dependencies, CodecError> {
    let (mut start_ts, mut end_ts, mut links) = (0, 0, Vec::new());
    loop {
        let field = ThriftField::read(buffer)?;
        if field.type_ == TYPE_STOP {
            break;
        }
        match (field.id, field.type_) {
            (1, TYPE_I64) => start_ts = buffer.read_long_be()?,
            (2, TYPE_I64) => end_ts = buffer.read_long_be()?,
            (3, TYPE_LIST) => {
                let count = read_struct_list_begin(buffer)?;
                links.reserve(capacity_hint(count, buffer));
                for _ in 0..count {
                    links.push(read_link(buffer)?);
                }
            }
            _ => skip(buffer, field.type_)?,
        }
    }
    Ok(Dependencies::create(start_ts, end_ts, links))
}

impl Dependencies {
    /// Encodes as the TBinaryProtocol `Dependencies` struct.
    pub fn to_thrift(&self) -> Bytes {
        Bytes::from(write_exact(&DependenciesWriter, self, "TBinary"))
    }

    pub fn from_thrift(bytes: &[u8]) -> Result<Dependencies, CodecError> {
        read_dependencies(&mut ReadBuffer::wrap(bytes))
            .map_err(|e| e.reading("Dependencies", "TBinary"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(parent: &str, child: &str, calls: u64, errors: u64) -> DependencyLink {
        DependencyLink::builder()
            .parent(parent)
            .child(child)
            .call_count(calls)
            .error_count(errors)
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dependencies = Dependencies::create(
            1_472_428_800_000,
            1_472_515_200_000,
            vec![link("web", "app", 10, 0), link("app", "db", 7, 2)],
        );
        let bytes = dependencies.to_thrift();
        assert_eq!(Dependencies::from_thrift(&bytes).unwrap(), dependencies);
    }

    #[test]
    fn test_link_bytes() {
        let bytes = Dependencies::create(1, 2, vec![link("a", "b", 3, 0)]).to_thrift();

        #[rustfmt::skip]
        assert_eq!(&bytes[..], [
            TYPE_I64, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1,
            TYPE_I64, 0, 2, 0, 0, 0, 0, 0, 0, 0, 2,
            TYPE_LIST, 0, 3, TYPE_STRUCT, 0, 0, 0, 1,
            TYPE_STRING, 0, 1, 0, 0, 0, 1, b'a',
            TYPE_STRING, 0, 2, 0, 0, 0, 1, b'b',
            TYPE_I64, 0, 4, 0, 0, 0, 0, 0, 0, 0, 3,
            TYPE_STOP,
            TYPE_STOP,
        ]);
    }

    #[test]
    fn test_missing_child_is_malformed() {
        #[rustfmt::skip]
        let bytes = [
            TYPE_LIST, 0, 3, TYPE_STRUCT, 0, 0, 0, 1,
            TYPE_STRING, 0, 1, 0, 0, 0, 1, b'a',
            TYPE_STOP,
            TYPE_STOP,
        ];
        let err = Dependencies::from_thrift(&bytes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing: child reading Dependencies from TBinary"
        );
    }

    #[test]
    fn test_truncated() {
        let bytes = Dependencies::create(1, 2, vec![link("a", "b", 3, 0)]).to_thrift();
        let err = Dependencies::from_thrift(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(err.is_truncated());
    }
}
