//! TBinaryProtocol framing for the legacy span and dependency structs.
//!
//! | Element | Layout                                        |
//! |---------|-----------------------------------------------|
//! | field   | type (1), id (2, big-endian), payload         |
//! | struct  | fields, then a STOP byte                      |
//! | list    | element type (1), count (4, big-endian), items |
//! | string  | length (4, big-endian), bytes                 |

mod dependencies;
pub(crate) mod endpoint;
mod span;

pub use span::V1ThriftSpanWriter;
pub(crate) use span::{read_span, read_span_list};

use crate::buffer::{ReadBuffer, WriteBuffer, Writer};
use crate::error::CodecError;

pub const TYPE_STOP: u8 = 0;
pub const TYPE_BOOL: u8 = 2;
pub const TYPE_BYTE: u8 = 3;
pub const TYPE_DOUBLE: u8 = 4;
pub const TYPE_I16: u8 = 6;
pub const TYPE_I32: u8 = 8;
pub const TYPE_I64: u8 = 10;
pub const TYPE_STRING: u8 = 11;
pub const TYPE_STRUCT: u8 = 12;
pub const TYPE_MAP: u8 = 13;
pub const TYPE_SET: u8 = 14;
pub const TYPE_LIST: u8 = 15;

/// Nesting deeper than this while skipping is treated as malformed.
const MAX_SKIP_DEPTH: usize = 64;

/// A field header: type byte then big-endian field id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThriftField {
    pub type_: u8,
    pub id: i16,
}

impl ThriftField {
    pub const SIZE: usize = 3;

    pub const fn new(type_: u8, id: i16) -> Self {
        Self { type_, id }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>) {
        buffer.write_byte(self.type_);
        buffer.write_short_be(self.id);
    }

    /// Reads a header, or a bare STOP byte as a field with id 0.
    pub fn read(buffer: &mut ReadBuffer<'_>) -> Result<ThriftField, CodecError> {
        let type_ = buffer.read_byte()?;
        if type_ == TYPE_STOP {
            return Ok(ThriftField::new(TYPE_STOP, 0));
        }
        Ok(ThriftField::new(type_, buffer.read_short_be()?))
    }
}

/// Skips a value of the given type, recursing into containers.
pub fn skip(buffer: &mut ReadBuffer<'_>, type_: u8) -> Result<(), CodecError> {
    skip_nested(buffer, type_, 0)
}

fn skip_nested(buffer: &mut ReadBuffer<'_>, type_: u8, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_SKIP_DEPTH {
        return Err(CodecError::malformed(format!(
            "Malformed: thrift nesting exceeds {MAX_SKIP_DEPTH} at byte {}",
            buffer.pos()
        )));
    }
    match type_ {
        TYPE_BOOL | TYPE_BYTE => buffer.skip(1),
        TYPE_I16 => buffer.skip(2),
        TYPE_I32 => buffer.skip(4),
        TYPE_DOUBLE | TYPE_I64 => buffer.skip(8),
        TYPE_STRING => {
            let length = read_length(buffer)?;
            buffer.skip(length)
        }
        TYPE_STRUCT => loop {
            let field = ThriftField::read(buffer)?;
            if field.type_ == TYPE_STOP {
                return Ok(());
            }
            skip_nested(buffer, field.type_, depth + 1)?;
        },
        TYPE_MAP => {
            let key_type = buffer.read_byte()?;
            let value_type = buffer.read_byte()?;
            let count = read_length(buffer)?;
            for _ in 0..count {
                skip_nested(buffer, key_type, depth + 1)?;
                skip_nested(buffer, value_type, depth + 1)?;
            }
            Ok(())
        }
        TYPE_SET | TYPE_LIST => {
            let element_type = buffer.read_byte()?;
            let count = read_length(buffer)?;
            for _ in 0..count {
                skip_nested(buffer, element_type, depth + 1)?;
            }
            Ok(())
        }
        other => Err(CodecError::malformed(format!(
            "Malformed: unknown thrift type {other} at byte {}",
            buffer.pos()
        ))),
    }
}

/// Reads a non-negative 32-bit length or count.
fn read_length(buffer: &mut ReadBuffer<'_>) -> Result<usize, CodecError> {
    let pos = buffer.pos();
    let length = buffer.read_int_be()?;
    usize::try_from(length)
        .map_err(|_| CodecError::malformed(format!("Malformed: negative length {length} at byte {pos}")))
}

pub(crate) fn string_size(value: &str) -> usize {
    4 + value.len()
}

pub(crate) fn write_string(buffer: &mut WriteBuffer<'_>, value: &str) {
    write_binary(buffer, value.as_bytes());
}

pub(crate) fn write_binary(buffer: &mut WriteBuffer<'_>, value: &[u8]) {
    buffer.write_int_be(value.len() as i32);
    buffer.write_bytes(value);
}

pub(crate) fn read_binary<'a>(buffer: &mut ReadBuffer<'a>) -> Result<&'a [u8], CodecError> {
    let length = read_length(buffer)?;
    buffer.read_bytes(length)
}

pub(crate) fn read_string(buffer: &mut ReadBuffer<'_>) -> Result<String, CodecError> {
    let length = read_length(buffer)?;
    buffer.read_utf8(length)
}

pub(crate) fn write_list_begin(buffer: &mut WriteBuffer<'_>, element_type: u8, count: usize) {
    buffer.write_byte(element_type);
    buffer.write_int_be(count as i32);
}

/// Reads a list header, returning its element count.
///
/// Struct lists written as type 11 by an old tracer are accepted as structs.
pub(crate) fn read_struct_list_begin(buffer: &mut ReadBuffer<'_>) -> Result<usize, CodecError> {
    let pos = buffer.pos();
    let element_type = buffer.read_byte()?;
    if element_type != TYPE_STRUCT && element_type != TYPE_STRING {
        return Err(CodecError::malformed(format!(
            "Malformed: expected a list of structs but element type was {element_type} at byte {pos}"
        )));
    }
    read_length(buffer)
}

/// Caps preallocation by what the remaining input could possibly hold.
pub(crate) fn capacity_hint(count: usize, buffer: &ReadBuffer<'_>) -> usize {
    count.min(buffer.available())
}

/// Writes a list of structs: element type, count, then each value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThriftList<W>(pub W);

impl<T, W: Writer<T>> Writer<[T]> for ThriftList<W> {
    fn size_in_bytes(&self, values: &[T]) -> usize {
        5 + values.iter().map(|v| self.0.size_in_bytes(v)).sum::<usize>()
    }

    fn write(&self, values: &[T], buffer: &mut WriteBuffer<'_>) {
        write_list_begin(buffer, TYPE_STRUCT, values.len());
        for value in values {
            self.0.write(value, buffer);
        }
    }
}
