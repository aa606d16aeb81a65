//! Typed proto3 fields.
//!
//! Each field pairs a `size_in_bytes` with a `write` that emits exactly that
//! many bytes. Default values (zero, empty) size to 0 and are not written.

use crate::buffer::{varint_size_u32, varint_size_u64, ReadBuffer, WriteBuffer};
use crate::error::CodecError;
use crate::model::ids::is_lower_hex;

pub const WIRETYPE_VARINT: u8 = 0;
pub const WIRETYPE_FIXED64: u8 = 1;
pub const WIRETYPE_LENGTH_DELIMITED: u8 = 2;
pub const WIRETYPE_FIXED32: u8 = 5;

/// A field key: `(field_number << 3) | wire_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: u32,
    pub field_number: u32,
    pub wire_type: u8,
}

impl Field {
    pub const fn new(key: u32) -> Self {
        Self {
            key,
            field_number: key >> 3,
            wire_type: (key & 7) as u8,
        }
    }

    /// Extracts the field number, rejecting zero.
    pub fn field_number(key: u32, byte_pos: usize) -> Result<u32, CodecError> {
        let field_number = key >> 3;
        if field_number == 0 {
            return Err(CodecError::malformed(format!(
                "Malformed: fieldNumber was zero at byte {byte_pos}"
            )));
        }
        Ok(field_number)
    }

    /// Extracts the wire type, rejecting those this codec doesn't know.
    pub fn wire_type(key: u32, byte_pos: usize) -> Result<u8, CodecError> {
        let wire_type = (key & 7) as u8;
        match wire_type {
            WIRETYPE_VARINT | WIRETYPE_FIXED64 | WIRETYPE_LENGTH_DELIMITED | WIRETYPE_FIXED32 => {
                Ok(wire_type)
            }
            _ => Err(CodecError::malformed(format!(
                "Malformed: invalid wireType {wire_type} at byte {byte_pos}"
            ))),
        }
    }

    /// Reads and validates the next key.
    pub fn read_key(buffer: &mut ReadBuffer<'_>) -> Result<Field, CodecError> {
        let pos = buffer.pos();
        let key = buffer.read_varint32()?;
        Field::field_number(key, pos)?;
        Field::wire_type(key, pos)?;
        Ok(Field::new(key))
    }

    pub fn tag_size(&self) -> usize {
        varint_size_u32(self.key)
    }

    pub fn write_key(&self, buffer: &mut WriteBuffer<'_>) {
        buffer.write_varint_u32(self.key);
    }

    /// Advances past a value of the given wire type.
    pub fn skip_value(buffer: &mut ReadBuffer<'_>, wire_type: u8) -> Result<(), CodecError> {
        match wire_type {
            WIRETYPE_VARINT => {
                buffer.read_varint64()?;
            }
            WIRETYPE_FIXED64 => buffer.skip(8)?,
            WIRETYPE_LENGTH_DELIMITED => {
                let length = read_length_prefix(buffer)?;
                buffer.skip(length)?;
            }
            WIRETYPE_FIXED32 => buffer.skip(4)?,
            _ => {
                return Err(CodecError::malformed(format!(
                    "Malformed: invalid wireType {wire_type} at byte {}",
                    buffer.pos()
                )))
            }
        }
        Ok(())
    }

    /// Size of this key, a length prefix and `length` bytes.
    pub fn length_delimited_size(&self, length: usize) -> usize {
        self.tag_size() + varint_size_u32(length as u32) + length
    }

    pub fn write_length_prefix(&self, buffer: &mut WriteBuffer<'_>, length: usize) {
        self.write_key(buffer);
        buffer.write_varint_u32(length as u32);
    }
}

/// Reads a length prefix and checks that many bytes remain.
pub fn read_length_prefix(buffer: &mut ReadBuffer<'_>) -> Result<usize, CodecError> {
    let length = buffer.read_varint32()? as usize;
    buffer.require(length)?;
    Ok(length)
}

#[derive(Debug, Clone, Copy)]
pub struct VarintField(pub Field);

impl VarintField {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes_u32(&self, value: u32) -> usize {
        if value == 0 {
            0
        } else {
            self.0.tag_size() + varint_size_u32(value)
        }
    }

    pub fn size_in_bytes(&self, value: u64) -> usize {
        if value == 0 {
            0
        } else {
            self.0.tag_size() + varint_size_u64(value)
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: u64) {
        if value == 0 {
            return;
        }
        self.0.write_key(buffer);
        buffer.write_varint_u64(value);
    }

    pub fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<u64, CodecError> {
        buffer.read_varint64()
    }

    pub fn read_u32(&self, buffer: &mut ReadBuffer<'_>) -> Result<u32, CodecError> {
        buffer.read_varint32()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BooleanField(pub Field);

impl BooleanField {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes(&self, value: bool) -> usize {
        if value {
            self.0.tag_size() + 1
        } else {
            0
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: bool) {
        if !value {
            return;
        }
        self.0.write_key(buffer);
        buffer.write_byte(1);
    }

    pub fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<bool, CodecError> {
        let pos = buffer.pos();
        match buffer.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::malformed(format!(
                "Malformed: invalid boolean value {b} at byte {pos}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Fixed64Field(pub Field);

impl Fixed64Field {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes(&self, value: u64) -> usize {
        if value == 0 {
            0
        } else {
            self.0.tag_size() + 8
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: u64) {
        if value == 0 {
            return;
        }
        self.0.write_key(buffer);
        buffer.write_long_le(value);
    }

    pub fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<u64, CodecError> {
        buffer.read_long_le()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Fixed32Field(pub Field);

impl Fixed32Field {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes(&self, value: u32) -> usize {
        if value == 0 {
            0
        } else {
            self.0.tag_size() + 4
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: u32) {
        if value == 0 {
            return;
        }
        self.0.write_key(buffer);
        buffer.write_int_le(value);
    }

    pub fn read(&self, buffer: &mut ReadBuffer<'_>) -> Result<u32, CodecError> {
        buffer.read_int_le()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Utf8Field(pub Field);

impl Utf8Field {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes(&self, value: &str) -> usize {
        if value.is_empty() {
            0
        } else {
            self.0.length_delimited_size(value.len())
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: &str) {
        if value.is_empty() {
            return;
        }
        self.0.write_length_prefix(buffer, value.len());
        buffer.write_utf8(value);
    }

    pub fn read_length_prefix_and_value(
        &self,
        buffer: &mut ReadBuffer<'_>,
    ) -> Result<String, CodecError> {
        let length = read_length_prefix(buffer)?;
        buffer.read_utf8(length)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BytesField(pub Field);

impl BytesField {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    pub fn size_in_bytes(&self, value: &[u8]) -> usize {
        if value.is_empty() {
            0
        } else {
            self.0.length_delimited_size(value.len())
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        self.0.write_length_prefix(buffer, value.len());
        buffer.write_bytes(value);
    }

    pub fn read_length_prefix_and_value<'a>(
        &self,
        buffer: &mut ReadBuffer<'a>,
    ) -> Result<&'a [u8], CodecError> {
        let length = read_length_prefix(buffer)?;
        buffer.read_bytes(length)
    }
}

/// A lower-hex identifier carried on the wire as its raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct HexField(pub Field);

impl HexField {
    pub const fn new(key: u32) -> Self {
        Self(Field::new(key))
    }

    /// Ids that are not whole lower-hex bytes are not written.
    pub fn size_in_bytes(&self, hex: &str) -> usize {
        match raw_length(hex) {
            Some(length) if length > 0 => self.0.length_delimited_size(length),
            _ => 0,
        }
    }

    pub fn write(&self, buffer: &mut WriteBuffer<'_>, hex: &str) {
        let Some(length) = raw_length(hex).filter(|length| *length > 0) else {
            if !hex.is_empty() {
                log::debug!("not writing {hex} as it is not lower-hex");
            }
            return;
        };
        let mut raw = [0u8; 16];
        let raw = &mut raw[..length];
        if let Err(err) = hex::decode_to_slice(hex, raw) {
            log::debug!("not writing {hex}: {err}");
            return;
        }
        self.0.write_length_prefix(buffer, length);
        buffer.write_bytes(raw);
    }

    /// Reads an 8 or 16 byte identifier as lower-hex.
    pub fn read_length_prefix_and_value(
        &self,
        buffer: &mut ReadBuffer<'_>,
    ) -> Result<String, CodecError> {
        let pos = buffer.pos();
        let length = read_length_prefix(buffer)?;
        if length != 8 && length != 16 {
            return Err(CodecError::malformed(format!(
                "Malformed: hex field {} had length {length} at byte {pos}",
                self.0.field_number
            )));
        }
        Ok(hex::encode(buffer.read_bytes(length)?))
    }
}

/// Byte length of an id of at most 16 bytes, or `None` when it is not lower-hex.
fn raw_length(hex: &str) -> Option<usize> {
    (hex.len() % 2 == 0 && hex.len() <= 32 && is_lower_hex(hex)).then_some(hex.len() / 2)
}
