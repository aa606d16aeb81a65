use crate::error::CodecError;

/// A bounds-checked cursor over a borrowed byte region.
///
/// Every multi-byte read checks the bytes available first, so a short input
/// surfaces as [`CodecError::Truncated`] with the declared length rather than
/// a generic end-of-input.
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]`, reported in error positions.
    base: usize,
}

impl<'a> ReadBuffer<'a> {
    pub fn wrap(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Wraps `length` bytes of `data` starting at `offset`.
    pub fn wrap_range(data: &'a [u8], offset: usize, length: usize) -> Result<Self, CodecError> {
        let end = offset.checked_add(length).filter(|end| *end <= data.len());
        match end {
            Some(end) => Ok(Self {
                data: &data[offset..end],
                pos: 0,
                base: offset,
            }),
            None => Err(CodecError::invalid_argument(format!(
                "range {offset}+{length} exceeds buffer of {} bytes",
                data.len()
            ))),
        }
    }

    /// The absolute position of the cursor.
    pub fn pos(&self) -> usize {
        self.base + self.pos
    }

    pub fn available(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Returns the next byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn require(&self, length: usize) -> Result<(), CodecError> {
        let available = self.available();
        if length > available {
            return Err(CodecError::truncated(length as u64, available));
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        self.require(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], CodecError> {
        self.require(length)?;
        let start = self.pos;
        self.pos += length;
        Ok(&self.data[start..self.pos])
    }

    /// Splits off the next `length` bytes as their own buffer, keeping absolute positions.
    pub fn read_nested(&mut self, length: usize) -> Result<ReadBuffer<'a>, CodecError> {
        let base = self.pos();
        let data = self.read_bytes(length)?;
        Ok(ReadBuffer { data, pos: 0, base })
    }

    pub fn skip(&mut self, length: usize) -> Result<(), CodecError> {
        self.require(length)?;
        self.pos += length;
        Ok(())
    }

    pub fn read_utf8(&mut self, length: usize) -> Result<String, CodecError> {
        let bytes = self.read_bytes(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_short_be(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_int_be(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_long_be(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_int_le(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_long_le(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a varint of at most 5 groups.
    pub fn read_varint32(&mut self) -> Result<u32, CodecError> {
        let start = self.pos();
        let value = self.read_varint(5)?;
        u32::try_from(value)
            .map_err(|_| CodecError::malformed(format!("Greater than 32-bit varint at position {start}")))
    }

    /// Reads a varint of at most 10 groups.
    pub fn read_varint64(&mut self) -> Result<u64, CodecError> {
        self.read_varint(10)
    }

    fn read_varint(&mut self, max_groups: u32) -> Result<u64, CodecError> {
        let start = self.pos();
        let mut result: u64 = 0;
        for group in 0..max_groups {
            let b = self.read_byte()?;
            let shift = 7 * group;
            let bits = u64::from(b & 0x7f);
            // The 10th group of a 64-bit varint only carries one bit.
            if shift == 63 && bits > 1 {
                break;
            }
            result |= bits << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::malformed(format!(
            "Greater than {}-bit varint at position {start}",
            if max_groups == 5 { 32 } else { 64 }
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_read_varint32() {
        // 300 => [0xAC, 0x02]
        let mut buf = ReadBuffer::wrap(&[0xAC, 0x02]);
        assert_eq!(buf.read_varint32().unwrap(), 300);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn test_read_varint32_max() {
        // u32::MAX => 5 groups
        let mut buf = ReadBuffer::wrap(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(buf.read_varint32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_read_varint32_too_many_groups() {
        let mut buf = ReadBuffer::wrap(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        let err = buf.read_varint32().unwrap_err();
        assert_eq!(err.to_string(), "Greater than 32-bit varint at position 0");
    }

    #[test]
    fn test_read_varint32_overflowing_fifth_group() {
        // 5 groups whose value needs 35 bits
        let mut buf = ReadBuffer::wrap(&[0xff, 0xff, 0xff, 0xff, 0x7f]);
        assert_matches!(buf.read_varint32(), Err(CodecError::Malformed { .. }));
    }

    #[test]
    fn test_read_varint64_max() {
        let mut bytes = [0xffu8; 10];
        bytes[9] = 0x01;
        let mut buf = ReadBuffer::wrap(&bytes);
        assert_eq!(buf.read_varint64().unwrap(), u64::MAX);
    }

    #[test]
    fn test_read_varint64_too_many_groups() {
        let bytes = [0xffu8; 11];
        let mut buf = ReadBuffer::wrap(&bytes);
        let err = buf.read_varint64().unwrap_err();
        assert_eq!(err.to_string(), "Greater than 64-bit varint at position 0");
    }

    #[test]
    fn test_read_varint_unterminated_is_truncated() {
        let mut buf = ReadBuffer::wrap(&[0x80, 0x80]);
        assert_matches!(
            buf.read_varint32(),
            Err(CodecError::Truncated {
                length: 1,
                available: 0,
                ..
            })
        );
    }

    #[test]
    fn test_read_bytes_truncated() {
        let mut buf = ReadBuffer::wrap(&[1, 2, 3]);
        let err = buf.read_bytes(8).unwrap_err();
        assert_eq!(err.to_string(), "Truncated: length 8 > bytes available 3");
        // A failed read does not advance.
        assert_eq!(buf.pos(), 0);
    }

    #[test]
    fn test_read_big_endian() {
        let mut buf = ReadBuffer::wrap(&[0x01, 0x02, 0x00, 0x00, 0x00, 0x2a]);
        assert_eq!(buf.read_short_be().unwrap(), 0x0102);
        assert_eq!(buf.read_int_be().unwrap(), 42);
    }

    #[test]
    fn test_read_little_endian() {
        let mut buf = ReadBuffer::wrap(&[0x2a, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0x80]);
        assert_eq!(buf.read_int_le().unwrap(), 42);
        assert_eq!(buf.read_long_le().unwrap(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut buf = ReadBuffer::wrap(b"ab");
        assert_eq!(buf.peek(), Some(b'a'));
        assert_eq!(buf.read_byte().unwrap(), b'a');
        assert_eq!(buf.peek(), Some(b'b'));
        buf.skip(1).unwrap();
        assert_eq!(buf.peek(), None);
    }

    #[test]
    fn test_wrap_range() {
        let data = b"xxhelloxx";
        let mut buf = ReadBuffer::wrap_range(data, 2, 5).unwrap();
        assert_eq!(buf.pos(), 2);
        assert_eq!(buf.read_utf8(5).unwrap(), "hello");
        assert_eq!(buf.pos(), 7);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn test_wrap_range_out_of_bounds() {
        assert_matches!(
            ReadBuffer::wrap_range(b"abc", 2, 5),
            Err(CodecError::InvalidArgument(_))
        );
    }

    #[test]
    fn test_read_nested_keeps_absolute_position() {
        let mut buf = ReadBuffer::wrap(&[9, 9, 1, 2, 3]);
        buf.skip(2).unwrap();
        let mut nested = buf.read_nested(2).unwrap();
        assert_eq!(nested.pos(), 2);
        nested.read_byte().unwrap();
        assert_eq!(nested.pos(), 3);
        assert_eq!(buf.available(), 1);
    }
}
