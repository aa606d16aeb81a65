use std::any::type_name;

use crate::error::CodecError;

/// Knows how many bytes a value encodes to, and how to write exactly that many.
pub trait Writer<T: ?Sized> {
    fn size_in_bytes(&self, value: &T) -> usize;

    fn write(&self, value: &T, buffer: &mut WriteBuffer<'_>);
}

/// A cursor over a fixed-capacity byte region.
///
/// Writes past the end are dropped and remembered, so the caller can report
/// the writer that disagreed with its own size.
pub struct WriteBuffer<'a> {
    buf: &'a mut [u8],
    start: usize,
    pos: usize,
    overflowed: bool,
}

impl<'a> WriteBuffer<'a> {
    pub fn wrap(buf: &'a mut [u8]) -> Self {
        Self::wrap_at(buf, 0)
    }

    pub fn wrap_at(buf: &'a mut [u8], pos: usize) -> Self {
        let pos = pos.min(buf.len());
        Self {
            buf,
            start: pos,
            pos,
            overflowed: false,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// The bytes written since the buffer was wrapped.
    pub fn written(&self) -> &[u8] {
        &self.buf[self.start..self.pos]
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        if self.pos < self.buf.len() {
            self.buf[self.pos] = b;
            self.pos += 1;
        } else {
            self.overflowed = true;
        }
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end <= self.buf.len() {
            self.buf[self.pos..end].copy_from_slice(bytes);
            self.pos = end;
        } else {
            let fits = self.buf.len() - self.pos;
            self.buf[self.pos..].copy_from_slice(&bytes[..fits]);
            self.pos = self.buf.len();
            self.overflowed = true;
        }
    }

    #[inline]
    pub fn write_ascii(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    #[inline]
    pub fn write_utf8(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Writes the decimal digits of `v`.
    pub fn write_ascii_u64(&mut self, v: u64) {
        let mut scratch = [0u8; 20];
        let mut i = scratch.len();
        let mut v = v;
        loop {
            i -= 1;
            scratch[i] = b'0' + (v % 10) as u8;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        self.write_bytes(&scratch[i..]);
    }

    /// Writes `v` as 16 lower-hex characters.
    pub fn write_lower_hex_u64(&mut self, v: u64) {
        let mut scratch = [0u8; 16];
        match hex::encode_to_slice(v.to_be_bytes(), &mut scratch) {
            Ok(()) => self.write_bytes(&scratch),
            // Surfaces through the size check in `write_exact`.
            Err(_) => self.overflowed = true,
        }
    }

    #[inline]
    pub fn write_varint_u32(&mut self, v: u32) {
        self.write_varint_u64(u64::from(v));
    }

    #[inline]
    pub fn write_varint_u64(&mut self, v: u64) {
        // 10 bytes is the maximum length of a uvarint.
        let mut scratch = [0u8; 10];
        let mut i = 0;
        let mut x = v;
        while x >= 0x80 {
            scratch[i] = x as u8 | 0x80;
            x >>= 7;
            i += 1;
        }
        scratch[i] = x as u8;
        self.write_bytes(&scratch[..=i]);
    }

    #[inline]
    pub fn write_short_be(&mut self, v: i16) {
        self.write_bytes(&v.to_be_bytes());
    }

    #[inline]
    pub fn write_int_be(&mut self, v: i32) {
        self.write_bytes(&v.to_be_bytes());
    }

    #[inline]
    pub fn write_long_be(&mut self, v: u64) {
        self.write_bytes(&v.to_be_bytes());
    }

    #[inline]
    pub fn write_int_le(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_long_le(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }
}

pub fn varint_size_u32(v: u32) -> usize {
    varint_size_u64(u64::from(v))
}

pub fn varint_size_u64(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// The count of decimal digits in `v`.
pub fn ascii_size_in_bytes(v: u64) -> usize {
    let mut digits = 1;
    let mut v = v;
    while v >= 10 {
        v /= 10;
        digits += 1;
    }
    digits
}

/// Encodes `value` into a freshly sized vector.
///
/// # Panics
///
/// If `writer` writes a different number of bytes than it declared.
pub fn write_exact<T: ?Sized, W: Writer<T>>(writer: &W, value: &T, format: &str) -> Vec<u8> {
    let size = writer.size_in_bytes(value);
    let mut out = vec![0u8; size];
    write_checked(writer, value, format, &mut out, 0, size);
    out
}

/// Encodes `value` into `out` at `pos`, returning the number of bytes written.
///
/// The caller's region is checked before writing; a writer disagreeing with
/// itself still panics.
pub fn write_exact_into<T: ?Sized, W: Writer<T>>(
    writer: &W,
    value: &T,
    format: &str,
    out: &mut [u8],
    pos: usize,
) -> Result<usize, CodecError> {
    let size = writer.size_in_bytes(value);
    let available = out.len().saturating_sub(pos);
    if size > available {
        return Err(CodecError::invalid_argument(format!(
            "{size} bytes needed at position {pos} but only {available} available"
        )));
    }
    write_checked(writer, value, format, &mut out[..pos + size], pos, size);
    Ok(size)
}

fn write_checked<T: ?Sized, W: Writer<T>>(
    writer: &W,
    value: &T,
    format: &str,
    out: &mut [u8],
    pos: usize,
    size: usize,
) {
    let mut buffer = WriteBuffer::wrap_at(out, pos);
    writer.write(value, &mut buffer);
    let written = buffer.pos() - pos;
    if buffer.has_overflowed() || written != size {
        let preview = if format == "json" {
            String::from_utf8_lossy(buffer.written()).into_owned()
        } else {
            hex::encode(buffer.written())
        };
        panic!(
            "Bug found using {} to write {} as {}. Wrote {}/{} bytes: {}",
            simple_type_name(type_name::<W>()),
            simple_type_name(type_name::<T>()),
            format,
            written,
            size,
            preview
        );
    }
}

/// Strips module paths from a type name, including inside generics.
fn simple_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else if c == ':' {
            segment.clear();
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}
