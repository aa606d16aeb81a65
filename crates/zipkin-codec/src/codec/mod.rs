//! One encoder and one decoder per wire format, behind uniform traits, plus
//! a detector that picks the decoder by sniffing the bytes.

mod decoder;
mod detector;
mod encoder;

pub use decoder::{DependencyLinkBytesDecoder, SpanBytesDecoder};
pub use detector::{decoder_for_list_message, decoder_for_message};
pub use encoder::{DependencyLinkBytesEncoder, SpanBytesEncoder};

use crate::error::CodecError;

/// The framing family of an encoding, which decides how lists are delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Json,
    Thrift,
    Proto3,
}

impl Encoding {
    /// Size of a list whose elements encode to `sizes`.
    pub fn list_size_in_bytes(&self, sizes: &[usize]) -> usize {
        let sum = sizes.iter().sum::<usize>();
        match self {
            Encoding::Json => 2 + sum + sizes.len().saturating_sub(1),
            Encoding::Thrift => 5 + sum,
            // Each span is already a complete repeated-field entry.
            Encoding::Proto3 => sum,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Thrift => "application/x-thrift",
            Encoding::Proto3 => "application/x-protobuf",
        }
    }
}

pub trait BytesEncoder<T> {
    fn encoding(&self) -> Encoding;

    fn size_in_bytes(&self, value: &T) -> usize;

    fn encode(&self, value: &T) -> Vec<u8>;

    fn encode_list(&self, values: &[T]) -> Vec<u8>;
}

pub trait BytesDecoder<T> {
    fn encoding(&self) -> Encoding;

    /// Decodes one encoded value into `out`. Returns false on empty input.
    ///
    /// A legacy span may yield more than one value.
    fn decode(&self, bytes: &[u8], out: &mut Vec<T>) -> Result<bool, CodecError>;

    /// Decodes one encoded value, or `None` on empty input.
    fn decode_one(&self, bytes: &[u8]) -> Result<Option<T>, CodecError> {
        let mut out = Vec::with_capacity(1);
        self.decode(bytes, &mut out)?;
        Ok(out.into_iter().next())
    }

    /// Decodes a list into `out`. Returns false when the input held nothing.
    fn decode_list_into(&self, bytes: &[u8], out: &mut Vec<T>) -> Result<bool, CodecError>;

    fn decode_list(&self, bytes: &[u8]) -> Result<Vec<T>, CodecError> {
        let mut out = Vec::new();
        self.decode_list_into(bytes, &mut out)?;
        Ok(out)
    }
}
