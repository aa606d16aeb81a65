use bytes::BytesMut;

use super::{BytesEncoder, Encoding};
use crate::buffer::{write_exact, write_exact_into, Writer};
use crate::error::CodecError;
use crate::json::{DependencyLinkWriter, JsonList, V1JsonSpanWriter, V2SpanWriter};
use crate::model::{DependencyLink, Span};
use crate::proto3::{Proto3SpanWriter, Repeated};
use crate::thrift::{ThriftList, V1ThriftSpanWriter};
use crate::v1::V1Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanBytesEncoder {
    /// The legacy JSON schema, with endpoints on each annotation.
    JsonV1,
    JsonV2,
    /// The legacy TBinaryProtocol struct.
    Thrift,
    Proto3,
}

fn to_v1(spans: &[Span]) -> Vec<V1Span> {
    spans.iter().map(V1Span::from).collect()
}

impl SpanBytesEncoder {
    fn format_name(&self) -> &'static str {
        match self {
            SpanBytesEncoder::JsonV1 | SpanBytesEncoder::JsonV2 => "json",
            SpanBytesEncoder::Thrift => "TBinary",
            SpanBytesEncoder::Proto3 => "proto3",
        }
    }

    pub fn list_size_in_bytes(&self, spans: &[Span]) -> usize {
        match self {
            SpanBytesEncoder::JsonV1 => JsonList(V1JsonSpanWriter).size_in_bytes(&to_v1(spans)[..]),
            SpanBytesEncoder::JsonV2 => JsonList(V2SpanWriter).size_in_bytes(spans),
            SpanBytesEncoder::Thrift => {
                ThriftList(V1ThriftSpanWriter).size_in_bytes(&to_v1(spans)[..])
            }
            SpanBytesEncoder::Proto3 => Repeated(Proto3SpanWriter).size_in_bytes(spans),
        }
    }

    /// Encodes a list into `out` at `pos`, returning the bytes written.
    ///
    /// Nothing is written when `out` lacks room for the whole list.
    pub fn encode_list_into(
        &self,
        spans: &[Span],
        out: &mut [u8],
        pos: usize,
    ) -> Result<usize, CodecError> {
        let format = self.format_name();
        match self {
            SpanBytesEncoder::JsonV1 => {
                write_exact_into(&JsonList(V1JsonSpanWriter), &to_v1(spans)[..], format, out, pos)
            }
            SpanBytesEncoder::JsonV2 => write_exact_into(&JsonList(V2SpanWriter), spans, format, out, pos),
            SpanBytesEncoder::Thrift => write_exact_into(
                &ThriftList(V1ThriftSpanWriter),
                &to_v1(spans)[..],
                format,
                out,
                pos,
            ),
            SpanBytesEncoder::Proto3 => {
                write_exact_into(&Repeated(Proto3SpanWriter), spans, format, out, pos)
            }
        }
    }

    /// Appends an encoded list to `out`.
    pub fn encode_list_to(&self, spans: &[Span], out: &mut BytesMut) {
        let start = out.len();
        out.resize(start + self.list_size_in_bytes(spans), 0);
        // The region was sized from the same spans, so it always fits.
        if let Err(err) = self.encode_list_into(spans, out, start) {
            log::debug!("could not encode {} spans: {err}", spans.len());
            out.truncate(start);
        }
    }
}

impl BytesEncoder<Span> for SpanBytesEncoder {
    fn encoding(&self) -> Encoding {
        match self {
            SpanBytesEncoder::JsonV1 | SpanBytesEncoder::JsonV2 => Encoding::Json,
            SpanBytesEncoder::Thrift => Encoding::Thrift,
            SpanBytesEncoder::Proto3 => Encoding::Proto3,
        }
    }

    fn size_in_bytes(&self, span: &Span) -> usize {
        match self {
            SpanBytesEncoder::JsonV1 => Writer::<Span>::size_in_bytes(&V1JsonSpanWriter, span),
            SpanBytesEncoder::JsonV2 => V2SpanWriter.size_in_bytes(span),
            SpanBytesEncoder::Thrift => Writer::<Span>::size_in_bytes(&V1ThriftSpanWriter, span),
            SpanBytesEncoder::Proto3 => Proto3SpanWriter.size_in_bytes(span),
        }
    }

    fn encode(&self, span: &Span) -> Vec<u8> {
        let format = self.format_name();
        match self {
            SpanBytesEncoder::JsonV1 => write_exact(&V1JsonSpanWriter, &V1Span::from(span), format),
            SpanBytesEncoder::JsonV2 => write_exact(&V2SpanWriter, span, format),
            SpanBytesEncoder::Thrift => write_exact(&V1ThriftSpanWriter, &V1Span::from(span), format),
            SpanBytesEncoder::Proto3 => write_exact(&Proto3SpanWriter, span, format),
        }
    }

    fn encode_list(&self, spans: &[Span]) -> Vec<u8> {
        let format = self.format_name();
        match self {
            SpanBytesEncoder::JsonV1 => write_exact(&JsonList(V1JsonSpanWriter), &to_v1(spans)[..], format),
            SpanBytesEncoder::JsonV2 => write_exact(&JsonList(V2SpanWriter), spans, format),
            SpanBytesEncoder::Thrift => {
                write_exact(&ThriftList(V1ThriftSpanWriter), &to_v1(spans)[..], format)
            }
            SpanBytesEncoder::Proto3 => write_exact(&Repeated(Proto3SpanWriter), spans, format),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyLinkBytesEncoder {
    JsonV1,
}

impl BytesEncoder<DependencyLink> for DependencyLinkBytesEncoder {
    fn encoding(&self) -> Encoding {
        Encoding::Json
    }

    fn size_in_bytes(&self, link: &DependencyLink) -> usize {
        DependencyLinkWriter.size_in_bytes(link)
    }

    fn encode(&self, link: &DependencyLink) -> Vec<u8> {
        write_exact(&DependencyLinkWriter, link, "json")
    }

    fn encode_list(&self, links: &[DependencyLink]) -> Vec<u8> {
        write_exact(&JsonList(DependencyLinkWriter), links, "json")
    }
}
