use bytes::Buf;

use super::{BytesDecoder, Encoding};
use crate::buffer::ReadBuffer;
use crate::error::CodecError;
use crate::model::{DependencyLink, Span};
use crate::v1::{self, V1Span};
use crate::{json, proto3, thrift};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanBytesDecoder {
    /// The legacy JSON schema. One input span can yield several spans.
    JsonV1,
    JsonV2,
    /// The legacy TBinaryProtocol struct. One input span can yield several spans.
    Thrift,
    Proto3,
}

fn convert_into(spans: &[V1Span], out: &mut Vec<Span>) -> Result<bool, CodecError> {
    let start = out.len();
    for span in spans {
        out.extend(v1::convert(span)?);
    }
    Ok(out.len() > start)
}

impl SpanBytesDecoder {
    fn format_name(&self) -> &'static str {
        match self {
            SpanBytesDecoder::JsonV1 | SpanBytesDecoder::JsonV2 => "json",
            SpanBytesDecoder::Thrift => "TBinary",
            SpanBytesDecoder::Proto3 => "proto3",
        }
    }

    fn read_one(&self, bytes: &[u8], out: &mut Vec<Span>) -> Result<bool, CodecError> {
        match self {
            SpanBytesDecoder::JsonV1 => {
                let span = json::read_v1_span(ReadBuffer::wrap(bytes))?;
                convert_into(std::slice::from_ref(&span), out)
            }
            SpanBytesDecoder::JsonV2 => {
                out.push(json::read_span(ReadBuffer::wrap(bytes))?);
                Ok(true)
            }
            SpanBytesDecoder::Thrift => {
                let span = thrift::read_span(&mut ReadBuffer::wrap(bytes))?;
                convert_into(std::slice::from_ref(&span), out)
            }
            SpanBytesDecoder::Proto3 => proto3::read_spans(bytes, out, true),
        }
    }

    fn read_list(&self, bytes: &[u8], out: &mut Vec<Span>) -> Result<bool, CodecError> {
        match self {
            SpanBytesDecoder::JsonV1 => {
                convert_into(&json::read_v1_spans(ReadBuffer::wrap(bytes))?, out)
            }
            SpanBytesDecoder::JsonV2 => {
                let spans = json::read_spans(ReadBuffer::wrap(bytes))?;
                let read = !spans.is_empty();
                out.extend(spans);
                Ok(read)
            }
            SpanBytesDecoder::Thrift => {
                convert_into(&thrift::read_span_list(&mut ReadBuffer::wrap(bytes))?, out)
            }
            SpanBytesDecoder::Proto3 => proto3::read_spans(bytes, out, false),
        }
    }

    /// Decodes a list from a possibly fragmented buffer, consuming it.
    pub fn decode_list_buf(&self, mut buf: impl Buf) -> Result<Vec<Span>, CodecError> {
        let bytes = buf.copy_to_bytes(buf.remaining());
        self.decode_list(&bytes)
    }
}

impl BytesDecoder<Span> for SpanBytesDecoder {
    fn encoding(&self) -> Encoding {
        match self {
            SpanBytesDecoder::JsonV1 | SpanBytesDecoder::JsonV2 => Encoding::Json,
            SpanBytesDecoder::Thrift => Encoding::Thrift,
            SpanBytesDecoder::Proto3 => Encoding::Proto3,
        }
    }

    fn decode(&self, bytes: &[u8], out: &mut Vec<Span>) -> Result<bool, CodecError> {
        if bytes.is_empty() {
            return Ok(false);
        }
        self.read_one(bytes, out)
            .map_err(|err| err.reading("Span", self.format_name()))
    }

    fn decode_list_into(&self, bytes: &[u8], out: &mut Vec<Span>) -> Result<bool, CodecError> {
        if bytes.is_empty() {
            return Ok(false);
        }
        self.read_list(bytes, out)
            .map_err(|err| err.reading("List<Span>", self.format_name()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyLinkBytesDecoder {
    JsonV1,
}

impl BytesDecoder<DependencyLink> for DependencyLinkBytesDecoder {
    fn encoding(&self) -> Encoding {
        Encoding::Json
    }

    fn decode(&self, bytes: &[u8], out: &mut Vec<DependencyLink>) -> Result<bool, CodecError> {
        if bytes.is_empty() {
            return Ok(false);
        }
        let link = json::read_link(ReadBuffer::wrap(bytes))
            .map_err(|err| err.reading("DependencyLink", "json"))?;
        out.push(link);
        Ok(true)
    }

    fn decode_list_into(
        &self,
        bytes: &[u8],
        out: &mut Vec<DependencyLink>,
    ) -> Result<bool, CodecError> {
        if bytes.is_empty() {
            return Ok(false);
        }
        let links = json::read_links(ReadBuffer::wrap(bytes))
            .map_err(|err| err.reading("List<DependencyLink>", "json"))?;
        let read = !links.is_empty();
        out.extend(links);
        Ok(read)
    }
}
