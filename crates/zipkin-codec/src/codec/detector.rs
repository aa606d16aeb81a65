use super::SpanBytesDecoder;
use crate::buffer::ReadBuffer;
use crate::error::CodecError;
use crate::thrift::{TYPE_STRING, TYPE_STRUCT};

/// Field 1 of `ListOfSpans` and of `Span`, both length-delimited.
const PROTO3_FIRST_KEY: u8 = 10;

/// Keys only a V2 JSON span carries.
const JSON_V2_MARKERS: [&[u8]; 4] = [b"Endpoint\":", b"\"tags\":", b"\"kind\":", b"\"shared\":"];

/// Picks the decoder for bytes holding a single span.
///
/// Formats without a single-span form are unsupported, and list encodings of
/// the others are rejected.
pub fn decoder_for_message(bytes: &[u8]) -> Result<SpanBytesDecoder, CodecError> {
    let decoder = detect(bytes)?;
    // A proto3 span is encoded the same way as a list of one.
    if decoder == SpanBytesDecoder::Proto3 {
        return Err(unsupported_single(decoder));
    }
    if is_list(bytes) {
        return Err(CodecError::invalid_argument(
            "Expected json or thrift object, not list encoding",
        ));
    }
    if decoder == SpanBytesDecoder::JsonV2 {
        return Err(unsupported_single(decoder));
    }
    Ok(decoder)
}

/// Picks the decoder for bytes holding a list of spans.
pub fn decoder_for_list_message(bytes: &[u8]) -> Result<SpanBytesDecoder, CodecError> {
    let decoder = detect(bytes)?;
    if decoder != SpanBytesDecoder::Proto3 && !is_list(bytes) {
        return Err(CodecError::invalid_argument(
            "Expected json or thrift list encoding",
        ));
    }
    Ok(decoder)
}

fn unsupported_single(decoder: SpanBytesDecoder) -> CodecError {
    CodecError::Unsupported(format!("{decoder:?} is only supported as a list of spans"))
}

fn is_list(bytes: &[u8]) -> bool {
    matches!(bytes.first(), Some(&b'[' | &TYPE_STRUCT | &TYPE_STRING))
}

fn detect(bytes: &[u8]) -> Result<SpanBytesDecoder, CodecError> {
    let decoder = match bytes.first() {
        None => return Err(CodecError::malformed("Empty message")),
        Some(_) if looks_like_proto3(bytes) => SpanBytesDecoder::Proto3,
        // Thrift starts with a field or list element type code.
        Some(&first) if first <= 16 => SpanBytesDecoder::Thrift,
        Some(b'{' | b'[') if contains_v2_marker(bytes) => SpanBytesDecoder::JsonV2,
        Some(b'{' | b'[') => SpanBytesDecoder::JsonV1,
        _ => return Err(CodecError::malformed("Could not detect the span format")),
    };
    log::debug!("detected {decoder:?} in {} bytes", bytes.len());
    Ok(decoder)
}

/// Matches a `ListOfSpans` whose first span opens with a 64 or 128-bit trace ID.
fn looks_like_proto3(bytes: &[u8]) -> bool {
    let mut buffer = ReadBuffer::wrap(bytes);
    if buffer.read_byte().ok() != Some(PROTO3_FIRST_KEY) {
        return false;
    }
    match buffer.read_varint32() {
        Ok(length) if length > 0 && length as usize <= buffer.available() => {}
        _ => return false,
    }
    if buffer.read_byte().ok() != Some(PROTO3_FIRST_KEY) {
        return false;
    }
    matches!(buffer.read_byte(), Ok(8 | 16))
}

fn contains_v2_marker(bytes: &[u8]) -> bool {
    JSON_V2_MARKERS
        .iter()
        .any(|marker| bytes.windows(marker.len()).any(|window| window == *marker))
}
