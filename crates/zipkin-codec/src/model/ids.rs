//! Lower-hex identifier handling.

use crate::error::CodecError;

/// Parses the low 64 bits of a 1 to 32 character lower-hex string.
pub fn lower_hex_to_unsigned_long(s: &str) -> Result<u64, CodecError> {
    let len = s.len();
    if len == 0 || len > 32 || !s.is_ascii() {
        return Err(not_lower_hex(s));
    }
    // Characters beyond the last 16 are the high bits; they are validated but dropped.
    let low_start = len.saturating_sub(16);
    if !is_lower_hex(&s[..low_start]) {
        return Err(not_lower_hex(s));
    }
    parse_lower_hex(&s[low_start..]).ok_or_else(|| not_lower_hex(s))
}

/// Parses the high 64 bits of a trace id longer than 16 characters, or 0.
pub fn lower_hex_to_unsigned_long_high(s: &str) -> Result<u64, CodecError> {
    let len = s.len();
    if len <= 16 {
        return Ok(0);
    }
    if len > 32 || !s.is_ascii() {
        return Err(not_lower_hex(s));
    }
    parse_lower_hex(&s[..len - 16]).ok_or_else(|| not_lower_hex(s))
}

fn not_lower_hex(s: &str) -> CodecError {
    CodecError::invalid_argument(format!(
        "{s} should be a 1 to 32 character lower-hex string with no prefix"
    ))
}

/// Decodes 1 to 16 lower-hex characters as a big-endian number.
pub(crate) fn parse_lower_hex(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 16 || !is_lower_hex(s) {
        return None;
    }
    let mut padded = [b'0'; 16];
    padded[16 - s.len()..].copy_from_slice(s.as_bytes());
    let mut bytes = [0u8; 8];
    hex::decode_to_slice(padded, &mut bytes).ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// The `hex` crate also accepts upper case, which ids must not use.
pub(crate) fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'))
}

pub(crate) fn to_lower_hex(v: u64) -> String {
    format!("{v:016x}")
}

/// Validates `id` and returns the length of its leading run of zeros.
fn validate_hex_and_count_zero_prefix(id: &str) -> Result<usize, CodecError> {
    if !is_lower_hex(id) {
        return Err(CodecError::invalid_argument(format!(
            "{id} should be lower-hex encoded with no prefix"
        )));
    }
    Ok(id.bytes().take_while(|c| *c == b'0').count())
}

fn pad_left(id: &str, width: usize) -> String {
    format!("{id:0>width$}")
}

pub(crate) fn normalize_trace_id(trace_id: &str) -> Result<String, CodecError> {
    let len = trace_id.len();
    if len == 0 {
        return Err(CodecError::invalid_argument("traceId is empty"));
    }
    if len > 32 {
        return Err(CodecError::invalid_argument("traceId.length > 32"));
    }
    let zeros = validate_hex_and_count_zero_prefix(trace_id)?;
    if zeros == len {
        return Err(CodecError::invalid_argument("traceId is all zeros"));
    }
    Ok(match len {
        32 if zeros >= 16 => trace_id[16..].to_string(),
        16 | 32 => trace_id.to_string(),
        l if l < 16 => pad_left(trace_id, 16),
        _ => pad_left(trace_id, 32),
    })
}

pub(crate) fn normalize_span_id(id: &str, field: &str) -> Result<String, CodecError> {
    let len = id.len();
    if len == 0 {
        return Err(CodecError::invalid_argument(format!("{field} is empty")));
    }
    if len > 16 {
        return Err(CodecError::invalid_argument(format!("{field}.length > 16")));
    }
    let zeros = validate_hex_and_count_zero_prefix(id)?;
    if zeros == len {
        return Err(CodecError::invalid_argument(format!("{field} is all zeros")));
    }
    Ok(pad_left(id, 16))
}

/// Like [`normalize_span_id`], but an all-zeros parent means "no parent".
pub(crate) fn normalize_parent_id(id: &str) -> Result<Option<String>, CodecError> {
    if !id.is_empty() && id.len() <= 16 && id.bytes().all(|c| c == b'0') {
        return Ok(None);
    }
    normalize_span_id(id, "parentId").map(Some)
}
