use std::borrow::Cow;

use crate::buffer::WriteBuffer;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// The replacement for a char JSON can't carry verbatim, if any.
enum Escape {
    Short(&'static str),
    /// `\u00XX`
    Control(u8),
}

fn escape_for(c: char) -> Option<Escape> {
    match c {
        '"' => Some(Escape::Short("\\\"")),
        '\\' => Some(Escape::Short("\\\\")),
        '\t' => Some(Escape::Short("\\t")),
        '\u{8}' => Some(Escape::Short("\\b")),
        '\n' => Some(Escape::Short("\\n")),
        '\r' => Some(Escape::Short("\\r")),
        '\u{c}' => Some(Escape::Short("\\f")),
        // Valid JSON, but not valid inside a JavaScript string literal.
        '\u{2028}' => Some(Escape::Short("\\u2028")),
        '\u{2029}' => Some(Escape::Short("\\u2029")),
        c if (c as u32) < 0x20 => Some(Escape::Control(c as u8)),
        _ => None,
    }
}

impl Escape {
    fn len(&self) -> usize {
        match self {
            Escape::Short(s) => s.len(),
            Escape::Control(_) => 6,
        }
    }

    fn write(&self, buffer: &mut WriteBuffer<'_>) {
        match self {
            Escape::Short(s) => buffer.write_ascii(s),
            Escape::Control(b) => {
                buffer.write_ascii("\\u00");
                buffer.write_byte(HEX[usize::from(b >> 4)]);
                buffer.write_byte(HEX[usize::from(b & 0xf)]);
            }
        }
    }
}

/// UTF-8 length of `value` once escaped, excluding surrounding quotes.
pub fn json_escaped_size_in_bytes(value: &str) -> usize {
    let mut size = value.len();
    for c in value.chars() {
        if let Some(escape) = escape_for(c) {
            size += escape.len() - c.len_utf8();
        }
    }
    size
}

/// Escapes `value` for use inside a JSON string, borrowing when nothing changes.
pub fn json_escape(value: &str) -> Cow<'_, str> {
    if !value.chars().any(|c| escape_for(c).is_some()) {
        return Cow::Borrowed(value);
    }
    let mut out = vec![0u8; json_escaped_size_in_bytes(value)];
    let mut buffer = WriteBuffer::wrap(&mut out);
    write_escaped(&mut buffer, value);
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// Writes `value` escaped, without surrounding quotes.
pub(crate) fn write_escaped(buffer: &mut WriteBuffer<'_>, value: &str) {
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if let Some(escape) = escape_for(c) {
            buffer.write_utf8(&value[start..i]);
            escape.write(buffer);
            start = i + c.len_utf8();
        }
    }
    buffer.write_utf8(&value[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unescaped_is_borrowed() {
        assert!(matches!(json_escape("hello world"), Cow::Borrowed(_)));
        assert!(matches!(json_escape("\u{2603}"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_short_forms() {
        assert_eq!(json_escape("\"\\\t\u{8}\n\r\u{c}"), r#"\"\\\t\b\n\r\f"#);
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(json_escape("\u{0}\u{1f}"), r"\u0000\u001f");
        assert_eq!(json_escaped_size_in_bytes("\u{0}\u{1f}"), 12);
    }

    #[test]
    fn test_line_separators() {
        assert_eq!(json_escape("a\u{2028}b\u{2029}"), r"a\u2028b\u2029");
        assert_eq!(json_escaped_size_in_bytes("\u{2028}"), 6);
    }

    #[test]
    fn test_output_is_valid_json() {
        let value = "quote\" slash\\ tab\t nul\u{0} ls\u{2028} snow\u{2603}";
        let json = format!("\"{}\"", json_escape(value));
        let parsed: String = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }

    proptest! {
        #[test]
        fn test_size_matches_escape(value in any::<String>()) {
            prop_assert_eq!(json_escaped_size_in_bytes(&value), json_escape(&value).len());
        }

        #[test]
        fn test_escape_parses_back(value in any::<String>()) {
            let json = format!("\"{}\"", json_escape(&value));
            let parsed: String = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
