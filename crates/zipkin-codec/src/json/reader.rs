//! A pull tokenizer over JSON bytes, tracking the path to the current value
//! for error messages such as `Expected a string but was NULL at path $.traceId`.

use std::fmt;

use crate::buffer::ReadBuffer;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name,
    String,
    Number,
    Boolean,
    Null,
    EndDocument,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Token::BeginObject => "BEGIN_OBJECT",
            Token::EndObject => "END_OBJECT",
            Token::BeginArray => "BEGIN_ARRAY",
            Token::EndArray => "END_ARRAY",
            Token::Name => "NAME",
            Token::String => "STRING",
            Token::Number => "NUMBER",
            Token::Boolean => "BOOLEAN",
            Token::Null => "NULL",
            Token::EndDocument => "END_DOCUMENT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    EmptyDocument,
    NonEmptyDocument,
    EmptyArray,
    NonEmptyArray,
    EmptyObject,
    DanglingName,
    NonEmptyObject,
}

/// Where a nesting level is up to, for [`JsonReader::path`].
#[derive(Debug)]
enum PathElement {
    Index(usize),
    Name(Option<String>),
}

/// Structural problems with the bytes themselves. The detail is logged, and
/// callers see a plain `Malformed` naming what they were reading.
fn syntax_error(message: &str, pos: usize) -> CodecError {
    log::debug!("json syntax error: {message} at byte {pos}");
    CodecError::malformed("Malformed")
}

pub struct JsonReader<'a> {
    buffer: ReadBuffer<'a>,
    scopes: Vec<Scope>,
    path: Vec<PathElement>,
    peeked: Option<Token>,
}

impl<'a> JsonReader<'a> {
    pub fn new(buffer: ReadBuffer<'a>) -> Self {
        Self {
            buffer,
            scopes: vec![Scope::EmptyDocument],
            path: Vec::new(),
            peeked: None,
        }
    }

    /// The JSONPath of the value about to be read, e.g. `$.annotations[0].value`.
    pub fn path(&self) -> String {
        let mut path = String::from("$");
        for element in &self.path {
            match element {
                PathElement::Index(i) => path.push_str(&format!("[{i}]")),
                PathElement::Name(Some(name)) => {
                    path.push('.');
                    path.push_str(name);
                }
                PathElement::Name(None) => {}
            }
        }
        path
    }

    pub fn peek(&mut self) -> Result<Token, CodecError> {
        if let Some(token) = self.peeked {
            return Ok(token);
        }
        let token = self.do_peek()?;
        self.peeked = Some(token);
        Ok(token)
    }

    pub fn has_next(&mut self) -> Result<bool, CodecError> {
        let token = self.peek()?;
        Ok(!matches!(
            token,
            Token::EndObject | Token::EndArray | Token::EndDocument
        ))
    }

    pub fn begin_object(&mut self) -> Result<(), CodecError> {
        self.expect(Token::BeginObject, "BEGIN_OBJECT")?;
        self.scopes.push(Scope::EmptyObject);
        self.path.push(PathElement::Name(None));
        Ok(())
    }

    pub fn end_object(&mut self) -> Result<(), CodecError> {
        self.expect(Token::EndObject, "END_OBJECT")?;
        self.scopes.pop();
        self.path.pop();
        self.value_consumed();
        Ok(())
    }

    pub fn begin_array(&mut self) -> Result<(), CodecError> {
        self.expect(Token::BeginArray, "BEGIN_ARRAY")?;
        self.scopes.push(Scope::EmptyArray);
        self.path.push(PathElement::Index(0));
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<(), CodecError> {
        self.expect(Token::EndArray, "END_ARRAY")?;
        self.scopes.pop();
        self.path.pop();
        self.value_consumed();
        Ok(())
    }

    pub fn next_name(&mut self) -> Result<String, CodecError> {
        self.expect(Token::Name, "a name")?;
        let name = self.read_quoted()?;
        if let Some(PathElement::Name(current)) = self.path.last_mut() {
            *current = Some(name.clone());
        }
        Ok(name)
    }

    /// Reads a string, or the text of a number.
    pub fn next_string(&mut self) -> Result<String, CodecError> {
        let value = match self.peek()? {
            Token::String => self.read_quoted()?,
            Token::Number => self.read_number_text()?.to_string(),
            other => return Err(self.unexpected("a string", other)),
        };
        self.peeked = None;
        self.value_consumed();
        Ok(value)
    }

    /// Reads a whole non-negative number, which may also be quoted.
    pub fn next_u64(&mut self) -> Result<u64, CodecError> {
        let text = match self.peek()? {
            Token::Number => self.read_number_text()?.to_string(),
            Token::String => self.read_quoted()?,
            other => return Err(self.unexpected("a long", other)),
        };
        let value = parse_whole(&text)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| self.invalid_number(&text))?;
        self.peeked = None;
        self.value_consumed();
        Ok(value)
    }

    pub fn next_i64(&mut self) -> Result<i64, CodecError> {
        let text = match self.peek()? {
            Token::Number => self.read_number_text()?.to_string(),
            Token::String => self.read_quoted()?,
            other => return Err(self.unexpected("a long", other)),
        };
        let value = parse_whole(&text)
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| self.invalid_number(&text))?;
        self.peeked = None;
        self.value_consumed();
        Ok(value)
    }

    pub fn next_bool(&mut self) -> Result<bool, CodecError> {
        let token = self.peek()?;
        if token != Token::Boolean {
            return Err(self.unexpected("a boolean", token));
        }
        let value = if self.buffer.peek() == Some(b't') {
            self.read_literal("true")?;
            true
        } else {
            self.read_literal("false")?;
            false
        };
        self.peeked = None;
        self.value_consumed();
        Ok(value)
    }

    pub fn next_null(&mut self) -> Result<(), CodecError> {
        let token = self.peek()?;
        if token != Token::Null {
            return Err(self.unexpected("null", token));
        }
        self.read_literal("null")?;
        self.peeked = None;
        self.value_consumed();
        Ok(())
    }

    /// Consumes a `null` if that's what comes next.
    pub fn skip_null(&mut self) -> Result<bool, CodecError> {
        if self.peek()? == Token::Null {
            self.next_null()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skips the next value, including everything nested inside it.
    pub fn skip_value(&mut self) -> Result<(), CodecError> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                Token::BeginObject => {
                    self.begin_object()?;
                    depth += 1;
                }
                Token::BeginArray => {
                    self.begin_array()?;
                    depth += 1;
                }
                Token::EndObject => {
                    self.end_object()?;
                    depth = depth.saturating_sub(1);
                }
                Token::EndArray => {
                    self.end_array()?;
                    depth = depth.saturating_sub(1);
                }
                Token::Name => {
                    self.next_name()?;
                }
                Token::String | Token::Number => {
                    self.next_string()?;
                }
                Token::Boolean => {
                    self.next_bool()?;
                }
                Token::Null => self.next_null()?,
                Token::EndDocument => return Err(syntax_error("end of input", self.buffer.pos())),
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), CodecError> {
        let actual = self.peek()?;
        if actual != token {
            return Err(self.unexpected(what, actual));
        }
        self.peeked = None;
        Ok(())
    }

    fn unexpected(&self, what: &str, actual: Token) -> CodecError {
        CodecError::malformed(format!(
            "Expected {what} but was {actual} at path {}",
            self.path()
        ))
    }

    fn invalid_number(&self, text: &str) -> CodecError {
        CodecError::malformed(format!("Expected a long but was {text} at path {}", self.path()))
    }

    /// Array elements are counted as they complete.
    fn value_consumed(&mut self) {
        if let Some(PathElement::Index(i)) = self.path.last_mut() {
            *i += 1;
        }
    }

    fn set_scope(&mut self, scope: Scope) {
        if let Some(top) = self.scopes.last_mut() {
            *top = scope;
        }
    }

    fn next_non_whitespace(&mut self) -> Option<u8> {
        while let Some(b) = self.buffer.peek() {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                return Some(b);
            }
            let _ = self.buffer.read_byte();
        }
        None
    }

    fn consume(&mut self) {
        let _ = self.buffer.read_byte();
    }

    fn do_peek(&mut self) -> Result<Token, CodecError> {
        let scope = self.scopes.last().copied().unwrap_or(Scope::NonEmptyDocument);
        match scope {
            Scope::EmptyArray => self.set_scope(Scope::NonEmptyArray),
            Scope::NonEmptyArray => match self.next_non_whitespace() {
                Some(b']') => {
                    self.consume();
                    return Ok(Token::EndArray);
                }
                Some(b',') => self.consume(),
                _ => return Err(syntax_error("unterminated array", self.buffer.pos())),
            },
            Scope::EmptyObject | Scope::NonEmptyObject => {
                self.set_scope(Scope::DanglingName);
                if scope == Scope::NonEmptyObject {
                    match self.next_non_whitespace() {
                        Some(b'}') => {
                            self.consume();
                            return Ok(Token::EndObject);
                        }
                        Some(b',') => self.consume(),
                        _ => return Err(syntax_error("unterminated object", self.buffer.pos())),
                    }
                }
                return match self.next_non_whitespace() {
                    Some(b'"') => Ok(Token::Name),
                    Some(b'}') if scope == Scope::EmptyObject => {
                        self.consume();
                        Ok(Token::EndObject)
                    }
                    _ => Err(syntax_error("expected name", self.buffer.pos())),
                };
            }
            Scope::DanglingName => {
                self.set_scope(Scope::NonEmptyObject);
                match self.next_non_whitespace() {
                    Some(b':') => self.consume(),
                    _ => return Err(syntax_error("expected ':'", self.buffer.pos())),
                }
            }
            Scope::EmptyDocument => self.set_scope(Scope::NonEmptyDocument),
            Scope::NonEmptyDocument => {
                return match self.next_non_whitespace() {
                    None => Ok(Token::EndDocument),
                    Some(_) => Err(syntax_error("trailing content", self.buffer.pos())),
                };
            }
        }

        match self.next_non_whitespace() {
            Some(b']') if scope == Scope::EmptyArray => {
                self.consume();
                Ok(Token::EndArray)
            }
            Some(b'"') => Ok(Token::String),
            Some(b'{') => {
                self.consume();
                Ok(Token::BeginObject)
            }
            Some(b'[') => {
                self.consume();
                Ok(Token::BeginArray)
            }
            Some(b't' | b'f') => Ok(Token::Boolean),
            Some(b'n') => Ok(Token::Null),
            Some(b'-' | b'0'..=b'9') => Ok(Token::Number),
            Some(_) => Err(syntax_error("unexpected character", self.buffer.pos())),
            None => Err(syntax_error("end of input", self.buffer.pos())),
        }
    }

    fn read_literal(&mut self, literal: &str) -> Result<(), CodecError> {
        let pos = self.buffer.pos();
        match self.buffer.read_bytes(literal.len()) {
            Ok(bytes) if bytes == literal.as_bytes() => Ok(()),
            _ => Err(syntax_error("invalid literal", pos)),
        }
    }

    fn read_number_text(&mut self) -> Result<&'a str, CodecError> {
        let pos = self.buffer.pos();
        let mut length = 0;
        let mut scan = self.buffer.clone();
        while let Some(b) = scan.peek() {
            if !matches!(b, b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') {
                break;
            }
            let _ = scan.read_byte();
            length += 1;
        }
        let bytes = self.buffer.read_bytes(length)?;
        std::str::from_utf8(bytes).map_err(|_| syntax_error("invalid number", pos))
    }

    /// Reads a quoted string, the cursor being on its opening quote.
    fn read_quoted(&mut self) -> Result<String, CodecError> {
        let start = self.buffer.pos();
        self.consume();
        let mut out = Vec::new();
        loop {
            let b = self
                .buffer
                .read_byte()
                .map_err(|_| syntax_error("unterminated string", start))?;
            match b {
                b'"' => break,
                b'\\' => self.read_escape(&mut out)?,
                b => out.push(b),
            }
        }
        self.peeked = None;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let pos = self.buffer.pos();
        let b = self
            .buffer
            .read_byte()
            .map_err(|_| syntax_error("unterminated escape", pos))?;
        let c = match b {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let unit = self.read_hex4()?;
                if (0xd800..0xdc00).contains(&unit) && self.buffer.peek() == Some(b'\\') {
                    // A high surrogate pairs with the low one that follows.
                    let mut lookahead = self.buffer.clone();
                    let _ = lookahead.read_byte();
                    if lookahead.peek() == Some(b'u') {
                        self.consume();
                        self.consume();
                        let low = self.read_hex4()?;
                        let combined = 0x10000 + ((unit - 0xd800) << 10) + (low.wrapping_sub(0xdc00) & 0x3ff);
                        char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                } else {
                    char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
                }
            }
            _ => return Err(syntax_error("invalid escape", pos)),
        };
        let mut utf8 = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32, CodecError> {
        let pos = self.buffer.pos();
        let bytes = self
            .buffer
            .read_bytes(4)
            .map_err(|_| syntax_error("unterminated escape", pos))?;
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .ok_or_else(|| syntax_error("invalid unicode escape", pos))
    }
}

/// Parses an integer, also accepting a float with no fractional part.
fn parse_whole(text: &str) -> Option<i128> {
    if let Ok(v) = text.parse::<i128>() {
        return Some(v);
    }
    let v = text.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i128)
}
