//! Reader for a single serialized value

use super::value::{ArrayKey, Value};
use crate::error::{Result, SessionError};

/// Nesting limit for arrays and objects
pub(crate) const MAX_DEPTH: usize = 128;

/// Cursor over one serialized value.
///
/// `base` is the absolute offset of `input` inside the enclosing buffer, so
/// error offsets point into the original buffer.
pub(crate) struct ValueParser<'a> {
    input: &'a [u8],
    pos: usize,
    base: usize,
    depth: usize,
}

impl<'a> ValueParser<'a> {
    pub(crate) fn new(input: &'a [u8], base: usize) -> Self {
        Self { input, pos: 0, base, depth: 0 }
    }

    /// Bytes consumed so far
    pub(crate) fn consumed(&self) -> usize {
        self.pos
    }

    fn error(&self, message: impl Into<String>) -> SessionError {
        SessionError::codec(self.base + self.pos, message)
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self.input.get(self.pos).ok_or_else(|| self.error("unexpected end of buffer"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let found = self.next_byte()?;
        if found != expected {
            self.pos -= 1;
            return Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char,
                found.escape_ascii()
            )));
        }
        Ok(())
    }

    /// Take bytes up to (not including) `terminator`, consuming the terminator
    fn take_until(&mut self, terminator: u8) -> Result<&'a [u8]> {
        let input = self.input;
        let rest = &input[self.pos..];
        let len = rest.iter().position(|b| *b == terminator).ok_or_else(|| {
            self.error(format!("missing '{}' terminator", terminator as char))
        })?;
        self.pos += len + 1;
        Ok(&rest[..len])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.input.len());
        let end = end.ok_or_else(|| self.error(format!("declared length {} overruns buffer", len)))?;
        let input = self.input;
        let slice = &input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn int_until(&mut self, terminator: u8) -> Result<i64> {
        let start = self.pos;
        let digits = self.take_until(terminator)?;
        let text = std::str::from_utf8(digits).ok().filter(|t| is_integer_literal(t));
        text.and_then(|t| t.parse::<i64>().ok()).ok_or_else(|| {
            SessionError::codec(self.base + start, format!("invalid integer '{}'", digits.escape_ascii()))
        })
    }

    fn len_until(&mut self, terminator: u8) -> Result<usize> {
        let start = self.pos;
        let len = self.int_until(terminator)?;
        usize::try_from(len)
            .map_err(|_| SessionError::codec(self.base + start, format!("negative length {}", len)))
    }

    /// `"<len bytes>"`
    fn quoted(&mut self, len: usize) -> Result<&'a [u8]> {
        self.expect(b'"')?;
        let bytes = self.take(len)?;
        self.expect(b'"')?;
        Ok(bytes)
    }

    fn class_name(&mut self) -> Result<String> {
        let len = self.len_until(b':')?;
        let name = self.quoted(len)?;
        String::from_utf8(name.to_vec()).map_err(|_| self.error("class name is not UTF-8"))
    }

    /// Parse one complete value starting at the cursor
    pub(crate) fn parse_value(&mut self) -> Result<Value> {
        let tag = self.next_byte()?;
        if tag == b'N' {
            self.expect(b';')?;
            return Ok(Value::Null);
        }
        self.expect(b':')?;

        match tag {
            b'b' => match self.take_until(b';')? {
                b"0" => Ok(Value::Bool(false)),
                b"1" => Ok(Value::Bool(true)),
                other => Err(self.error(format!("invalid boolean '{}'", other.escape_ascii()))),
            },
            b'i' => Ok(Value::Int(self.int_until(b';')?)),
            b'd' => {
                let raw = self.take_until(b';')?;
                parse_float(raw)
                    .map(Value::Float)
                    .ok_or_else(|| self.error(format!("invalid float '{}'", raw.escape_ascii())))
            }
            b's' => {
                let len = self.len_until(b':')?;
                let bytes = self.quoted(len)?;
                self.expect(b';')?;
                Ok(Value::Str(bytes.to_vec()))
            }
            b'a' => {
                let count = self.len_until(b':')?;
                Ok(Value::Array(self.entries(count)?))
            }
            b'O' => {
                let class = self.class_name()?;
                self.expect(b':')?;
                let count = self.len_until(b':')?;
                Ok(Value::Object { class, properties: self.entries(count)? })
            }
            b'C' => {
                let class = self.class_name()?;
                self.expect(b':')?;
                let len = self.len_until(b':')?;
                self.expect(b'{')?;
                let payload = self.take(len)?.to_vec();
                self.expect(b'}')?;
                Ok(Value::Custom { class, payload })
            }
            b'E' => {
                let len = self.len_until(b':')?;
                let name = self.quoted(len)?;
                self.expect(b';')?;
                let name =
                    String::from_utf8(name.to_vec()).map_err(|_| self.error("enum name is not UTF-8"))?;
                Ok(Value::Enum(name))
            }
            b'r' => Ok(Value::Ref(self.int_until(b';')?)),
            b'R' => Ok(Value::RefMut(self.int_until(b';')?)),
            other => {
                self.pos -= 2;
                Err(self.error(format!("unknown value tag '{}'", other.escape_ascii())))
            }
        }
    }

    /// `{key value key value ...}` with `count` pairs
    fn entries(&mut self, count: usize) -> Result<Vec<(ArrayKey, Value)>> {
        self.expect(b'{')?;
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {}", MAX_DEPTH)));
        }

        // Declared counts come from untrusted input, cap the preallocation.
        let mut entries = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let key_offset = self.pos;
            let key = match self.parse_value()? {
                Value::Int(i) => ArrayKey::Int(i),
                Value::Str(s) => ArrayKey::Str(s),
                _ => {
                    return Err(SessionError::codec(
                        self.base + key_offset,
                        "array key must be an integer or a string",
                    ))
                }
            };
            let value = self.parse_value()?;
            entries.push((key, value));
        }

        self.depth -= 1;
        self.expect(b'}')?;
        Ok(entries)
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(&['-', '+'][..]).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_float(raw: &[u8]) -> Option<f64> {
    match raw {
        b"INF" => Some(f64::INFINITY),
        b"-INF" => Some(f64::NEG_INFINITY),
        b"NAN" => Some(f64::NAN),
        _ => {
            let text = std::str::from_utf8(raw).ok()?;
            // Only INF/NAN in upper case are valid, reject `inf`, `infinity`, `nan`.
            if text.is_empty() || text.bytes().any(|b| b.is_ascii_alphabetic() && b != b'E' && b != b'e') {
                return None;
            }
            text.parse::<f64>().ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<(Value, usize)> {
        let mut parser = ValueParser::new(input.as_bytes(), 0);
        let value = parser.parse_value()?;
        Ok((value, parser.consumed()))
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse("N;").unwrap(), (Value::Null, 2));
        assert_eq!(parse("b:0;").unwrap(), (Value::Bool(false), 4));
        assert_eq!(parse("i:-42;rest").unwrap(), (Value::Int(-42), 6));
        assert_eq!(parse("d:1.0E+25;").unwrap(), (Value::Float(1.0e25), 10));
        assert_eq!(parse("d:-INF;").unwrap().0, Value::Float(f64::NEG_INFINITY));
        assert_eq!(parse("s:3:\"a;b\";").unwrap(), (Value::from("a;b"), 10));
    }

    #[test]
    fn test_string_length_is_in_bytes() {
        let (value, consumed) = parse("s:5:\"caf\u{e9}\";").unwrap();
        assert_eq!(value.as_str(), Some("caf\u{e9}"));
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_string_may_contain_delimiters() {
        let (value, _) = parse("s:7:\"a|\"b\";c\";").unwrap();
        assert_eq!(value, Value::from("a|\"b\";c"));
    }

    #[test]
    fn test_parse_nested_structures() {
        let input = "a:2:{i:0;s:1:\"x\";s:4:\"deep\";a:1:{i:0;O:4:\"Cart\":1:{s:1:\"n\";i:2;}}}";
        let (value, consumed) = parse(input).unwrap();
        assert_eq!(consumed, input.len());
        match value {
            Value::Array(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0], (ArrayKey::Int(0), Value::from("x")));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_custom_enum_and_refs() {
        let (value, consumed) = parse("C:3:\"Bag\":5:{ab}cd}").unwrap();
        assert_eq!(value, Value::Custom { class: "Bag".into(), payload: b"ab}cd".to_vec() });
        assert_eq!(consumed, 19);

        assert_eq!(parse("E:10:\"Suit:Heart\";").unwrap().0, Value::Enum("Suit:Heart".into()));
        assert_eq!(parse("r:3;").unwrap().0, Value::Ref(3));
        assert_eq!(parse("R:1;").unwrap().0, Value::RefMut(1));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("x:1;"), Err(SessionError::Codec { offset: 0, .. })));
        assert!(parse("i:abc;").is_err());
        assert!(parse("s:10:\"short\";").is_err());
        assert!(parse("s:-1:\"\";").is_err());
        assert!(parse("b:2;").is_err());
        assert!(parse("a:1:{d:1.5;i:1;}").is_err());
        assert!(parse("d:inf;").is_err());
        assert!(parse("i:5").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let depth = MAX_DEPTH + 1;
        let mut input = String::new();
        for _ in 0..depth {
            input.push_str("a:1:{i:0;");
        }
        input.push_str("N;");
        for _ in 0..depth {
            input.push('}');
        }
        let err = parse(&input).unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }
}
