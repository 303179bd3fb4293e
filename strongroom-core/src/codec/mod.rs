//! Session variable buffer codec
//!
//! A buffer is a flat run of `name|<serialized value>` pairs with no
//! separator between pairs: each value's serialization determines where it
//! ends, so the next name starts right after it.
//!
//! ```text
//! id_user|i:7;ua|s:11:"Mozilla/5.0";cart|a:1:{i:0;s:3:"tea";}
//! ```
//!
//! Names never contain `|`. A name prefixed with `!` marks an unset
//! variable and carries no value.

mod parser;
mod value;

pub use value::{ArrayKey, Value};

use crate::error::{Result, SessionError};
use parser::ValueParser;

/// Delimiter between a variable name and its serialized value
pub const DELIMITER: u8 = b'|';

/// Prefix marking a variable that was unset
pub const UNDEF_MARKER: u8 = b'!';

/// Ordered mapping of session variable names to values.
///
/// Insertion order is preserved; inserting an existing name replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarMap {
    entries: Vec<(String, Value)>,
}

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Insert or replace a variable, returning the previous value.
    ///
    /// Names the buffer format cannot carry are refused, see [`is_valid_name`].
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(SessionError::InvalidName(name));
        }
        Ok(self.put(name, value.into()))
    }

    /// Insert without checking the name
    pub(crate) fn put(&mut self, name: String, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Serialize into a host-compatible buffer
    pub fn encode(&self) -> Vec<u8> {
        encode(self)
    }
}

/// Whether `name` survives an encode/decode round trip.
///
/// A `|` would end the name early and a leading `!` reads back as the unset
/// marker, so both are refused.
pub fn is_valid_name(name: &str) -> bool {
    !name.contains(DELIMITER as char) && !name.starts_with(UNDEF_MARKER as char)
}

/// Decode a variable buffer.
///
/// Scans iteratively: find the next delimiter, take the name before it,
/// parse one value right after it and continue past the bytes that value
/// consumed. Bytes after the last complete pair that contain no delimiter
/// are ignored. Later duplicates of a name win.
pub fn decode(buffer: &[u8]) -> Result<VarMap> {
    let mut vars = VarMap::new();
    let mut offset = 0;

    while let Some(found) = buffer[offset..].iter().position(|b| *b == DELIMITER) {
        let delimiter = offset + found;
        let raw_name = &buffer[offset..delimiter];

        if raw_name.first() == Some(&UNDEF_MARKER) {
            offset = delimiter + 1;
            continue;
        }

        let name = String::from_utf8_lossy(raw_name).into_owned();
        let start = delimiter + 1;
        let mut parser = ValueParser::new(&buffer[start..], start);
        let value = parser.parse_value()?;
        offset = start + parser.consumed();

        // Cut at the first delimiter and not a marker, so always valid.
        vars.put(name, value);
    }

    Ok(vars)
}

/// Encode variables into a buffer that `decode` reads back
pub fn encode(vars: &VarMap) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in vars.iter() {
        out.extend_from_slice(name.as_bytes());
        out.push(DELIMITER);
        value.encode_into(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn test_empty_buffer() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_decode_flat_buffer() {
        let buffer = b"id_user|i:7;ua|s:11:\"Mozilla/5.0\";fp|s:3:\"abc\";";
        let vars = decode(buffer).unwrap();

        assert_eq!(vars.len(), 3);
        assert_eq!(vars.get("id_user"), Some(&Value::Int(7)));
        assert_eq!(vars.get("ua").and_then(Value::as_str), Some("Mozilla/5.0"));
        assert_eq!(vars.get("fp").and_then(Value::as_str), Some("abc"));
    }

    #[test]
    fn test_values_containing_delimiter() {
        // The value itself holds `|` and something that looks like a pair.
        let buffer = b"note|s:8:\"x|i:1;y|\";id_user|i:3;";
        let vars = decode(buffer).unwrap();

        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("note").and_then(Value::as_str), Some("x|i:1;y|"));
        assert_eq!(vars.get("id_user"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let vars = decode(b"a|i:1;b|N;a|i:2;").unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("a"), Some(&Value::Int(2)));
        assert_eq!(vars.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_undefined_marker_is_skipped() {
        let vars = decode(b"!gone|id_user|i:4;").unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("id_user"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_trailing_garbage_without_delimiter_is_ignored() {
        let vars = decode(b"a|b:1;trailing").unwrap();
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_malformed_value_reports_absolute_offset() {
        let err = decode(b"a|i:1;b|q:2;").unwrap_err();
        match err {
            SessionError::Codec { offset, .. } => assert_eq!(offset, 8),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_encode_matches_host_format() {
        let mut vars = VarMap::new();
        vars.insert("id_user", 7).unwrap();
        vars.insert("ua", "curl/8.0").unwrap();
        vars.insert("flags", Value::Array(vec![(ArrayKey::Int(0), Value::Bool(true))])).unwrap();

        let buffer = vars.encode();
        assert_eq!(buffer, b"id_user|i:7;ua|s:8:\"curl/8.0\";flags|a:1:{i:0;b:1;}");
        assert_eq!(decode(&buffer).unwrap(), vars);
    }

    #[test]
    fn test_large_buffer_decodes_without_recursion() {
        let mut buffer = Vec::new();
        for i in 0..5_000 {
            buffer.extend_from_slice(format!("v{}|i:{};", i, i).as_bytes());
        }
        let vars = decode(&buffer).unwrap();
        assert_eq!(vars.len(), 5_000);
        assert_eq!(vars.get("v4999"), Some(&Value::Int(4_999)));
    }

    #[test]
    fn test_varmap_replace_keeps_position() {
        let mut vars = VarMap::new();
        vars.insert("a", 1).unwrap();
        vars.insert("b", 2).unwrap();
        assert_eq!(vars.insert("a", 3).unwrap(), Some(Value::Int(1)));
        assert_eq!(vars.iter().next(), Some(("a", &Value::Int(3))));
        assert_eq!(vars.remove("a"), Some(Value::Int(3)));
        assert!(!vars.contains("a"));
    }

    #[test]
    fn test_names_the_format_cannot_carry_are_refused() {
        let mut vars = VarMap::new();
        vars.insert("cart", 3).unwrap();

        for bad in ["a|b", "!flag", "|"] {
            let err = vars.insert(bad, 1).unwrap_err();
            assert!(matches!(err, SessionError::InvalidName(ref n) if n == bad));
        }
        // Interior `!` is fine.
        vars.insert("not!first", 2).unwrap();

        let decoded = decode(&vars.encode()).unwrap();
        assert_eq!(decoded, vars);
        assert_eq!(decoded.get("cart"), Some(&Value::Int(3)));
    }
}
