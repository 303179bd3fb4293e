//! Serialized session values
//!
//! Each value is self-delimiting: its textual form encodes its own extent, so
//! a reader always knows where the next variable starts.
//!
//! | kind      | form                                   |
//! |-----------|----------------------------------------|
//! | null      | `N;`                                   |
//! | bool      | `b:1;`                                 |
//! | integer   | `i:42;`                                |
//! | float     | `d:0.5;`                               |
//! | string    | `s:5:"hello";` (length in bytes)       |
//! | array     | `a:1:{i:0;s:1:"x";}`                   |
//! | object    | `O:3:"Foo":1:{s:3:"bar";i:1;}`         |
//! | custom    | `C:3:"Foo":4:{data}`                   |
//! | enum case | `E:8:"Suit:Ace";`                      |
//! | reference | `r:2;` / `R:2;`                        |

/// Key of an array or object entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Vec<u8>),
}

impl From<i64> for ArrayKey {
    fn from(key: i64) -> Self {
        ArrayKey::Int(key)
    }
}

impl From<&str> for ArrayKey {
    fn from(key: &str) -> Self {
        ArrayKey::Str(key.as_bytes().to_vec())
    }
}

/// A decoded session value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Byte string; the format does not guarantee UTF-8
    Str(Vec<u8>),
    Array(Vec<(ArrayKey, Value)>),
    Object { class: String, properties: Vec<(ArrayKey, Value)> },
    /// Object with its own opaque serialization
    Custom { class: String, payload: Vec<u8> },
    /// `Class:Case`
    Enum(String),
    /// Back-reference to an earlier value (by value)
    Ref(i64),
    /// Back-reference to an earlier value (by reference)
    RefMut(i64),
}

impl Value {
    /// Build a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into().into_bytes())
    }

    /// String content, if this is a UTF-8 string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Integer content, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Lenient integer conversion used for numeric session fields.
    ///
    /// Integers, finite floats (truncated), booleans and numeric strings convert;
    /// everything else yields `None`.
    pub fn to_int_lossy(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Str(bytes) => {
                let text = std::str::from_utf8(bytes).ok()?.trim();
                text.parse::<i64>().ok().or_else(|| {
                    text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    /// Serialize this value, appending to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.extend_from_slice(b"N;"),
            Value::Bool(b) => {
                out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" });
            }
            Value::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
            Value::Float(f) => out.extend_from_slice(format!("d:{};", format_float(*f)).as_bytes()),
            Value::Str(bytes) => encode_str(bytes, out),
            Value::Array(entries) => {
                out.extend_from_slice(format!("a:{}:{{", entries.len()).as_bytes());
                encode_entries(entries, out);
                out.push(b'}');
            }
            Value::Object { class, properties } => {
                out.extend_from_slice(
                    format!("O:{}:\"{}\":{}:{{", class.len(), class, properties.len()).as_bytes(),
                );
                encode_entries(properties, out);
                out.push(b'}');
            }
            Value::Custom { class, payload } => {
                out.extend_from_slice(
                    format!("C:{}:\"{}\":{}:{{", class.len(), class, payload.len()).as_bytes(),
                );
                out.extend_from_slice(payload);
                out.push(b'}');
            }
            Value::Enum(name) => {
                out.extend_from_slice(format!("E:{}:\"{}\";", name.len(), name).as_bytes())
            }
            Value::Ref(i) => out.extend_from_slice(format!("r:{};", i).as_bytes()),
            Value::RefMut(i) => out.extend_from_slice(format!("R:{};", i).as_bytes()),
        }
    }

    /// Serialized form of this value
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

fn encode_str(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("s:{}:\"", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
    out.extend_from_slice(b"\";");
}

fn encode_entries(entries: &[(ArrayKey, Value)], out: &mut Vec<u8>) {
    for (key, value) in entries {
        match key {
            ArrayKey::Int(i) => out.extend_from_slice(format!("i:{};", i).as_bytes()),
            ArrayKey::Str(s) => encode_str(s, out),
        }
        value.encode_into(out);
    }
}

/// Shortest round-trip float text, switching to `1.0E+25` style outside
/// the `[1e-4, 1e15)` magnitude window.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF".to_string() } else { "-INF".to_string() };
    }
    if f == 0.0 {
        return format!("{}", f);
    }

    let scientific = format!("{:e}", f);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return format!("{}", f),
    };

    if (-4..15).contains(&exponent) {
        format!("{}", f)
    } else {
        let mantissa =
            if mantissa.contains('.') { mantissa.to_string() } else { format!("{}.0", mantissa) };
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}E{}{}", mantissa, sign, exponent.abs())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into_bytes())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(Value::Null.encode(), b"N;");
        assert_eq!(Value::Bool(true).encode(), b"b:1;");
        assert_eq!(Value::Int(-17).encode(), b"i:-17;");
        assert_eq!(Value::Float(0.5).encode(), b"d:0.5;");
        assert_eq!(Value::from("héllo").encode(), "s:6:\"héllo\";".as_bytes());
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1.0E-5");
        assert_eq!(format_float(1e15), "1.0E+15");
        assert_eq!(format_float(1.5e20), "1.5E+20");
        assert_eq!(format_float(123456789012345.0), "123456789012345");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_float(f64::NAN), "NAN");
    }

    #[test]
    fn test_nested_encoding() {
        let value = Value::Array(vec![
            (ArrayKey::Int(0), Value::from("a")),
            (ArrayKey::from("k"), Value::Array(vec![(ArrayKey::Int(1), Value::Null)])),
        ]);
        assert_eq!(value.encode(), b"a:2:{i:0;s:1:\"a\";s:1:\"k\";a:1:{i:1;N;}}");

        let object = Value::Object {
            class: "Cart".to_string(),
            properties: vec![(ArrayKey::from("items"), Value::Int(3))],
        };
        assert_eq!(object.encode(), b"O:4:\"Cart\":1:{s:5:\"items\";i:3;}");
    }

    #[test]
    fn test_to_int_lossy() {
        assert_eq!(Value::Int(7).to_int_lossy(), Some(7));
        assert_eq!(Value::from("42").to_int_lossy(), Some(42));
        assert_eq!(Value::from(" 12 ").to_int_lossy(), Some(12));
        assert_eq!(Value::from("3.9").to_int_lossy(), Some(3));
        assert_eq!(Value::Float(9.99).to_int_lossy(), Some(9));
        assert_eq!(Value::Bool(true).to_int_lossy(), Some(1));
        assert_eq!(Value::from("alice").to_int_lossy(), None);
        assert_eq!(Value::Null.to_int_lossy(), None);
        assert_eq!(Value::Array(vec![]).to_int_lossy(), None);
    }
}
