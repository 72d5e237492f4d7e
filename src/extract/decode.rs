//! Decoding of stored meta values into the `RawValue` tree.
//!
//! Submission meta is stored as plain text, serialized PHP, or JSON. Anything
//! that fails to decode is kept verbatim as a string.

use crate::types::RawValue;
use indexmap::IndexMap;

const MAX_DEPTH: usize = 64;

/// Decode a stored meta value. Non-string values pass through unchanged.
pub fn decode_meta_value(value: &RawValue) -> RawValue {
    match value {
        RawValue::String(s) => decode_str(s),
        other => other.clone(),
    }
}

/// Serialized PHP first, then one level of JSON for JSON-looking strings
pub fn decode_str(input: &str) -> RawValue {
    let value = unserialize(input).unwrap_or_else(|| RawValue::String(input.to_string()));

    if let RawValue::String(text) = &value {
        if let Some(decoded) = decode_json(text) {
            return decoded;
        }
    }

    value
}

fn decode_json(text: &str) -> Option<RawValue> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .map(from_json)
}

fn from_json(value: serde_json::Value) -> RawValue {
    use serde_json::Value;

    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Int(i),
            None => RawValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => RawValue::String(s),
        Value::Array(items) => RawValue::List(items.into_iter().map(from_json).collect()),
        Value::Object(map) => RawValue::Map(
            map.into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect(),
        ),
    }
}

/// Cheap shape check before attempting a full parse
fn looks_serialized(data: &str) -> bool {
    if data == "N;" {
        return true;
    }
    let bytes = data.as_bytes();
    if bytes.len() < 4 || bytes[1] != b':' {
        return false;
    }
    matches!(bytes[0], b'a' | b'O' | b's' | b'b' | b'i' | b'd')
        && matches!(bytes[bytes.len() - 1], b';' | b'}')
}

/// Parse serialized PHP data. `None` when the input is not (valid) serialized data.
pub fn unserialize(input: &str) -> Option<RawValue> {
    let data = input.trim();
    if !looks_serialized(data) {
        return None;
    }

    let mut parser = Parser {
        bytes: data.as_bytes(),
        pos: 0,
    };
    let value = parser.value(0)?;
    (parser.pos == parser.bytes.len()).then_some(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        (self.next()? == byte).then_some(())
    }

    /// Text up to (not including) `delim`; consumes the delimiter
    fn read_until(&mut self, delim: u8) -> Option<&'a str> {
        let rest = self.bytes.get(self.pos..)?;
        let len = rest.iter().position(|&b| b == delim)?;
        let text = std::str::from_utf8(&rest[..len]).ok()?;
        self.pos += len + 1;
        Some(text)
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.bytes.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(slice)
    }

    fn value(&mut self, depth: usize) -> Option<RawValue> {
        if depth > MAX_DEPTH {
            return None;
        }

        match self.next()? {
            b'N' => {
                self.expect(b';')?;
                Some(RawValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.read_until(b';')? {
                    "0" => Some(RawValue::Bool(false)),
                    "1" => Some(RawValue::Bool(true)),
                    _ => None,
                }
            }
            b'i' => {
                self.expect(b':')?;
                self.read_until(b';')?.parse().ok().map(RawValue::Int)
            }
            b'd' => {
                self.expect(b':')?;
                let number = match self.read_until(b';')? {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    other => other.parse().ok()?,
                };
                Some(RawValue::Float(number))
            }
            b's' => {
                self.expect(b':')?;
                let text = self.length_prefixed()?;
                self.expect(b';')?;
                Some(RawValue::String(text))
            }
            b'a' => {
                self.expect(b':')?;
                let count: usize = self.read_until(b':')?.parse().ok()?;
                self.members(count, depth)
            }
            b'O' => {
                self.expect(b':')?;
                // class name is irrelevant, objects decode like arrays
                self.length_prefixed()?;
                self.expect(b':')?;
                let count: usize = self.read_until(b':')?.parse().ok()?;
                self.members(count, depth)
            }
            _ => None,
        }
    }

    /// `<len>:"<bytes>"`
    fn length_prefixed(&mut self) -> Option<String> {
        let len: usize = self.read_until(b':')?.parse().ok()?;
        self.expect(b'"')?;
        let raw = self.take(len)?;
        self.expect(b'"')?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }

    /// `{key;value...}` with `count` pairs
    fn members(&mut self, count: usize, depth: usize) -> Option<RawValue> {
        self.expect(b'{')?;
        let mut map = IndexMap::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = match self.value(depth + 1)? {
                RawValue::Int(i) => i.to_string(),
                // private and protected properties carry a "\0Class\0" prefix
                RawValue::String(s) => s.rsplit('\0').next().unwrap_or_default().to_string(),
                _ => return None,
            };
            let value = self.value(depth + 1)?;
            map.insert(key, value);
        }
        self.expect(b'}')?;
        Some(into_container(map))
    }
}

/// Sequential `0..n` keys become a list, anything else stays a map
fn into_container(map: IndexMap<String, RawValue>) -> RawValue {
    let sequential = map
        .keys()
        .enumerate()
        .all(|(i, key)| key.parse::<usize>().ok() == Some(i));

    if sequential {
        RawValue::List(map.into_values().collect())
    } else {
        RawValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(unserialize("N;"), Some(RawValue::Null));
        assert_eq!(unserialize("b:1;"), Some(RawValue::Bool(true)));
        assert_eq!(unserialize("i:-42;"), Some(RawValue::Int(-42)));
        assert_eq!(unserialize("d:1.5;"), Some(RawValue::Float(1.5)));
        assert_eq!(
            unserialize("s:5:\"hello\";"),
            Some(RawValue::String("hello".to_string()))
        );
    }

    #[test]
    fn test_string_length_counts_bytes() {
        // "é" is two bytes
        assert_eq!(
            unserialize("s:6:\"café!\";"),
            Some(RawValue::String("café!".to_string()))
        );
    }

    #[test]
    fn test_nested_upload_array() {
        let data = "a:1:{i:0;a:2:{s:3:\"url\";s:31:\"https://example.com/files/a.png\";s:9:\"file_name\";s:5:\"a.png\";}}";
        let value = unserialize(data).unwrap();
        let first = value.first_container().unwrap();
        assert_eq!(
            first.non_empty_str("url"),
            Some("https://example.com/files/a.png")
        );
        assert_eq!(first.non_empty_str("file_name"), Some("a.png"));
    }

    #[test]
    fn test_object_decodes_like_map() {
        let data = "O:8:\"stdClass\":1:{s:5:\"value\";s:3:\"yes\";}";
        let value = unserialize(data).unwrap();
        assert_eq!(value.get("value"), Some(&RawValue::from("yes")));
    }

    #[test]
    fn test_malformed_is_rejected() {
        assert_eq!(unserialize("s:10:\"short\";"), None);
        assert_eq!(unserialize("a:2:{i:0;s:1:\"a\";}"), None);
        assert_eq!(unserialize("just text"), None);
        assert_eq!(decode_str("a:1:{broken"), RawValue::from("a:1:{broken"));
    }

    #[test]
    fn test_json_is_decoded_one_level() {
        let value = decode_str(r#"{"value":"https://example.com/x.pdf","label":"CV"}"#);
        assert_eq!(value.get("label"), Some(&RawValue::from("CV")));

        let list = decode_str("[1, 2.5, \"x\"]");
        assert_eq!(
            list,
            RawValue::List(vec![RawValue::Int(1), RawValue::Float(2.5), RawValue::from("x")])
        );
    }

    #[test]
    fn test_plain_strings_stay_strings() {
        assert_eq!(decode_str("1.50"), RawValue::from("1.50"));
        assert_eq!(decode_str("Alice"), RawValue::from("Alice"));
        assert_eq!(decode_str("{not json"), RawValue::from("{not json"));
    }
}
