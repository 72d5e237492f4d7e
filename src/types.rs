//! Type definitions for the export input model

use indexmap::IndexMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The form whose submissions are exported
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Form {
    pub id: u64,
    pub title: String,
}

impl Form {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Form {
            id,
            title: title.into(),
        }
    }
}

/// A field defined on the form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDescriptor {
    pub id: u64,
    pub key: String,
    pub label: String,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub field_type: String,
}

impl FieldDescriptor {
    pub fn new(id: u64, key: impl Into<String>, label: impl Into<String>) -> Self {
        FieldDescriptor {
            id,
            key: key.into(),
            label: label.into(),
            field_type: String::new(),
        }
    }

    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }
}

/// One output column of the submissions sheet.
///
/// `field == None` marks the synthetic submission date column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    pub id: String,
    /// 1-based column position
    pub index: u32,
    pub header: String,
    pub field: Option<FieldDescriptor>,
}

impl Column {
    pub fn is_submission_date(&self) -> bool {
        self.field.is_none()
    }
}

/// A stored submission with its raw meta values
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Submission {
    pub id: u64,
    pub submitted_at: String,
    pub meta: IndexMap<String, Vec<RawValue>>,
}

impl Submission {
    pub fn new(id: u64, submitted_at: impl Into<String>) -> Self {
        Submission {
            id,
            submitted_at: submitted_at.into(),
            meta: IndexMap::new(),
        }
    }

    /// Append a value under `key`
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.meta.entry(key.into()).or_default().push(value.into());
        self
    }
}

/// Arbitrary nested submission value (decoded JSON or serialized PHP data)
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<RawValue>),
    Map(IndexMap<String, RawValue>),
}

impl RawValue {
    pub fn is_container(&self) -> bool {
        matches!(self, RawValue::List(_) | RawValue::Map(_))
    }

    /// String form of a scalar, `None` for containers.
    ///
    /// `false` and null become the empty string.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            RawValue::Null => Some(String::new()),
            RawValue::Bool(true) => Some("1".to_string()),
            RawValue::Bool(false) => Some(String::new()),
            RawValue::Int(i) => Some(i.to_string()),
            RawValue::Float(f) => Some(f.to_string()),
            RawValue::String(s) => Some(s.clone()),
            RawValue::List(_) | RawValue::Map(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Child by key; lists accept numeric keys
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Map(map) => map.get(key),
            RawValue::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Non-empty string stored under `key`
    pub fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(RawValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The index-0 child when it is itself a container
    pub fn first_container(&self) -> Option<&RawValue> {
        self.get("0").filter(|v| v.is_container())
    }

    /// Iterate `(key, value)` pairs of a container
    pub fn entries(&self) -> Vec<(String, &RawValue)> {
        match self {
            RawValue::Map(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            RawValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(items: Vec<RawValue>) -> Self {
        RawValue::List(items)
    }
}

impl From<IndexMap<String, RawValue>> for RawValue {
    fn from(map: IndexMap<String, RawValue>) -> Self {
        RawValue::Map(map)
    }
}

impl<const N: usize> From<[(&str, RawValue); N]> for RawValue {
    fn from(pairs: [(&str, RawValue); N]) -> Self {
        RawValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scalar_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Normalized content of one field value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub pdfs: Vec<String>,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.links.is_empty()
    }
}

/// Cell format presets registered in `styles.xml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellStyle {
    /// No formatting
    #[default]
    Default = 0,
    /// Bold, left aligned, vertically centered, wrapped
    Header = 1,
    /// Wrapped, top-left aligned
    Body = 2,
}

impl CellStyle {
    /// Get the style index for XML
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_text_follows_string_cast() {
        assert_eq!(RawValue::Bool(true).scalar_text().as_deref(), Some("1"));
        assert_eq!(RawValue::Bool(false).scalar_text().as_deref(), Some(""));
        assert_eq!(RawValue::Float(2.0).scalar_text().as_deref(), Some("2"));
        assert_eq!(RawValue::Float(1.5).scalar_text().as_deref(), Some("1.5"));
        assert_eq!(RawValue::List(vec![]).scalar_text(), None);
    }

    #[test]
    fn test_list_children_by_index() {
        let value = RawValue::List(vec![RawValue::from("a"), RawValue::from([(
            "url",
            RawValue::from("https://example.com/a.png"),
        )])]);
        assert_eq!(value.get("0"), Some(&RawValue::from("a")));
        assert!(value.get("1").is_some_and(|v| v.contains_key("url")));
        assert!(value.first_container().is_none());
    }

    #[test]
    fn test_submission_meta_appends() {
        let sub = Submission::new(1, "2024-01-05 10:00:00")
            .with_meta("field_1", "a")
            .with_meta("field_1", "b");
        assert_eq!(sub.meta["field_1"].len(), 2);
    }

    #[test]
    fn test_style_index() {
        assert_eq!(CellStyle::Default.index(), 0);
        assert_eq!(CellStyle::Body.index(), 2);
    }
}
