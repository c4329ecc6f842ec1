//! Document model
//!
//! A loosely-typed tree (object / array / scalar) used for the metadata and
//! label files, for literal values in clauses and for materialized rows.
//! Objects keep insertion order and compare keys case-insensitively unless they
//! were created case-sensitive.

pub mod parser;

pub use parser::{parse, parse_file};

use std::fmt;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A document node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Document {
    #[default]
    Null,
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
    Object(DocumentMap),
    Array(Vec<Document>),
}

impl Document {
    /// Empty case-insensitive object
    pub fn object() -> Self {
        Document::Object(DocumentMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    /// Null, or a string that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            Document::Null => true,
            Document::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DocumentMap> {
        match self {
            Document::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut DocumentMap> {
        match self {
            Document::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key when this document is an object
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Scalar text of this node.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON spelling,
    /// objects and arrays as compact JSON text. `Null` has no text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Document::Null => None,
            Document::String(s) => Some(s.clone()),
            Document::Number(n) => Some(n.to_string()),
            Document::Boolean(b) => Some(b.to_string()),
            Document::Object(_) | Document::Array(_) => Some(self.to_string()),
        }
    }

    /// Convert to a `serde_json::Value`
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Document::Null => serde_json::Value::Null,
            Document::String(s) => serde_json::Value::String(s.clone()),
            Document::Number(n) => serde_json::Value::Number(n.clone()),
            Document::Boolean(b) => serde_json::Value::Bool(*b),
            Document::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_value()))
                    .collect(),
            ),
            Document::Array(items) => {
                serde_json::Value::Array(items.iter().map(Document::to_json_value).collect())
            }
        }
    }

    /// Convert from a `serde_json::Value`, giving every nested object the
    /// requested key case rule
    pub fn from_json_value(value: serde_json::Value, case_sensitive: bool) -> Self {
        match value {
            serde_json::Value::Null => Document::Null,
            serde_json::Value::String(s) => Document::String(s),
            serde_json::Value::Number(n) => Document::Number(n),
            serde_json::Value::Bool(b) => Document::Boolean(b),
            serde_json::Value::Object(obj) => {
                let mut map = DocumentMap::with_case_sensitivity(case_sensitive);
                for (k, v) in obj {
                    map.insert(k, Document::from_json_value(v, case_sensitive));
                }
                Document::Object(map)
            }
            serde_json::Value::Array(items) => Document::Array(
                items
                    .into_iter()
                    .map(|v| Document::from_json_value(v, case_sensitive))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Document {
    /// Compact JSON text; `{:#}` pretty-prints
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if f.alternate() {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
        .map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Document::Null => serializer.serialize_unit(),
            Document::String(s) => serializer.serialize_str(s),
            Document::Number(n) => n.serialize(serializer),
            Document::Boolean(b) => serializer.serialize_bool(*b),
            Document::Object(map) => map.serialize(serializer),
            Document::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::String(value.to_string())
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Document::String(value)
    }
}

impl From<&String> for Document {
    fn from(value: &String) -> Self {
        Document::String(value.clone())
    }
}

impl From<bool> for Document {
    fn from(value: bool) -> Self {
        Document::Boolean(value)
    }
}

impl From<i32> for Document {
    fn from(value: i32) -> Self {
        Document::Number(value.into())
    }
}

impl From<i64> for Document {
    fn from(value: i64) -> Self {
        Document::Number(value.into())
    }
}

impl From<u32> for Document {
    fn from(value: u32) -> Self {
        Document::Number(value.into())
    }
}

impl From<u64> for Document {
    fn from(value: u64) -> Self {
        Document::Number(value.into())
    }
}

impl From<f64> for Document {
    /// Non-finite values become `Null`
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Document::Number)
            .unwrap_or(Document::Null)
    }
}

impl<T: Into<Document>> From<Option<T>> for Document {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Document::Null)
    }
}

impl From<DocumentMap> for Document {
    fn from(value: DocumentMap) -> Self {
        Document::Object(value)
    }
}

impl From<Vec<Document>> for Document {
    fn from(value: Vec<Document>) -> Self {
        Document::Array(value)
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        Document::from_json_value(value, false)
    }
}

// ============================================================================
// Ordered map with configurable key case folding
// ============================================================================

/// Insertion-ordered string map.
///
/// Keys are stored as written. Lookups fold case unless the map is
/// case-sensitive, and keys that fold to the same text are the same key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentMap {
    case_sensitive: bool,
    entries: Vec<(String, Document)>,
}

impl DocumentMap {
    /// New case-insensitive map
    pub fn new() -> Self {
        Self::default()
    }

    /// New case-sensitive map
    pub fn case_sensitive() -> Self {
        Self::with_case_sensitivity(true)
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            entries: Vec::new(),
        }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn keys_match(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.chars()
                .flat_map(char::to_lowercase)
                .eq(b.chars().flat_map(char::to_lowercase))
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| self.keys_match(k, key))
    }

    /// Insert a value, returning the previous value for an equal key.
    /// A replaced entry keeps its position and original key spelling.
    pub fn insert(&mut self, key: impl Into<String>, value: Document) -> Option<Document> {
        let key = key.into();
        match self.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.position(key).map(move |idx| &mut self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Document> {
        self.position(key).map(|idx| self.entries.remove(idx).1)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Document::as_str)
    }

    pub fn get_object(&self, key: &str) -> Option<&DocumentMap> {
        self.get(key).and_then(Document::as_object)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Document]> {
        self.get(key).and_then(Document::as_array)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Document> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for DocumentMap {
    type Item = (String, Document);
    type IntoIter = std::vec::IntoIter<(String, Document)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Document)> for DocumentMap {
    fn from_iter<I: IntoIterator<Item = (K, Document)>>(iter: I) -> Self {
        let mut map = DocumentMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for DocumentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
