// crates/citypop-core/src/raw.rs

//! Shared raw input produced by every adapter.

use serde_json::Value;
use std::collections::BTreeMap;

/// One provider record before normalization.
///
/// Field names are whatever the provider uses; values are kept as text so the
/// normalizer owns every coercion decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Exact-name lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// First non-blank value among `aliases`, matched case-insensitively.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            self.fields
                .iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(alias) && !v.trim().is_empty())
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flatten a JSON object into a row. Nested values are skipped; `null` is absent.
    /// Returns `None` for anything that is not an object.
    pub fn from_json_object(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut row = RawRow::new();
        for (k, v) in obj {
            match v {
                Value::String(s) => row.insert(k.as_str(), s.as_str()),
                Value::Number(n) => row.insert(k.as_str(), n.to_string()),
                Value::Bool(b) => row.insert(k.as_str(), b.to_string()),
                Value::Null | Value::Array(_) | Value::Object(_) => {}
            }
        }
        Some(row)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}
