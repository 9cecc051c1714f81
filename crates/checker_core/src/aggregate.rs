//! Merging per-source results into one source -> subject -> category tree.

use std::collections::BTreeMap;

use checker_logging::checker_debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::SourceResult;

/// Subject key under which a source reports its own error message.
pub const ERROR_SUBJECT_KEY: &str = "__error__";

/// Nested result structure: source -> subject -> category -> content, where
/// a category may instead hold subcategory -> content.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ResultTree(Map<String, Value>);

/// Read-side view of one subject entry under a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectEntry<'a> {
    /// The source reported an error instead of subject data.
    Error(String),
    Categories(Vec<(&'a str, Category<'a>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Category<'a> {
    Content(&'a Value),
    Subcategories(&'a Map<String, Value>),
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, source: &str) -> Option<&Value> {
        self.0.get(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Subjects recorded for `source`, in key order. Empty if the source is
    /// absent or not an object.
    pub fn subjects(&self, source: &str) -> Vec<(&str, SubjectEntry<'_>)> {
        let Some(Value::Object(subjects)) = self.0.get(source) else {
            return Vec::new();
        };
        subjects
            .iter()
            .map(|(subject, value)| {
                let entry = if subject == ERROR_SUBJECT_KEY {
                    SubjectEntry::Error(match value {
                        Value::String(message) => message.clone(),
                        other => other.to_string(),
                    })
                } else {
                    SubjectEntry::Categories(categories(value))
                };
                (subject.as_str(), entry)
            })
            .collect()
    }
}

impl From<Map<String, Value>> for ResultTree {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn categories(subject: &Value) -> Vec<(&str, Category<'_>)> {
    let Value::Object(categories) = subject else {
        return Vec::new();
    };
    categories
        .iter()
        .map(|(name, value)| {
            let category = match value {
                Value::Object(subcategories) => Category::Subcategories(subcategories),
                content => Category::Content(content),
            };
            (name.as_str(), category)
        })
        .collect()
}

/// Source name -> base address, trailing slash stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SourceUrlIndex(BTreeMap<String, String>);

impl SourceUrlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, address: &str) {
        self.0.insert(source.into(), strip_trailing_slash(address));
    }

    pub fn base_url(&self, source: &str) -> Option<&str> {
        self.0.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn strip_trailing_slash(address: &str) -> String {
    address.strip_suffix('/').unwrap_or(address).to_string()
}

/// Merge a batch of per-source results into a copy of `existing`.
///
/// Only successful entries with an object result contribute. Each top-level
/// key of such a result names a source and is deep-merged under that source;
/// the entry's address becomes that source's base URL in the returned index,
/// empty when the entry carries none.
pub fn merge(existing: &ResultTree, batch: &[SourceResult]) -> (ResultTree, SourceUrlIndex) {
    let mut tree = existing.clone();
    let mut urls = SourceUrlIndex::new();

    for entry in batch {
        let result = match (&entry.result, entry.is_success()) {
            (Some(Value::Object(result)), true) => result,
            _ => {
                checker_debug!(
                    "Skipping source result with status {:?} (address {:?})",
                    entry.status,
                    entry.address
                );
                continue;
            }
        };
        for (source, subjects) in result {
            let slot = tree
                .0
                .entry(source.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            merge_value(slot, subjects);
            urls.insert(source.clone(), entry.address.as_deref().unwrap_or(""));
        }
    }

    (tree, urls)
}

/// Recursive key-wise merge. Object meets object: recurse. Anything else:
/// the incoming value replaces the existing one.
pub fn deep_merge(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        let slot = target.entry(key.clone()).or_insert(Value::Null);
        merge_value(slot, value);
    }
}

fn merge_value(target: &mut Value, incoming: &Value) {
    match incoming {
        Value::Object(incoming) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target) = target {
                deep_merge(target, incoming);
            }
        }
        other => *target = other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_only_one_trailing_slash() {
        assert_eq!(strip_trailing_slash("https://a.example//"), "https://a.example/");
        assert_eq!(strip_trailing_slash("https://a.example"), "https://a.example");
    }

    #[test]
    fn arrays_replace_rather_than_merge() {
        let mut target = json!({"k": [1, 2, 3]}).as_object().cloned().unwrap();
        let incoming = json!({"k": [4]}).as_object().cloned().unwrap();
        deep_merge(&mut target, &incoming);
        assert_eq!(Value::Object(target), json!({"k": [4]}));
    }

    #[test]
    fn object_replaces_scalar() {
        let mut target = json!({"k": "text"}).as_object().cloned().unwrap();
        let incoming = json!({"k": {"sub": "x"}}).as_object().cloned().unwrap();
        deep_merge(&mut target, &incoming);
        assert_eq!(Value::Object(target), json!({"k": {"sub": "x"}}));
    }
}
