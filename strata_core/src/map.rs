//! # Case-insensitive Mapping
//!
//! The nested mapping behind every snapshot. Keys are matched ignoring case
//! at every level while iteration yields the keys as they were inserted.

use crate::value::Value;
use errors::ConfigError;
use std::collections::BTreeMap;

/// Delimiter separating the segments of a nested key (`database.host`).
pub const NESTED_DELIMITER: char = '.';

/// Case-insensitive, case-preserving mapping from string keys to [`Value`].
///
/// Stored as `lowercase(key) -> (original key, value)`. Iteration order is
/// the lexical order of the normalized keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: BTreeMap<String, (String, Value)>,
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&normalize(key)).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(&normalize(key)).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    /// Insert a value, returning the previous one stored under any casing of
    /// `key`. The original key is replaced by the casing given here.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        self.entries
            .insert(normalize(&key), (key, value.into()))
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(&normalize(key)).map(|(_, value)| value)
    }

    /// Original keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Resolve a possibly nested key.
    ///
    /// The key is first tried verbatim. Otherwise it is split on `.` and each
    /// segment is looked up in the mapping reached so far; resolution stops
    /// with `None` as soon as a segment is missing or an intermediate value
    /// is not a mapping. Null leaves count as missing.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.get(key).filter(|v| !v.is_null()) {
            return Some(value);
        }

        let mut segments = key.split(NESTED_DELIMITER);
        let first = segments.next()?;
        if first.len() == key.len() {
            return None;
        }

        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }

        if current.is_null() { None } else { Some(current) }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for ConfigMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for ConfigMap {
    type Item = (String, Value);
    type IntoIter = std::iter::Map<
        std::collections::btree_map::IntoValues<String, (String, Value)>,
        fn((String, Value)) -> (String, Value),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .into_values()
            .map(std::convert::identity as fn((String, Value)) -> (String, Value))
    }
}

impl TryFrom<serde_json::Value> for ConfigMap {
    type Error = ConfigError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match Value::from(value) {
            Value::Map(map) => Ok(map),
            other => Err(ConfigError::InvalidData {
                reason: format!("expected a mapping, got {}", other.type_name()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> ConfigMap {
        ConfigMap::try_from(value).unwrap()
    }

    #[test]
    fn test_keys_ignore_case_but_keep_original() {
        let mut data = ConfigMap::new();
        data.insert("Foo", 5);

        assert_eq!(data.get("foo"), Some(&Value::Int(5)));
        assert_eq!(data.get("FOO"), Some(&Value::Int(5)));
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["Foo"]);
    }

    #[test]
    fn test_insert_replaces_other_casing() {
        let mut data = ConfigMap::new();
        data.insert("key", 1);
        let previous = data.insert("KEY", 2);

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(data.len(), 1);
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["KEY"]);
    }

    #[test]
    fn test_lookup_prefers_verbatim_key() {
        let data = map(json!({"db.host": "flat", "db": {"host": "nested"}}));
        assert_eq!(data.lookup("db.host"), Some(&Value::from("flat")));
    }

    #[test]
    fn test_lookup_nested_path() {
        let data = map(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(data.lookup("a.b.c"), Some(&Value::Int(1)));
        assert_eq!(data.lookup("A.B.C"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_lookup_missing_segment() {
        let data = map(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(data.lookup("a.x.c"), None);
        assert_eq!(data.lookup("missing"), None);
    }

    #[test]
    fn test_lookup_through_non_mapping() {
        let data = map(json!({"a": "scalar"}));
        assert_eq!(data.lookup("a.b"), None);
    }

    #[test]
    fn test_lookup_null_is_absent() {
        let data = map(json!({"a": null, "b": {"c": null}}));
        assert_eq!(data.lookup("a"), None);
        assert_eq!(data.lookup("b.c"), None);
    }

    #[test]
    fn test_try_from_rejects_scalars() {
        let err = ConfigMap::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidData { .. }));
    }

    #[test]
    fn test_into_iter_yields_original_keys() {
        let data = map(json!({"Alpha": 1, "beta": 2}));
        let keys: Vec<String> = data.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Alpha".to_string(), "beta".to_string()]);
    }

    proptest! {
        #[test]
        fn test_lookup_matches_manual_walk(
            a in "[a-z]{1,6}",
            b in "[a-z]{1,6}",
            c in "[a-z]{1,6}",
            leaf in any::<i64>(),
        ) {
            let mut inner = ConfigMap::new();
            inner.insert(c.clone(), leaf);
            let mut middle = ConfigMap::new();
            middle.insert(b.clone(), inner);
            let mut root = ConfigMap::new();
            root.insert(a.clone(), middle);

            let key = format!("{}.{}.{}", a, b, c);
            prop_assert_eq!(root.lookup(&key), Some(&Value::Int(leaf)));

            let missing = format!("{}.{}.{}x", a, b, c);
            prop_assert_eq!(root.lookup(&missing), None);
        }
    }
}
