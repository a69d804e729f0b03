//! # Deep Merge
//!
//! Merges mappings key by key, later sources overriding earlier ones.
//!
//! # Rules
//! 1. A null on either side yields the other side's value
//! 2. Mapping merged into mapping recurses
//! 3. Any other collision replaces the target value wholesale

use crate::map::{ConfigMap, NESTED_DELIMITER};
use crate::value::Value;

/// Merge `source` into `target`.
///
/// Returns the dotted paths whose value changed, so callers can report what
/// a source contributed.
pub fn merge_into(target: &mut ConfigMap, source: &ConfigMap) -> Vec<String> {
    let mut changes = Vec::new();
    merge_with_changes(target, source, "", &mut changes);
    changes
}

/// Merge every mapping, in order, into a fresh one.
pub fn merge_all<'a>(sources: impl IntoIterator<Item = &'a ConfigMap>) -> ConfigMap {
    let mut target = ConfigMap::new();
    for source in sources {
        merge_into(&mut target, source);
    }
    target
}

fn merge_with_changes(
    target: &mut ConfigMap,
    source: &ConfigMap,
    path: &str,
    changes: &mut Vec<String>,
) {
    for (key, value) in source.iter() {
        if value.is_null() {
            continue;
        }

        let key_path = if path.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", path, NESTED_DELIMITER, key)
        };

        if let (Some(Value::Map(dst)), Value::Map(src)) = (target.get_mut(key), value) {
            merge_with_changes(dst, src, &key_path, changes);
            continue;
        }

        let previous = target.insert(key, value.clone());
        if previous.as_ref() != Some(value) {
            changes.push(key_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> ConfigMap {
        ConfigMap::try_from(value).unwrap()
    }

    #[test]
    fn test_merge_recurses_into_mappings() {
        let mut target = map(json!({"parent": {"child": {"k": 1}, "child2": {"k": 2}}}));
        let source = map(json!({"parent": {"child": {"k": 3, "k2": 4}}}));

        merge_into(&mut target, &source);

        assert_eq!(
            target,
            map(json!({"parent": {"child": {"k": 3, "k2": 4}, "child2": {"k": 2}}}))
        );
    }

    #[test]
    fn test_merge_type_collision_replaces() {
        let mut target = map(json!({"a": {"b": 1}, "c": "scalar"}));
        let source = map(json!({"a": "now a string", "c": {"d": 2}}));

        merge_into(&mut target, &source);

        assert_eq!(target, map(json!({"a": "now a string", "c": {"d": 2}})));
    }

    #[test]
    fn test_merge_null_keeps_other_side() {
        let mut target = map(json!({"a": 1, "b": null}));
        let source = map(json!({"a": null, "b": 2, "c": null}));

        merge_into(&mut target, &source);

        assert_eq!(target.get("a"), Some(&Value::Int(1)));
        assert_eq!(target.get("b"), Some(&Value::Int(2)));
        assert!(!target.contains_key("c"));
    }

    #[test]
    fn test_merge_is_case_insensitive() {
        let mut target = map(json!({"Database": {"Host": "a"}}));
        let source = map(json!({"database": {"host": "b"}}));

        merge_into(&mut target, &source);

        let database = target.get("DATABASE").unwrap().as_map().unwrap();
        assert_eq!(database.len(), 1);
        assert_eq!(database.get("host"), Some(&Value::from("b")));
    }

    #[test]
    fn test_merge_reports_changed_paths() {
        let mut target = map(json!({"db": {"host": "a", "port": 1}}));
        let source = map(json!({"db": {"host": "b", "port": 1}, "debug": true}));

        let changes = merge_into(&mut target, &source);

        assert_eq!(changes, vec!["db.host".to_string(), "debug".to_string()]);
    }

    #[test]
    fn test_merge_all_later_wins() {
        let a = map(json!({"key": 1, "only_a": true}));
        let b = map(json!({"key": 2}));

        let merged = merge_all([&a, &b]);

        assert_eq!(merged.get("key"), Some(&Value::Int(2)));
        assert_eq!(merged.get("only_a"), Some(&Value::Bool(true)));
    }
}
