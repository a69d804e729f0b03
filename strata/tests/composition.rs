//! Composing sources into one configuration tree.

use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use strata::{
    CommandLineConfig, CompositeConfig, ConfigError, ConfigMap, ConfigNode, ConfigNodeExt,
    FileConfig, MemoryConfig, MergeConfig, SharedNode, StrInterpolator, Value,
};
use tempfile::TempDir;

fn memory(value: serde_json::Value) -> Arc<MemoryConfig> {
    Arc::new(MemoryConfig::with_data(ConfigMap::try_from(value).unwrap()))
}

#[test]
fn test_chain_later_child_dominates() {
    let config = CompositeConfig::new();
    config.add_config("a", memory(json!({"key": 1}))).unwrap();
    config.add_config("b", memory(json!({"key": 2}))).unwrap();
    assert_eq!(config.get("key").unwrap(), Some(Value::Int(2)));

    config.remove_config("b").unwrap();
    assert_eq!(config.get("key").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_merge_recurses_into_mappings() {
    let config = MergeConfig::new();
    config
        .add_config(
            "a",
            memory(json!({"parent": {"child": {"k": 1}, "child2": {"k": 2}}})),
        )
        .unwrap();
    config
        .add_config("b", memory(json!({"parent": {"child": {"k": 3, "k2": 4}}})))
        .unwrap();
    config.load().unwrap();

    let expected = ConfigMap::try_from(json!({
        "parent": {"child": {"k": 3, "k2": 4}, "child2": {"k": 2}}
    }))
    .unwrap();
    assert_eq!(config.raw_map(), expected);
}

#[test]
fn test_merge_interpolates_after_merging() {
    let config = MergeConfig::new();
    config
        .add_config("defaults", memory(json!({"env": "dev", "db": {"name": "app_${env}"}})))
        .unwrap();
    config.add_config("overrides", memory(json!({"env": "prod"}))).unwrap();
    config.load().unwrap();

    assert_eq!(config.get_str("db.name", "").unwrap(), "app_prod");
}

#[test]
fn test_prefixed_view_of_flat_key() {
    let config = memory(json!({"db.host": "x"}));
    let db = config.prefixed("db").unwrap();

    assert_eq!(db.get("host").unwrap(), Some(Value::from("x")));
}

#[test]
fn test_prefixed_view_of_composite() {
    let config = CompositeConfig::new();
    config
        .add_config("defaults", memory(json!({"db": {"host": "localhost", "port": 5432}})))
        .unwrap();
    config.add_config("overrides", memory(json!({"db.host": "db.internal"}))).unwrap();

    let db = config.prefixed("db").unwrap();
    assert_eq!(db.get_str("host", "").unwrap(), "db.internal");
    assert_eq!(db.get_int("port", 0).unwrap(), 5432);
}

#[test]
fn test_interpolation_sees_sibling_keys() {
    let config = CompositeConfig::new();
    config
        .add_config("app", memory(json!({"greeting": "hello ${user.name}"})))
        .unwrap();
    config.add_config("users", memory(json!({"user": {"name": "ada"}}))).unwrap();

    assert_eq!(config.get_str("greeting", "").unwrap(), "hello ada");
}

#[test]
fn test_missing_variable_is_strict() {
    let config = CompositeConfig::new();
    config.add_config("app", memory(json!({"url": "${missing}/path"}))).unwrap();

    assert!(matches!(
        config.get("url").unwrap_err(),
        ConfigError::Interpolation(_)
    ));
}

#[test]
fn test_lenient_interpolator_substitutes_empty() {
    let config = MemoryConfig::with_data(ConfigMap::try_from(json!({"url": "${missing}/path"})).unwrap())
        .with_interpolator(StrInterpolator::lenient());

    assert_eq!(config.get_str("url", "").unwrap(), "/path");
}

#[test]
fn test_file_then_command_line_overrides() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("app.yaml"),
        "server:\n  host: 0.0.0.0\n  port: 8080\nworkers: 2\n",
    )
    .unwrap();

    let config = CompositeConfig::with_load_on_add(true);
    config
        .add_config(
            "file",
            Arc::new(FileConfig::new("app.yaml").with_paths([dir.path().display().to_string()])),
        )
        .unwrap();
    config
        .add_config(
            "args",
            Arc::new(CommandLineConfig::from_args(["--server.port=9090", "-workers", "4"])),
        )
        .unwrap();

    assert_eq!(config.get_str("server.host", "").unwrap(), "0.0.0.0");
    assert_eq!(config.get_int("server.port", 0).unwrap(), 9090);
    assert_eq!(config.get_int("workers", 0).unwrap(), 4);
    assert_eq!(config.config_names(), vec!["file".to_string(), "args".to_string()]);
}

#[test]
fn test_deserialize_section() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Database {
        host: String,
        port: u16,
        url: String,
    }

    let config = CompositeConfig::new();
    config
        .add_config(
            "base",
            memory(json!({"database": {"host": "db", "port": 5432, "url": "pg://${database.host}"}})),
        )
        .unwrap();

    let database: Database = config.get_deserialized("database").unwrap().unwrap();
    assert_eq!(
        database,
        Database {
            host: "db".to_string(),
            port: 5432,
            url: "pg://db".to_string(),
        }
    );
    assert!(config.get_deserialized::<Database>("missing").unwrap().is_none());
}

#[test]
fn test_case_insensitive_keys_across_tree() {
    let config = CompositeConfig::new();
    config.add_config("a", memory(json!({"Server": {"Port": 80}}))).unwrap();

    assert_eq!(config.get_int("server.port", 0).unwrap(), 80);
    assert_eq!(config.get_int("SERVER.PORT", 0).unwrap(), 80);
    assert_eq!(config.keys(), vec!["Server".to_string()]);
}
