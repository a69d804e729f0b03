//! # Format Readers
//!
//! Parses INI, JSON, YAML and TOML payloads into [`ConfigMap`] snapshots.
//!
//! Every reader requires a mapping at the top level. Scalars inside the
//! payload keep their native type where the format has one; TOML datetimes
//! are kept as their ISO text and left to the decoder.

use crate::Reader;
use errors::ConfigError;
use strata_core::{ConfigMap, Value};

fn parse_error(format: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Parse {
        format: format.to_string(),
        reason: reason.to_string(),
    }
}

fn require_map(format: &str, value: Value) -> Result<ConfigMap, ConfigError> {
    match value {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(ConfigMap::new()),
        other => Err(parse_error(
            format,
            format!("top level must be a mapping, got {}", other.type_name()),
        )),
    }
}

/// JSON reader backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReader;

impl Reader for JsonReader {
    fn format(&self) -> &'static str {
        "json"
    }

    fn read(&self, text: &str) -> Result<ConfigMap, ConfigError> {
        let parsed: serde_json::Value =
            serde_json::from_str(text).map_err(|e| parse_error(self.format(), e))?;
        require_map(self.format(), Value::from(parsed))
    }
}

/// YAML reader backed by `serde_yaml`.
///
/// Non-string mapping keys (numbers, booleans) are stringified. An empty
/// document reads as an empty mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlReader;

impl YamlReader {
    fn convert(value: serde_yaml::Value) -> Result<Value, ConfigError> {
        Ok(match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => Value::List(
                items
                    .into_iter()
                    .map(Self::convert)
                    .collect::<Result<_, _>>()?,
            ),
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = ConfigMap::new();
                for (key, value) in mapping {
                    map.insert(Self::key(key)?, Self::convert(value)?);
                }
                Value::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Self::convert(tagged.value)?,
        })
    }

    fn key(key: serde_yaml::Value) -> Result<String, ConfigError> {
        match key {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(parse_error(
                "yaml",
                format!("unsupported mapping key: {:?}", other),
            )),
        }
    }
}

impl Reader for YamlReader {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn read(&self, text: &str) -> Result<ConfigMap, ConfigError> {
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| parse_error(self.format(), e))?;
        require_map(self.format(), Self::convert(parsed)?)
    }
}

/// TOML reader backed by `toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlReader;

impl TomlReader {
    fn convert(value: toml::Value) -> Value {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(items) => {
                Value::List(items.into_iter().map(Self::convert).collect())
            }
            toml::Value::Table(table) => Value::Map(
                table
                    .into_iter()
                    .map(|(key, value)| (key, Self::convert(value)))
                    .collect(),
            ),
        }
    }
}

impl Reader for TomlReader {
    fn format(&self) -> &'static str {
        "toml"
    }

    fn read(&self, text: &str) -> Result<ConfigMap, ConfigError> {
        let table: toml::Table = toml::from_str(text).map_err(|e| parse_error(self.format(), e))?;
        require_map(self.format(), Self::convert(toml::Value::Table(table)))
    }
}

/// INI reader.
///
/// Each `[section]` becomes a nested mapping of its `key = value` (or
/// `key: value`) options. Lines starting with `#` or `;` are comments and
/// indented lines continue the previous option's value. Options before the
/// first section header are rejected. All values are strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct IniReader;

impl Reader for IniReader {
    fn format(&self) -> &'static str {
        "ini"
    }

    fn read(&self, text: &str) -> Result<ConfigMap, ConfigError> {
        let mut root = ConfigMap::new();
        let mut section: Option<(String, ConfigMap)> = None;
        let mut last_key: Option<String> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with([' ', '\t']) {
                if let (Some((_, options)), Some(key)) = (section.as_mut(), last_key.as_ref())
                    && let Some(Value::String(existing)) = options.get_mut(key)
                {
                    existing.push('\n');
                    existing.push_str(trimmed);
                    continue;
                }
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if let Some((done, options)) = section.take() {
                    root.insert(done, options);
                }
                let name = name.trim().to_string();
                let existing = match root.remove(&name) {
                    Some(Value::Map(options)) => options,
                    _ => ConfigMap::new(),
                };
                section = Some((name, existing));
                last_key = None;
                continue;
            }

            let Some((_, options)) = section.as_mut() else {
                return Err(parse_error(
                    self.format(),
                    format!("line {}: option outside of a section", line_no),
                ));
            };

            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(parse_error(
                    self.format(),
                    format!("line {}: expected key = value", line_no),
                ));
            };
            let key = trimmed[..split].trim();
            if key.is_empty() {
                return Err(parse_error(
                    self.format(),
                    format!("line {}: empty option name", line_no),
                ));
            }
            let value = trimmed[split + 1..].trim();
            options.insert(key, value);
            last_key = Some(key.to_string());
        }

        if let Some((name, options)) = section {
            root.insert(name, options);
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_reader() {
        let map = JsonReader
            .read(r#"{"Database": {"host": "localhost", "port": 5432}, "debug": true}"#)
            .unwrap();

        assert_eq!(map.lookup("database.host"), Some(&Value::from("localhost")));
        assert_eq!(map.lookup("database.port"), Some(&Value::Int(5432)));
        assert_eq!(map.get("debug"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_json_reader_rejects_top_level_list() {
        let err = JsonReader.read("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref format, .. } if format == "json"));
    }

    #[test]
    fn test_json_reader_syntax_error() {
        let err = JsonReader.read("{not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse json"));
    }

    #[test]
    fn test_yaml_reader() {
        let yaml = r"
server:
  host: example.com
  ports:
    - 80
    - 443
  ratio: 0.5
enabled: yes
";
        let map = YamlReader.read(yaml).unwrap();

        assert_eq!(map.lookup("server.host"), Some(&Value::from("example.com")));
        assert_eq!(
            map.lookup("server.ports"),
            Some(&Value::List(vec![Value::Int(80), Value::Int(443)]))
        );
        assert_eq!(map.lookup("server.ratio"), Some(&Value::Float(0.5)));
        // YAML 1.2: `yes` is a plain string
        assert_eq!(map.get("enabled"), Some(&Value::from("yes")));
    }

    #[test]
    fn test_yaml_reader_stringifies_keys() {
        let map = YamlReader.read("1: one\ntrue: yes-value\n").unwrap();
        assert_eq!(map.get("1"), Some(&Value::from("one")));
        assert_eq!(map.get("true"), Some(&Value::from("yes-value")));
    }

    #[test]
    fn test_yaml_reader_empty_document() {
        let map = YamlReader.read("").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_toml_reader() {
        let toml = r#"
title = "demo"

[owner]
name = "Tom"
dob = 1979-05-27T07:32:00

[database]
ports = [8000, 8001]
enabled = true
"#;
        let map = TomlReader.read(toml).unwrap();

        assert_eq!(map.get("title"), Some(&Value::from("demo")));
        assert_eq!(map.lookup("owner.name"), Some(&Value::from("Tom")));
        assert_eq!(
            map.lookup("owner.dob"),
            Some(&Value::from("1979-05-27T07:32:00"))
        );
        assert_eq!(
            map.lookup("database.ports"),
            Some(&Value::List(vec![Value::Int(8000), Value::Int(8001)]))
        );
        assert_eq!(map.lookup("database.enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_toml_reader_syntax_error() {
        let err = TomlReader.read("key = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref format, .. } if format == "toml"));
    }

    #[test]
    fn test_ini_reader_sections() {
        let ini = "
# comment
[server]
host = example.com
port: 8080

; another comment
[Client]
retries = 3
";
        let map = IniReader.read(ini).unwrap();

        assert_eq!(map.lookup("server.host"), Some(&Value::from("example.com")));
        assert_eq!(map.lookup("server.port"), Some(&Value::from("8080")));
        assert_eq!(map.lookup("client.retries"), Some(&Value::from("3")));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Client", "server"]);
    }

    #[test]
    fn test_ini_reader_continuation_lines() {
        let ini = "[text]\nbody = first\n  second\n";
        let map = IniReader.read(ini).unwrap();
        assert_eq!(map.lookup("text.body"), Some(&Value::from("first\nsecond")));
    }

    #[test]
    fn test_ini_reader_value_may_contain_separator() {
        let map = IniReader.read("[db]\nurl = postgres://h:5432/x\n").unwrap();
        assert_eq!(map.lookup("db.url"), Some(&Value::from("postgres://h:5432/x")));
    }

    #[test]
    fn test_ini_reader_repeated_section_merges() {
        let map = IniReader.read("[a]\nx = 1\n[b]\ny = 2\n[a]\nz = 3\n").unwrap();
        assert_eq!(map.lookup("a.x"), Some(&Value::from("1")));
        assert_eq!(map.lookup("a.z"), Some(&Value::from("3")));
    }

    #[test]
    fn test_ini_reader_option_without_section() {
        let err = IniReader.read("key = value\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_ini_reader_missing_separator() {
        let err = IniReader.read("[a]\njust-a-word\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
