//! # Prefixed View
//!
//! [`PrefixedConfig`] exposes the sub-tree of another node under a key
//! prefix. It keeps no data of its own: `db.prefixed("db").get("host")`
//! reads `db.host` from the wrapped node.

use crate::Result;
use crate::decoder::Cast;
use crate::event::{EventHandler, Relay};
use crate::interpolation::StrLookup;
use crate::node::ConfigNode;
use errors::ConfigError;
use std::fmt;
use std::sync::{Arc, Weak};
use strata_core::map::NESTED_DELIMITER;
use strata_core::{ConfigMap, Value};

pub struct PrefixedConfig {
    config: Arc<dyn ConfigNode>,
    /// Prefix with the trailing delimiter, ready for concatenation.
    prefix: String,
    updated: Relay,
}

impl fmt::Debug for PrefixedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixedConfig")
            .field("config", &self.config.describe())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PrefixedConfig {
    /// View of `config` under `prefix`. Trailing delimiters in `prefix` are
    /// ignored; an empty prefix is rejected.
    pub fn new(config: Arc<dyn ConfigNode>, prefix: &str) -> Result<Arc<Self>> {
        let trimmed = prefix.trim_end_matches(NESTED_DELIMITER);
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidArgument {
                argument: "prefix".to_string(),
                reason: format!("{:?} is empty", prefix),
            });
        }

        let prefix = format!("{}{}", trimmed, NESTED_DELIMITER);
        Ok(Arc::new_cyclic(|me: &Weak<Self>| {
            let wrapper: Weak<dyn ConfigNode> = me.clone();
            Self {
                updated: Relay::new(config.clone(), wrapper),
                config,
                prefix,
            }
        }))
    }

    /// The prefix without its trailing delimiter.
    pub fn prefix(&self) -> &str {
        self.prefix.trim_end_matches(NESTED_DELIMITER)
    }

    pub fn config(&self) -> &Arc<dyn ConfigNode> {
        &self.config
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl ConfigNode for PrefixedConfig {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.config.get_raw(&self.full_key(key))
    }

    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>> {
        self.config.get_value(&self.full_key(key), cast)
    }

    fn load(&self) -> Result<()> {
        self.config.load()
    }

    fn updated(&self) -> &EventHandler {
        self.updated.handler()
    }

    fn lookup(&self) -> Option<Arc<dyn StrLookup>> {
        self.config.lookup()
    }

    fn set_lookup(&self, lookup: Option<Arc<dyn StrLookup>>) {
        self.config.set_lookup(lookup);
    }

    /// Sub-tree under the prefix, plus top-level keys spelled out as
    /// `prefix.key`.
    fn raw_map(&self) -> ConfigMap {
        let mut map = match self.config.get_raw(self.prefix()) {
            Some(Value::Map(subtree)) => subtree,
            _ => ConfigMap::new(),
        };

        for (key, value) in self.config.raw_map() {
            match strip_prefix_ignore_case(&key, &self.prefix) {
                Some(rest) if !rest.is_empty() => {
                    map.insert(rest, value);
                }
                _ => {}
            }
        }
        map
    }

    fn describe(&self) -> String {
        format!("{} under {}", self.config.describe(), self.prefix())
    }
}

/// Strip `prefix` from `key` comparing one character at a time, so the split
/// lands on a boundary of `key` even when lowercasing changes byte lengths.
fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = key;
    for expected in prefix.chars() {
        let mut chars = rest.chars();
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}
