//! # Config Nodes
//!
//! [`ConfigNode`] is the capability every source, composite and view
//! implements. [`ConfigNodeExt`] layers the typed read API on top of it and
//! [`SharedNode`] adds the wrappers that need shared ownership.

use crate::Result;
use crate::decoder::{Cast, Decoder, FromValue, extract};
use crate::event::{EventHandler, ListenerId};
use crate::interpolation::{StrInterpolator, StrLookup};
use crate::polling::PollingConfig;
use crate::prefixed::PrefixedConfig;
use errors::ConfigError;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use strata_core::map::NESTED_DELIMITER;
use strata_core::{ConfigMap, Value};

/// A node in a configuration tree.
///
/// `load` never fires [`updated`](ConfigNode::updated); whoever calls `load`
/// decides whether the change is announced.
pub trait ConfigNode: Send + Sync + 'static {
    /// Raw, uninterpolated value at a possibly dotted key.
    fn get_raw(&self, key: &str) -> Option<Value>;

    /// Value at `key` with strings interpolated, then decoded to `cast` if
    /// given. `Ok(None)` when the key is absent.
    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>>;

    /// Re-read this node's data from its origin.
    fn load(&self) -> Result<()>;

    fn updated(&self) -> &EventHandler;

    /// Lookup bound for interpolation, if any. Unbound nodes resolve
    /// placeholders against themselves.
    fn lookup(&self) -> Option<Arc<dyn StrLookup>>;

    fn set_lookup(&self, lookup: Option<Arc<dyn StrLookup>>);

    /// Raw snapshot of everything visible through this node.
    fn raw_map(&self) -> ConfigMap;

    /// Short description used in logs.
    fn describe(&self) -> String;
}

/// A default for a missing key, either a value or a supplier called only on
/// the miss path.
pub enum Fallback<T> {
    Value(T),
    Supplier(Box<dyn FnOnce() -> T + Send>),
}

impl<T> Fallback<T> {
    pub fn value(value: impl Into<T>) -> Self {
        Self::Value(value.into())
    }

    pub fn supplier(supplier: impl FnOnce() -> T + Send + 'static) -> Self {
        Self::Supplier(Box::new(supplier))
    }

    pub fn resolve(self) -> T {
        match self {
            Self::Value(value) => value,
            Self::Supplier(supplier) => supplier(),
        }
    }
}

impl<T> From<T> for Fallback<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// Typed reads over any [`ConfigNode`].
pub trait ConfigNodeExt: ConfigNode {
    /// Interpolated value, not decoded.
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.get_value(key, None)
    }

    fn get_cast(&self, key: &str, cast: &Cast) -> Result<Option<Value>> {
        self.get_value(key, Some(cast))
    }

    /// Value at `key`, or the fallback when the key is absent. The fallback
    /// is returned as given, without decoding.
    fn get_or(
        &self,
        key: &str,
        default: impl Into<Fallback<Value>>,
        cast: Option<&Cast>,
    ) -> Result<Value> {
        match self.get_value(key, cast)? {
            Some(value) => Ok(value),
            None => Ok(default.into().resolve()),
        }
    }

    fn get_as<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get_value(key, Some(&T::CAST))? else {
            return Ok(None);
        };
        Ok(Some(extract(value)?))
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    fn get_float(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    fn get_str(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_as::<String>(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// List at `key`, empty when absent.
    fn get_list(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self.get_as(key)?.unwrap_or_default())
    }

    /// Mapping at `key`, empty when absent.
    fn get_map(&self, key: &str) -> Result<ConfigMap> {
        Ok(self.get_as(key)?.unwrap_or_default())
    }

    /// Deserialize the sub-tree at `key` with serde.
    ///
    /// String leaves reachable through mappings are interpolated first.
    fn get_deserialized<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key) else {
            return Ok(None);
        };
        let resolved = resolve_tree(self, key, raw)?;
        serde_json::from_value(serde_json::Value::from(resolved))
            .map(Some)
            .map_err(|e| ConfigError::InvalidData {
                reason: format!("{}: {}", key, e),
            })
    }

    fn contains(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    /// Top-level keys, in their original case.
    fn keys(&self) -> Vec<String> {
        self.raw_map().keys().map(str::to_string).collect()
    }

    /// Register a callback for the `updated` event.
    fn on_updated(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.updated().add(move |_| callback())
    }
}

impl<N: ConfigNode + ?Sized> ConfigNodeExt for N {}

fn resolve_tree<N: ConfigNode + ?Sized>(node: &N, path: &str, raw: Value) -> Result<Value> {
    match raw {
        Value::Map(map) => {
            let mut resolved = ConfigMap::new();
            for (key, value) in map {
                let child = format!("{}{}{}", path, NESTED_DELIMITER, key);
                resolved.insert(key, resolve_tree(node, &child, value)?);
            }
            Ok(Value::Map(resolved))
        }
        Value::String(_) => Ok(node.get_value(path, None)?.unwrap_or_default()),
        other => Ok(other),
    }
}

/// Wrappers that keep a shared handle to the node they wrap.
pub trait SharedNode {
    /// View of the sub-tree under `prefix`.
    fn prefixed(&self, prefix: &str) -> Result<Arc<PrefixedConfig>>;

    /// Reload this node every `interval` once loaded.
    fn reload_every(&self, interval: Duration) -> Result<Arc<PollingConfig>>;
}

impl<N: ConfigNode> SharedNode for Arc<N> {
    fn prefixed(&self, prefix: &str) -> Result<Arc<PrefixedConfig>> {
        PrefixedConfig::new(self.clone(), prefix)
    }

    fn reload_every(&self, interval: Duration) -> Result<Arc<PollingConfig>> {
        PollingConfig::new(self.clone(), interval)
    }
}

impl SharedNode for Arc<dyn ConfigNode> {
    fn prefixed(&self, prefix: &str) -> Result<Arc<PrefixedConfig>> {
        PrefixedConfig::new(self.clone(), prefix)
    }

    fn reload_every(&self, interval: Duration) -> Result<Arc<PollingConfig>> {
        PollingConfig::new(self.clone(), interval)
    }
}

/// Interpolate a raw string value and decode it.
pub(crate) fn resolve_value(
    raw: Option<Value>,
    interpolator: &StrInterpolator,
    lookup: &dyn StrLookup,
    decoder: &Decoder,
    cast: Option<&Cast>,
) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let value = match raw {
        Value::String(text) => Value::String(interpolator.resolve(&text, lookup)?),
        other => other,
    };

    match cast {
        Some(cast) => Ok(Some(decoder.decode(&value, cast)?)),
        None => Ok(Some(value)),
    }
}
