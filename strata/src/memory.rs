//! # Memory Config
//!
//! A data node whose snapshot is built in code and changed with
//! [`MemoryConfig::set`].

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use crate::node::ConfigNode;
use strata_core::{ConfigMap, Value};

/// Source of a [`MemoryConfig`]. Loading republishes the current snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySource;

impl Source for MemorySource {
    fn read(&self, ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        Ok(ctx.current.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub type MemoryConfig = DataConfig<MemorySource>;

impl DataConfig<MemorySource> {
    pub fn new() -> Self {
        Self::with_data(ConfigMap::new())
    }

    pub fn with_data(data: ConfigMap) -> Self {
        Self::with_snapshot(MemorySource, data)
    }

    /// Build from key/value pairs. Keys are stored as given; dotted keys are
    /// not expanded into nested mappings.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::with_data(pairs.into_iter().collect())
    }

    /// Set a top-level key, publish the new snapshot, then fire `updated`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.update(|current| {
            let mut next = current.clone();
            next.insert(key.clone(), value.clone());
            next
        });
        self.updated().invoke(&());
    }
}

impl Default for DataConfig<MemorySource> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConfigNodeExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_from_pairs() {
        let config = MemoryConfig::from_pairs([("key", "value"), ("Other", "x")]);

        assert_eq!(config.get("KEY").unwrap(), Some(Value::from("value")));
        assert_eq!(config.keys(), vec!["Other".to_string(), "key".to_string()]);
    }

    #[test]
    fn test_set_publishes_then_notifies() {
        let config = Arc::new(MemoryConfig::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let observer = Arc::downgrade(&config);
        let seen_value = seen.clone();
        config.on_updated(move || {
            if let Some(config) = observer.upgrade() {
                let value = config.get_int("counter", 0).unwrap();
                seen_value.store(value as usize, Ordering::SeqCst);
            }
        });

        config.set("counter", 5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_set_does_not_touch_previous_snapshot() {
        let config = MemoryConfig::from_pairs([("a", 1)]);
        let before = config.snapshot();

        config.set("b", 2);

        assert!(before.get("b").is_none());
        assert_eq!(config.get_int("b", 0).unwrap(), 2);
        assert_eq!(config.get_int("a", 0).unwrap(), 1);
    }

    #[test]
    fn test_load_keeps_data() {
        let config = MemoryConfig::from_pairs([("a", 1)]);
        config.load().unwrap();
        config.load().unwrap();
        assert_eq!(config.get_int("a", 0).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_load_keeps_every_set() {
        let config = MemoryConfig::new();
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    config.load().unwrap();
                }
            });
            for i in 0..500 {
                config.set(format!("k{i}"), i);
            }
            done.store(true, Ordering::SeqCst);
        });

        let missing = (0..500)
            .filter(|i| config.get_raw(&format!("k{i}")).is_none())
            .count();
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_interpolation_resolves_from_self() {
        let config = MemoryConfig::from_pairs([("key", "value"), ("ref", "${key}")]);
        assert_eq!(config.get_str("ref", "").unwrap(), "value");
    }
}
