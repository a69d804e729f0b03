//! # Data Nodes
//!
//! [`DataConfig`] is the leaf node: a [`Source`] that produces snapshots and
//! the atomically swapped snapshot it last produced.
//!
//! `load` reads a complete new snapshot before swapping it in, so readers
//! see either the previous snapshot or the new one, never a mix. A failed
//! read leaves the previous snapshot in place.

use crate::Result;
use crate::decoder::{Cast, Decoder};
use crate::event::EventHandler;
use crate::interpolation::{NodeLookup, StrInterpolator, StrLookup};
use crate::node::{ConfigNode, resolve_value};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use strata_core::{ConfigMap, Value};
use tracing::debug;

/// What a [`Source`] sees while reading.
pub struct ReadContext<'a> {
    /// Snapshot published before this read.
    pub current: &'a ConfigMap,
    /// Lookup for resolving placeholders in locations (paths, URLs).
    pub lookup: &'a dyn StrLookup,
}

/// Produces a complete snapshot on each read.
pub trait Source: Send + Sync + 'static {
    fn read(&self, ctx: &ReadContext<'_>) -> Result<ConfigMap>;

    fn describe(&self) -> String;
}

/// Leaf config node backed by a [`Source`].
pub struct DataConfig<S> {
    source: S,
    data: ArcSwap<ConfigMap>,
    lookup: RwLock<Option<Arc<dyn StrLookup>>>,
    decoder: Arc<Decoder>,
    interpolator: StrInterpolator,
    updated: EventHandler,
}

impl<S: Source> DataConfig<S> {
    /// Node with an empty snapshot; call [`ConfigNode::load`] to populate it.
    pub fn with_source(source: S) -> Self {
        Self::with_snapshot(source, ConfigMap::new())
    }

    pub(crate) fn with_snapshot(source: S, data: ConfigMap) -> Self {
        Self {
            source,
            data: ArcSwap::from_pointee(data),
            lookup: RwLock::new(None),
            decoder: Arc::new(Decoder::new()),
            interpolator: StrInterpolator::default(),
            updated: EventHandler::new(),
        }
    }

    /// Share a decoder, e.g. one with custom converters registered.
    pub fn with_decoder(mut self, decoder: Arc<Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_interpolator(mut self, interpolator: StrInterpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn decoder(&self) -> &Arc<Decoder> {
        &self.decoder
    }

    pub fn interpolator(&self) -> &StrInterpolator {
        &self.interpolator
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ConfigMap> {
        self.data.load_full()
    }

    /// Replace the snapshot with `f(current)`, retrying if another writer
    /// swapped it concurrently.
    pub(crate) fn update(&self, f: impl Fn(&ConfigMap) -> ConfigMap) {
        self.data.rcu(|current| f(current));
    }

    fn with_lookup<R>(&self, f: impl FnOnce(&dyn StrLookup) -> R) -> R {
        let bound = self.lookup.read().clone();
        match bound {
            Some(lookup) => f(lookup.as_ref()),
            None => f(&NodeLookup(self)),
        }
    }
}

impl<S: Source> ConfigNode for DataConfig<S> {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.data.load().lookup(key).cloned()
    }

    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>> {
        let raw = self.get_raw(key);
        self.with_lookup(|lookup| {
            resolve_value(raw, &self.interpolator, lookup, &self.decoder, cast)
        })
    }

    /// Publishes only if no other writer swapped the snapshot during the
    /// read; otherwise reads again against the newer snapshot.
    fn load(&self) -> Result<()> {
        loop {
            let current = self.data.load_full();
            let next = self.with_lookup(|lookup| {
                self.source.read(&ReadContext {
                    current: &current,
                    lookup,
                })
            })?;
            let keys = next.len();

            let previous = self.data.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&previous, &current) {
                debug!(source = %self.source.describe(), keys, "Configuration loaded");
                return Ok(());
            }
            debug!(source = %self.source.describe(), "Snapshot changed during load, reading again");
        }
    }

    fn updated(&self) -> &EventHandler {
        &self.updated
    }

    fn lookup(&self) -> Option<Arc<dyn StrLookup>> {
        self.lookup.read().clone()
    }

    fn set_lookup(&self, lookup: Option<Arc<dyn StrLookup>>) {
        *self.lookup.write() = lookup;
    }

    fn raw_map(&self) -> ConfigMap {
        ConfigMap::clone(&self.data.load())
    }

    fn describe(&self) -> String {
        self.source.describe()
    }
}

impl<S: Source> fmt::Debug for DataConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConfig")
            .field("source", &self.source.describe())
            .field("keys", &self.data.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConfigNodeExt;
    use errors::ConfigError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};

    /// Source replaying queued results.
    struct Scripted {
        results: Mutex<VecDeque<Result<ConfigMap>>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<ConfigMap>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
            }
        }
    }

    impl Source for Scripted {
        fn read(&self, _ctx: &ReadContext<'_>) -> Result<ConfigMap> {
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ConfigMap::new()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn map(pairs: &[(&str, i64)]) -> ConfigMap {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_load_swaps_snapshot() {
        let config = DataConfig::with_source(Scripted::new(vec![Ok(map(&[("a", 1)]))]));
        assert_eq!(config.get("a").unwrap(), None);

        config.load().unwrap();
        assert_eq!(config.get("a").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn test_failed_load_keeps_previous_snapshot() {
        let config = DataConfig::with_source(Scripted::new(vec![
            Ok(map(&[("a", 1)])),
            Err(ConfigError::Source {
                source_name: "scripted".to_string(),
                reason: "boom".to_string(),
            }),
        ]));

        config.load().unwrap();
        let before = config.snapshot();
        assert!(config.load().is_err());

        assert_eq!(config.snapshot(), before);
        assert_eq!(config.get_int("a", 0).unwrap(), 1);
    }

    #[test]
    fn test_load_twice_with_same_data_is_stable() {
        let config = DataConfig::with_source(Scripted::new(vec![
            Ok(map(&[("a", 1), ("b", 2)])),
            Ok(map(&[("a", 1), ("b", 2)])),
        ]));

        config.load().unwrap();
        let first = config.raw_map();
        config.load().unwrap();

        assert_eq!(config.raw_map(), first);
    }

    #[test]
    fn test_load_does_not_fire_updated() {
        let config = DataConfig::with_source(Scripted::new(vec![Ok(map(&[("a", 1)]))]));
        let fired = Arc::new(Mutex::new(0));

        let counter = fired.clone();
        config.on_updated(move || *counter.lock() += 1);
        config.load().unwrap();

        assert_eq!(*fired.lock(), 0);
    }

    /// Source that swaps its node's snapshot during its first read.
    struct Interfering {
        node: OnceLock<Weak<DataConfig<Interfering>>>,
        reads: AtomicUsize,
    }

    impl Source for Interfering {
        fn read(&self, ctx: &ReadContext<'_>) -> Result<ConfigMap> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(node) = self.node.get().and_then(Weak::upgrade) {
                    node.update(|current| {
                        let mut next = current.clone();
                        next.insert("written", true);
                        next
                    });
                }
            }
            let mut next = ctx.current.clone();
            next.insert("loaded", true);
            Ok(next)
        }

        fn describe(&self) -> String {
            "interfering".to_string()
        }
    }

    #[test]
    fn test_load_rereads_when_snapshot_changes_underneath() {
        let config = Arc::new(DataConfig::with_source(Interfering {
            node: OnceLock::new(),
            reads: AtomicUsize::new(0),
        }));
        let _ = config.source().node.set(Arc::downgrade(&config));

        config.load().unwrap();

        assert_eq!(config.source().reads.load(Ordering::SeqCst), 2);
        assert!(config.get_bool("written", false).unwrap());
        assert!(config.get_bool("loaded", false).unwrap());
    }

    #[test]
    fn test_bound_lookup_replaces_self_lookup() {
        struct Fixed;

        impl StrLookup for Fixed {
            fn lookup(&self, _name: &str) -> Result<Option<String>> {
                Ok(Some("bound".to_string()))
            }
        }

        let mut data = ConfigMap::new();
        data.insert("ref", "${other}");
        data.insert("other", "self");
        let config = DataConfig::with_snapshot(Scripted::new(vec![]), data);

        assert_eq!(config.get_str("ref", "").unwrap(), "self");

        config.set_lookup(Some(Arc::new(Fixed)));
        assert_eq!(config.get_str("ref", "").unwrap(), "bound");

        config.set_lookup(None);
        assert!(config.lookup().is_none());
        assert_eq!(config.get_str("ref", "").unwrap(), "self");
    }
}
