//! # Merge Config
//!
//! [`MergeConfig`] deep-merges the raw data of its children into one
//! snapshot on `load`. Mappings merge key by key with later children winning
//! each collision; anything else is replaced wholesale.
//!
//! Reads go to the merged snapshot only, so a child's changes become visible
//! after the next `load` of the merge node.

use crate::Result;
use crate::composite::ChildSet;
use crate::decoder::{Cast, Decoder};
use crate::event::EventHandler;
use crate::interpolation::{ConfigLookup, StrInterpolator, StrLookup};
use crate::node::{ConfigNode, resolve_value};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use strata_core::{ConfigMap, Value, merge_into};
use tracing::{debug, info};

pub struct MergeConfig {
    me: Weak<MergeConfig>,
    children: ChildSet,
    data: ArcSwap<ConfigMap>,
    lookup: RwLock<Option<Arc<dyn StrLookup>>>,
    decoder: Arc<Decoder>,
    interpolator: StrInterpolator,
    updated: EventHandler,
}

impl MergeConfig {
    pub fn new() -> Arc<Self> {
        Self::with_decoder(Arc::new(Decoder::new()))
    }

    pub fn with_decoder(decoder: Arc<Decoder>) -> Arc<Self> {
        Self::build(decoder, StrInterpolator::default())
    }

    pub fn with_interpolator(interpolator: StrInterpolator) -> Arc<Self> {
        Self::build(Arc::new(Decoder::new()), interpolator)
    }

    fn build(decoder: Arc<Decoder>, interpolator: StrInterpolator) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            children: ChildSet::new(),
            data: ArcSwap::from_pointee(ConfigMap::new()),
            lookup: RwLock::new(None),
            decoder,
            interpolator,
            updated: EventHandler::new(),
        })
    }

    /// Add a child. Its data is merged over earlier children on the next
    /// `load`.
    pub fn add_config(&self, name: &str, config: Arc<dyn ConfigNode>) -> Result<()> {
        let me = self.me.clone();
        self.children.add(
            name,
            config,
            self.root_lookup(),
            move |_| {
                if let Some(me) = me.upgrade() {
                    me.updated.invoke(&());
                }
            },
            false,
        )
    }

    pub fn remove_config(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        self.children.remove(name)
    }

    pub fn get_config(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        self.children.get(name)
    }

    pub fn config_names(&self) -> Vec<String> {
        self.children.names()
    }

    /// The merged snapshot from the last successful `load`.
    pub fn snapshot(&self) -> Arc<ConfigMap> {
        self.data.load_full()
    }

    fn root_lookup(&self) -> Arc<dyn StrLookup> {
        match self.lookup.read().clone() {
            Some(lookup) => lookup,
            None => Arc::new(ConfigLookup::from_weak(self.me.clone())),
        }
    }
}

impl ConfigNode for MergeConfig {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.data.load().lookup(key).cloned()
    }

    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>> {
        let raw = self.get_raw(key);
        let lookup = self.root_lookup();
        resolve_value(raw, &self.interpolator, lookup.as_ref(), &self.decoder, cast)
    }

    /// Load every child in add order, then merge and swap. A failing child
    /// aborts the load and keeps the previous merged snapshot.
    fn load(&self) -> Result<()> {
        let mut merged = ConfigMap::new();
        for (name, node) in self.children.nodes() {
            node.load()?;
            let changes = merge_into(&mut merged, &node.raw_map());
            if !changes.is_empty() {
                debug!("Configuration from {}: {:?}", name, changes);
            }
        }

        let previous = self.data.load_full();
        if *previous != merged {
            info!(
                children = self.children.len(),
                keys = merged.len(),
                "Merged configuration changed"
            );
        }
        self.data.store(Arc::new(merged));
        Ok(())
    }

    fn updated(&self) -> &EventHandler {
        &self.updated
    }

    fn lookup(&self) -> Option<Arc<dyn StrLookup>> {
        self.lookup.read().clone()
    }

    fn set_lookup(&self, lookup: Option<Arc<dyn StrLookup>>) {
        *self.lookup.write() = lookup;
        self.children.rebind(&self.root_lookup());
    }

    fn raw_map(&self) -> ConfigMap {
        ConfigMap::clone(&self.data.load())
    }

    fn describe(&self) -> String {
        format!("merge({})", self.config_names().join(", "))
    }
}

impl Drop for MergeConfig {
    fn drop(&mut self) {
        self.children.clear();
    }
}
