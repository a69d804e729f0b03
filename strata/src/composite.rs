//! # Composite Config
//!
//! [`CompositeConfig`] layers named children by precedence: reads ask the
//! most recently added child first and the first value found wins. Nothing
//! is merged; a mapping in a later child hides the whole mapping of an
//! earlier one.
//!
//! # Binding
//! Adding a child rebinds its interpolation lookup to the composite's root
//! lookup, so `${name}` in any child resolves against the whole tree, and
//! subscribes the composite to the child's `updated` event. Removing the
//! child undoes both.

use crate::Result;
use crate::decoder::Cast;
use crate::event::{EventHandler, ListenerId};
use crate::interpolation::{ConfigLookup, StrLookup};
use crate::node::ConfigNode;
use errors::ConfigError;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use strata_core::{ConfigMap, Value};
use tracing::{debug, info};

struct Child {
    name: String,
    node: Arc<dyn ConfigNode>,
    listener: ListenerId,
}

/// Ordered, uniquely named children shared by the composite nodes.
///
/// Readers take a snapshot of the node list and release the lock before
/// calling into children, so children may call back into the parent.
pub(crate) struct ChildSet {
    entries: RwLock<Vec<Child>>,
}

impl ChildSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.entries.read().iter().any(|child| child.name == name) {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Bind and store a child. With `load`, the child is loaded after binding
    /// and dropped again if that fails.
    pub(crate) fn add(
        &self,
        name: &str,
        node: Arc<dyn ConfigNode>,
        root_lookup: Arc<dyn StrLookup>,
        on_update: impl Fn(&()) + Send + Sync + 'static,
        load: bool,
    ) -> Result<()> {
        self.ensure_unique(name)?;

        node.set_lookup(Some(root_lookup));
        let listener = node.updated().add(on_update);

        if load {
            if let Err(e) = node.load() {
                unbind(&node, listener);
                return Err(e);
            }
        }

        let mut entries = self.entries.write();
        if entries.iter().any(|child| child.name == name) {
            drop(entries);
            unbind(&node, listener);
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
            });
        }

        info!(name = %name, source = %node.describe(), "Added config");
        entries.push(Child {
            name: name.to_string(),
            node,
            listener,
        });
        Ok(())
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        let child = {
            let mut entries = self.entries.write();
            let position = entries.iter().position(|child| child.name == name)?;
            entries.remove(position)
        };

        unbind(&child.node, child.listener);
        info!(name = %name, "Removed config");
        Some(child.node)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        self.entries
            .read()
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.node.clone())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|child| child.name.clone())
            .collect()
    }

    /// Children in add order.
    pub(crate) fn nodes(&self) -> Vec<(String, Arc<dyn ConfigNode>)> {
        self.entries
            .read()
            .iter()
            .map(|child| (child.name.clone(), child.node.clone()))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn rebind(&self, lookup: &Arc<dyn StrLookup>) {
        for (_, node) in self.nodes() {
            node.set_lookup(Some(lookup.clone()));
        }
    }

    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.write());
        for child in entries {
            unbind(&child.node, child.listener);
        }
    }
}

fn unbind(node: &Arc<dyn ConfigNode>, listener: ListenerId) {
    node.set_lookup(None);
    if let Err(e) = node.updated().remove(listener) {
        debug!("Child listener already removed: {}", e);
    }
}

/// Precedence composite: later children override earlier ones.
pub struct CompositeConfig {
    me: Weak<CompositeConfig>,
    children: ChildSet,
    lookup: RwLock<Option<Arc<dyn StrLookup>>>,
    load_on_add: bool,
    updated: EventHandler,
}

impl CompositeConfig {
    pub fn new() -> Arc<Self> {
        Self::with_load_on_add(false)
    }

    /// With `load_on_add`, [`add_config`](Self::add_config) loads each child
    /// as it is added and rejects children that fail to load.
    pub fn with_load_on_add(load_on_add: bool) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            children: ChildSet::new(),
            lookup: RwLock::new(None),
            load_on_add,
            updated: EventHandler::new(),
        })
    }

    pub fn load_on_add(&self) -> bool {
        self.load_on_add
    }

    /// Add a child under a unique name. It takes precedence over every child
    /// added before it.
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
            self.load_on_add,
        )
    }

    /// Remove and unbind a child.
    pub fn remove_config(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        self.children.remove(name)
    }

    pub fn get_config(&self, name: &str) -> Option<Arc<dyn ConfigNode>> {
        self.children.get(name)
    }

    /// Child names in add order.
    pub fn config_names(&self) -> Vec<String> {
        self.children.names()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.len() == 0
    }

    fn root_lookup(&self) -> Arc<dyn StrLookup> {
        match self.lookup.read().clone() {
            Some(lookup) => lookup,
            None => Arc::new(ConfigLookup::from_weak(self.me.clone())),
        }
    }
}

impl ConfigNode for CompositeConfig {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.children
            .nodes()
            .iter()
            .rev()
            .find_map(|(_, node)| node.get_raw(key))
    }

    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>> {
        for (_, node) in self.children.nodes().iter().rev() {
            if let Some(value) = node.get_value(key, cast)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn load(&self) -> Result<()> {
        for (name, node) in self.children.nodes() {
            debug!(name = %name, "Loading child config");
            node.load()?;
        }
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

    /// Union of the children's top-level keys, later children winning.
    fn raw_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        for (_, node) in self.children.nodes() {
            map.extend(node.raw_map());
        }
        map
    }

    fn describe(&self) -> String {
        format!("composite({})", self.config_names().join(", "))
    }
}

impl Drop for CompositeConfig {
    fn drop(&mut self) {
        self.children.clear();
    }
}
