//! # Properties
//!
//! Cached, typed views of single keys.
//!
//! A [`PropertyManager`] watches a config node and bumps a shared version
//! number whenever the node fires `updated`. Each [`Property`] caches its
//! decoded value together with the version it was read at and re-reads only
//! after the version moved. Property listeners fire only when the re-read
//! value differs from the cached one.
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::{MemoryConfig, PropertyManager};
//!
//! let config = Arc::new(MemoryConfig::from_pairs([("workers", "4")]));
//! let properties = PropertyManager::new(config.clone());
//! let workers = properties.get_property("workers").as_int(1);
//!
//! assert_eq!(workers.get(), 4);
//! config.set("workers", 8);
//! assert_eq!(workers.get(), 8);
//! ```

use crate::decoder::FromValue;
use crate::event::{EventHandler, ListenerId};
use crate::node::{ConfigNode, ConfigNodeExt};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use strata_core::{ConfigMap, Value};
use tracing::{debug, warn};

/// Types a [`Property`] can hold.
pub trait PropertyValue: FromValue + Clone + PartialEq + Send + Sync + 'static {}

impl<T: FromValue + Clone + PartialEq + Send + Sync + 'static> PropertyValue for T {}

/// Data version shared by a manager and its properties.
struct Version {
    number: AtomicU64,
    changed: EventHandler,
}

impl Version {
    fn new() -> Self {
        Self {
            number: AtomicU64::new(0),
            changed: EventHandler::new(),
        }
    }

    fn current(&self) -> u64 {
        self.number.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        let version = self.number.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(version, "Config changed, invalidating properties");
        self.changed.invoke(&());
    }
}

/// Hands out one [`PropertyContainer`] per key of a config node.
pub struct PropertyManager {
    config: Arc<dyn ConfigNode>,
    version: Arc<Version>,
    containers: Mutex<HashMap<String, Arc<PropertyContainer>>>,
    listener: ListenerId,
}

impl PropertyManager {
    pub fn new(config: Arc<dyn ConfigNode>) -> Self {
        let version = Arc::new(Version::new());
        let bump = version.clone();
        let listener = config.updated().add(move |_| bump.bump());

        Self {
            config,
            version,
            containers: Mutex::new(HashMap::new()),
            listener,
        }
    }

    /// Container for `name`. The same container is returned for the same
    /// name.
    pub fn get_property(&self, name: &str) -> Arc<PropertyContainer> {
        self.containers
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(PropertyContainer {
                    name: name.to_string(),
                    config: self.config.clone(),
                    version: self.version.clone(),
                    properties: Mutex::new(Vec::new()),
                })
            })
            .clone()
    }

    /// Number of config updates seen so far.
    pub fn version(&self) -> u64 {
        self.version.current()
    }
}

impl Drop for PropertyManager {
    fn drop(&mut self) {
        if let Err(e) = self.config.updated().remove(self.listener) {
            debug!("Property manager listener already removed: {}", e);
        }
    }
}

impl fmt::Debug for PropertyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyManager")
            .field("config", &self.config.describe())
            .field("version", &self.version())
            .finish()
    }
}

/// Typed properties of one key, one per type and default.
pub struct PropertyContainer {
    name: String,
    config: Arc<dyn ConfigNode>,
    version: Arc<Version>,
    properties: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
}

impl PropertyContainer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_bool(&self, default: bool) -> Arc<Property<bool>> {
        self.as_type(default)
    }

    pub fn as_int(&self, default: i64) -> Arc<Property<i64>> {
        self.as_type(default)
    }

    pub fn as_float(&self, default: f64) -> Arc<Property<f64>> {
        self.as_type(default)
    }

    pub fn as_str(&self, default: &str) -> Arc<Property<String>> {
        self.as_type(default.to_string())
    }

    pub fn as_list(&self, default: Vec<Value>) -> Arc<Property<Vec<Value>>> {
        self.as_type(default)
    }

    pub fn as_map(&self, default: ConfigMap) -> Arc<Property<ConfigMap>> {
        self.as_type(default)
    }

    /// Property decoding the key to `T`, reused for an equal default.
    pub fn as_type<T: PropertyValue>(&self, default: T) -> Arc<Property<T>> {
        let mut properties = self.properties.lock();
        let existing = properties
            .iter()
            .filter_map(|property| property.clone().downcast::<Property<T>>().ok())
            .find(|property| property.default == default);
        if let Some(property) = existing {
            return property;
        }

        let property = Property::new(
            self.name.clone(),
            default,
            self.config.clone(),
            self.version.clone(),
        );
        properties.push(property.clone());
        property
    }
}

impl fmt::Debug for PropertyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyContainer")
            .field("name", &self.name)
            .field("properties", &self.properties.lock().len())
            .finish()
    }
}

struct Cached<T> {
    version: Option<u64>,
    value: T,
}

/// Latest value of one key decoded to `T`.
///
/// Listeners added with [`on_updated`](Property::on_updated) receive the new
/// value. The property listens for config changes only while it has
/// listeners.
pub struct Property<T: PropertyValue> {
    name: String,
    default: T,
    config: Arc<dyn ConfigNode>,
    version: Arc<Version>,
    cached: Mutex<Cached<T>>,
    updated: EventHandler<T>,
    subscription: Arc<Mutex<Option<ListenerId>>>,
}

impl<T: PropertyValue> Property<T> {
    fn new(
        name: String,
        default: T,
        config: Arc<dyn ConfigNode>,
        version: Arc<Version>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let subscription: Arc<Mutex<Option<ListenerId>>> = Arc::default();

            let subscribe = {
                let me = me.clone();
                let version = version.clone();
                let subscription = subscription.clone();
                move |count: usize| {
                    if count > 0 {
                        return;
                    }
                    let Some(property) = me.upgrade() else {
                        return;
                    };
                    // Compare later changes against the value seen now.
                    property.get();
                    let me = me.clone();
                    let id = version.changed.add(move |_| {
                        if let Some(property) = me.upgrade() {
                            property.refresh();
                        }
                    });
                    *subscription.lock() = Some(id);
                }
            };
            let unsubscribe = {
                let version = version.clone();
                let subscription = subscription.clone();
                move |count: usize| {
                    if count == 0 {
                        release(&version, &subscription);
                    }
                }
            };

            Self {
                cached: Mutex::new(Cached {
                    version: None,
                    value: default.clone(),
                }),
                name,
                default,
                config,
                version,
                updated: EventHandler::with_hooks(subscribe, unsubscribe),
                subscription,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn updated(&self) -> &EventHandler<T> {
        &self.updated
    }

    /// Current value, re-read from the config only after it changed. Read
    /// errors are logged and yield the default.
    pub fn get(&self) -> T {
        let latest = self.version.current();
        let mut cached = self.cached.lock();
        if cached.version == Some(latest) {
            return cached.value.clone();
        }

        let value = match self.config.get_as::<T>(&self.name) {
            Ok(Some(value)) => value,
            Ok(None) => self.default.clone(),
            Err(e) => {
                warn!(property = %self.name, error = %e, "Unable to get current version of property");
                self.default.clone()
            }
        };

        cached.version = Some(latest);
        cached.value = value.clone();
        value
    }

    pub fn on_updated(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        self.updated.add(callback)
    }

    fn refresh(&self) {
        let previous = self.cached.lock().value.clone();
        let current = self.get();
        if previous != current {
            self.updated.invoke(&current);
        }
    }
}

fn release(version: &Version, subscription: &Mutex<Option<ListenerId>>) {
    if let Some(id) = subscription.lock().take() {
        if let Err(e) = version.changed.remove(id) {
            debug!("Property listener already removed: {}", e);
        }
    }
}

impl<T: PropertyValue> Drop for Property<T> {
    fn drop(&mut self) {
        release(&self.version, &self.subscription);
    }
}

impl<T: PropertyValue + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("value", &self.cached.lock().value)
            .finish()
    }
}
