//! # Reader Registry
//!
//! Maps format names (file extensions, content-type suffixes) to readers.
//!
//! The registry is a plain value: sources hold an `Arc<ReaderRegistry>` and
//! tests inject their own, so there is no process-wide table.

use crate::Reader;
use crate::formats::{IniReader, JsonReader, TomlReader, YamlReader};
use errors::ConfigError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Name → reader table. Names are matched case-insensitively.
pub struct ReaderRegistry {
    readers: RwLock<HashMap<String, Arc<dyn Reader>>>,
}

impl ReaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            readers: RwLock::new(HashMap::new()),
        }
    }

    /// A registry preloaded with `ini`, `json`, `yaml`, `yml` and `toml`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let yaml: Arc<dyn Reader> = Arc::new(YamlReader);
        registry.add_reader("ini", Arc::new(IniReader));
        registry.add_reader("json", Arc::new(JsonReader));
        registry.add_reader("yaml", yaml.clone());
        registry.add_reader("yml", yaml);
        registry.add_reader("toml", Arc::new(TomlReader));
        registry
    }

    /// Register `reader` under `name`, replacing any previous one.
    pub fn add_reader(&self, name: &str, reader: Arc<dyn Reader>) {
        debug!(name = %name, format = reader.format(), "Registering config reader");
        self.readers.write().insert(name.to_lowercase(), reader);
    }

    pub fn get_reader(&self, name: &str) -> Option<Arc<dyn Reader>> {
        self.readers.read().get(&name.to_lowercase()).cloned()
    }

    pub fn remove_reader(&self, name: &str) -> Option<Arc<dyn Reader>> {
        self.readers.write().remove(&name.to_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.readers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Pick the reader for `path` from its extension.
    pub fn reader_for_path(&self, path: &Path) -> Result<Arc<dyn Reader>, ConfigError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                name: path.display().to_string(),
            })?;

        self.get_reader(extension)
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                name: extension.to_string(),
            })
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("readers", &self.names())
            .finish()
    }
}
