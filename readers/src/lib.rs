//! # Configuration Readers
//!
//! Turns text payloads into plain [`ConfigMap`] snapshots.
//!
//! This crate provides:
//! - The [`Reader`] trait every format implements
//! - INI, JSON, YAML and TOML readers
//! - [`ReaderRegistry`], an injectable name → reader table used by the file
//!   and URL sources to pick a reader from an extension or content type

pub mod formats;
pub mod registry;

pub use formats::{IniReader, JsonReader, TomlReader, YamlReader};
pub use registry::ReaderRegistry;

use errors::ConfigError;
use std::fmt;
use strata_core::ConfigMap;

/// Parses a UTF-8 text payload into a nested mapping.
pub trait Reader: Send + Sync {
    /// Short format name used in error messages (`json`, `yaml`, ...).
    fn format(&self) -> &'static str;

    fn read(&self, text: &str) -> Result<ConfigMap, ConfigError>;
}

impl fmt::Debug for dyn Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").field("format", &self.format()).finish()
    }
}
