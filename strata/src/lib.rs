//! # Strata
//!
//! Layered configuration for long-running services.
//!
//! A configuration is a tree of nodes. Leaves ([`MemoryConfig`],
//! [`EnvironmentConfig`], [`CommandLineConfig`], [`FileConfig`],
//! [`UrlConfig`], [`StoreConfig`]) each hold an atomically swapped snapshot.
//! Composites combine them by precedence ([`CompositeConfig`]) or by deep
//! merge ([`MergeConfig`]). [`PrefixedConfig`] narrows a tree to a sub-key
//! and [`PollingConfig`] reloads a tree on a fixed delay.
//!
//! Reads go through [`ConfigNodeExt::get`]: dotted-path lookup, `${name}`
//! interpolation of strings, then decoding to the requested [`Cast`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strata::{
//!     CompositeConfig, ConfigNode, ConfigNodeExt, EnvironmentConfig, FileConfig, SharedNode,
//! };
//!
//! # async fn run() -> strata::Result<()> {
//! let config = CompositeConfig::new();
//! config.add_config("file", Arc::new(FileConfig::new("settings.yaml")))?;
//! config.add_config("env", Arc::new(EnvironmentConfig::new()))?;
//!
//! let config = config.reload_every(Duration::from_secs(30))?;
//! config.load()?;
//!
//! let port = config.get_int("server.port", 8080)?;
//! # let _ = port;
//! # Ok(())
//! # }
//! ```

pub mod command_line;
pub mod composite;
pub mod data;
pub mod decoder;
pub mod environment;
pub mod event;
pub mod file;
pub mod interpolation;
pub mod memory;
pub mod merge;
pub mod next;
pub mod node;
pub mod polling;
pub mod prefixed;
pub mod property;
pub mod scheduler;
pub mod store;
pub mod url;

pub use command_line::CommandLineConfig;
pub use composite::CompositeConfig;
pub use data::{DataConfig, ReadContext, Source};
pub use decoder::{Cast, Converter, Decoder, FromValue};
pub use environment::EnvironmentConfig;
pub use event::{EventHandler, ListenerId};
pub use file::FileConfig;
pub use interpolation::{
    ChainLookup, ConfigLookup, EnvironmentLookup, MissingPolicy, StrInterpolator, StrLookup,
};
pub use memory::MemoryConfig;
pub use merge::MergeConfig;
pub use node::{ConfigNode, ConfigNodeExt, Fallback, SharedNode};
pub use polling::PollingConfig;
pub use prefixed::PrefixedConfig;
pub use property::{Property, PropertyContainer, PropertyManager, PropertyValue};
pub use scheduler::{FixedIntervalScheduler, Scheduler};
pub use store::{KeyValueStore, StoreConfig};
pub use url::{Fetched, Fetcher, HttpFetcher, UrlConfig};

pub use errors::{ConfigError, DecodeError, InterpolationError, SchedulerError};
pub use readers::{Reader, ReaderRegistry};
pub use strata_core::{ConfigMap, Value};

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
