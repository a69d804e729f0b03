//! # Strata Errors
//!
//! Error taxonomy for the strata configuration engine.
//!
//! - Uses `thiserror` for structured error definitions
//! - `ConfigError` is the error every node operation returns; the narrower
//!   kinds convert into it transparently so callers can still match on them

use thiserror::Error;

/// Boxed cause carried by wrapping errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported config format: {name}")]
    UnsupportedFormat { name: String },

    #[error("Invalid @next reference: {reason}")]
    InvalidNext { reason: String },

    #[error("Configuration with name {name} already exists")]
    DuplicateName { name: String },

    #[error("Invalid argument {argument}: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("Invalid configuration data: {reason}")]
    InvalidData { reason: String },

    #[error("Failed to parse {format}: {reason}")]
    Parse { format: String, reason: String },

    #[error("Source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A value could not be converted to the requested type.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Cannot decode a null value to {target}")]
    NullValue { target: String },

    #[error("Type {target} not supported")]
    Unsupported { target: String },

    #[error("Error decoding {value} to {target}: {source}")]
    Conversion {
        value: String,
        target: String,
        #[source]
        source: BoxError,
    },
}

impl DecodeError {
    pub fn conversion(
        value: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Conversion {
            value: value.into(),
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Placeholder resolution failed.
#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("Interpolation variable {name} not found")]
    MissingVariable { name: String },

    #[error("Interpolation of {text} exceeded {depth} nested lookups")]
    RecursionLimit { text: String, depth: usize },
}

/// Scheduler misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler is closed")]
    Closed,

    #[error("Interval must be greater than zero")]
    InvalidInterval,

    #[error("Unable to start scheduler runtime: {reason}")]
    Runtime { reason: String },
}
