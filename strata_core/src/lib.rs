//! # Strata Core
//!
//! Data types shared by every crate of the strata configuration engine.
//!
//! This crate provides:
//! - [`Value`]: a raw configuration value (scalar, sequence or nested mapping)
//! - [`ConfigMap`]: the case-insensitive, case-preserving nested mapping that
//!   backs every snapshot
//! - Deep-merge of mappings with change tracking

pub mod map;
pub mod merge;
pub mod value;

pub use map::{ConfigMap, NESTED_DELIMITER};
pub use merge::{merge_all, merge_into};
pub use value::Value;
