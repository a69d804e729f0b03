//! # `@next` Chaining
//!
//! A payload may name another location under the reserved `@next` key. The
//! file and URL sources follow the chain, merging each payload over the
//! previous one so later payloads win.

use crate::Result;
use errors::ConfigError;
use std::collections::HashSet;
use strata_core::{ConfigMap, Value, merge_into};
use tracing::debug;

/// Reserved key naming the next location to load.
pub const NEXT_KEY: &str = "@next";

/// One payload read from a location.
pub(crate) struct Payload {
    /// Canonical identity of the location (absolute path, final URL).
    pub(crate) id: String,
    pub(crate) data: ConfigMap,
}

/// Follow the `@next` chain starting at `first`.
///
/// `fetch` resolves and reads one location. Revisiting a location already in
/// the chain is an error.
pub(crate) fn load_chain(
    first: &str,
    mut fetch: impl FnMut(&str) -> Result<Payload>,
) -> Result<ConfigMap> {
    let mut merged = ConfigMap::new();
    let mut visited = HashSet::new();
    let mut location = first.to_string();

    loop {
        let Payload { id, mut data } = fetch(&location)?;
        if !visited.insert(id.clone()) {
            return Err(ConfigError::InvalidNext {
                reason: format!("{} is already part of the chain", id),
            });
        }

        let next = data.remove(NEXT_KEY);
        merge_into(&mut merged, &data);

        match next {
            None | Some(Value::Null) => return Ok(merged),
            Some(Value::String(next)) => {
                debug!(from = %id, next = %next, "Following @next");
                location = next;
            }
            Some(other) => {
                return Err(ConfigError::InvalidNext {
                    reason: format!("{} must be a str, got {}", NEXT_KEY, other.type_name()),
                });
            }
        }
    }
}
