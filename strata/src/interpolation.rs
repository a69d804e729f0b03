//! # Interpolation
//!
//! Resolves `${name}` placeholders in string values.
//!
//! Names are resolved through a [`StrLookup`]. Lookups compose with
//! [`ChainLookup`]; [`ConfigLookup`] reads from a config node and
//! [`EnvironmentLookup`] from the process environment.

use crate::Result;
use crate::decoder::Cast;
use crate::node::ConfigNode;
use errors::InterpolationError;
use regex::{Captures, Regex};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(.*?)\}").expect("placeholder pattern is valid"));

/// Nested resolutions allowed before a reference cycle is assumed.
pub const MAX_DEPTH: usize = 32;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter(text: &str) -> Result<Self> {
        let depth = DEPTH.with(|d| {
            let depth = d.get() + 1;
            d.set(depth);
            depth
        });
        let guard = Self;
        if depth > MAX_DEPTH {
            return Err(InterpolationError::RecursionLimit {
                text: text.to_string(),
                depth: MAX_DEPTH,
            }
            .into());
        }
        Ok(guard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Resolves a variable name to its replacement text.
pub trait StrLookup: Send + Sync {
    /// `Ok(None)` when the name is unknown.
    fn lookup(&self, name: &str) -> Result<Option<String>>;
}

/// Tries lookups from the last added to the first.
#[derive(Default, Clone)]
pub struct ChainLookup {
    lookups: Vec<Arc<dyn StrLookup>>,
}

impl ChainLookup {
    pub fn new(lookups: Vec<Arc<dyn StrLookup>>) -> Self {
        Self { lookups }
    }

    pub fn push(&mut self, lookup: Arc<dyn StrLookup>) {
        self.lookups.push(lookup);
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }
}

impl StrLookup for ChainLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        for lookup in self.lookups.iter().rev() {
            if let Some(value) = lookup.lookup(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// [`ChainLookup`] over borrowed lookups.
pub(crate) struct BorrowedChain<'a>(pub(crate) Vec<&'a dyn StrLookup>);

impl StrLookup for BorrowedChain<'_> {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        for lookup in self.0.iter().rev() {
            if let Some(value) = lookup.lookup(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// Reads process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentLookup;

impl StrLookup for EnvironmentLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        Ok(std::env::var(name).ok())
    }
}

/// Reads string values from a config node.
///
/// Holds the node weakly: composites bind a lookup of themselves into their
/// children, and a strong reference would keep the whole tree alive.
#[derive(Clone)]
pub struct ConfigLookup {
    config: Weak<dyn ConfigNode>,
}

impl ConfigLookup {
    pub fn new(config: &Arc<dyn ConfigNode>) -> Self {
        Self {
            config: Arc::downgrade(config),
        }
    }

    pub fn from_weak(config: Weak<dyn ConfigNode>) -> Self {
        Self { config }
    }
}

impl StrLookup for ConfigLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        let Some(config) = self.config.upgrade() else {
            return Ok(None);
        };
        lookup_str(config.as_ref(), name)
    }
}

/// Borrowed self-lookup used when a node has no lookup bound.
pub(crate) struct NodeLookup<'a>(pub(crate) &'a dyn ConfigNode);

impl StrLookup for NodeLookup<'_> {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        lookup_str(self.0, name)
    }
}

fn lookup_str(config: &dyn ConfigNode, name: &str) -> Result<Option<String>> {
    Ok(config
        .get_value(name, Some(&Cast::Str))?
        .map(|value| value.to_string()))
}

/// What to do with a placeholder whose name cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Fail with [`InterpolationError::MissingVariable`].
    #[default]
    Strict,
    /// Substitute an empty string.
    Lenient,
    /// Leave the placeholder as written.
    Keep,
}

/// `${name}` interpolator.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrInterpolator {
    policy: MissingPolicy,
}

impl StrInterpolator {
    pub fn new(policy: MissingPolicy) -> Self {
        Self { policy }
    }

    pub fn strict() -> Self {
        Self::new(MissingPolicy::Strict)
    }

    pub fn lenient() -> Self {
        Self::new(MissingPolicy::Lenient)
    }

    /// Leaves unresolved placeholders in the text. Used for file and URL
    /// locations, where a missing name surfaces as a location not found.
    pub fn keeping() -> Self {
        Self::new(MissingPolicy::Keep)
    }

    pub fn policy(&self) -> MissingPolicy {
        self.policy
    }

    /// Replace every `${name}` in `text` with its looked-up value.
    ///
    /// Each distinct name is looked up once. Replacement text is not scanned
    /// again, but a looked-up value is itself interpolated by the node that
    /// produced it.
    pub fn resolve(&self, text: &str, lookup: &dyn StrLookup) -> Result<String> {
        if !VARIABLE.is_match(text) {
            return Ok(text.to_string());
        }

        let _guard = DepthGuard::enter(text)?;

        let mut values: HashMap<&str, String> = HashMap::new();
        for caps in VARIABLE.captures_iter(text) {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if values.contains_key(name) {
                continue;
            }

            let value = match (lookup.lookup(name)?, self.policy) {
                (Some(value), _) => value,
                (None, MissingPolicy::Lenient) => String::new(),
                (None, MissingPolicy::Keep) => format!("${{{name}}}"),
                (None, MissingPolicy::Strict) => {
                    return Err(InterpolationError::MissingVariable {
                        name: name.to_string(),
                    }
                    .into());
                }
            };
            values.insert(name, value);
        }

        Ok(VARIABLE
            .replace_all(text, |caps: &Captures<'_>| {
                caps.get(1)
                    .and_then(|m| values.get(m.as_str()))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned())
    }
}
