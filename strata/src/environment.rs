//! # Environment Config
//!
//! Snapshot of the process environment. Variable names are keys as-is, so
//! `DATABASE_URL` is read with `get("database_url")`.

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use strata_core::ConfigMap;

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentSource;

impl Source for EnvironmentSource {
    fn read(&self, _ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        Ok(std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect())
    }

    fn describe(&self) -> String {
        "environment".to_string()
    }
}

pub type EnvironmentConfig = DataConfig<EnvironmentSource>;

impl DataConfig<EnvironmentSource> {
    /// Unloaded environment node; variables are captured on `load`.
    pub fn new() -> Self {
        Self::with_source(EnvironmentSource)
    }
}

impl Default for DataConfig<EnvironmentSource> {
    fn default() -> Self {
        Self::new()
    }
}
