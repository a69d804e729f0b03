//! # Command Line Config
//!
//! Reads `--key=value`, `-key=value`, `--key value` and `-key value`
//! arguments. Values are kept as strings; use a cast to decode them.

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use errors::ConfigError;
use strata_core::ConfigMap;

#[derive(Debug, Clone)]
pub struct CommandLineSource {
    args: Vec<String>,
}

impl CommandLineSource {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn parse(&self) -> Result<ConfigMap> {
        let mut data = ConfigMap::new();
        let mut args = self.args.iter();

        while let Some(arg) = args.next() {
            let name = arg
                .strip_prefix("--")
                .or_else(|| arg.strip_prefix('-'))
                .ok_or_else(|| unrecognized(arg))?;

            match name.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(unrecognized(arg));
                    }
                    data.insert(key, value.trim());
                }
                None => {
                    if name.is_empty() {
                        return Err(unrecognized(arg));
                    }
                    let value = args.next().ok_or_else(|| ConfigError::InvalidArgument {
                        argument: arg.clone(),
                        reason: "value is missing".to_string(),
                    })?;
                    data.insert(name, value.as_str());
                }
            }
        }

        Ok(data)
    }
}

fn unrecognized(arg: &str) -> ConfigError {
    ConfigError::InvalidArgument {
        argument: arg.to_string(),
        reason: "unrecognized format".to_string(),
    }
}

impl Source for CommandLineSource {
    fn read(&self, _ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        self.parse()
    }

    fn describe(&self) -> String {
        "command line".to_string()
    }
}

pub type CommandLineConfig = DataConfig<CommandLineSource>;

impl DataConfig<CommandLineSource> {
    /// Parse the process arguments, skipping the program name.
    pub fn new() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self::with_source(CommandLineSource {
            args: args.into_iter().map(Into::into).collect(),
        })
    }
}

impl Default for DataConfig<CommandLineSource> {
    fn default() -> Self {
        Self::new()
    }
}
