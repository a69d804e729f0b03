//! # File Config
//!
//! Loads a file found by name in a list of search paths, parsed by a reader
//! chosen from its extension, and follows `@next` to further files.
//!
//! The bare filename is tried first, then each search path joined with it.
//! Both may contain `${VAR}` placeholders and a leading `~`. Placeholders
//! resolve against the node's lookup first and the process environment
//! second; one that resolves nowhere stays as written, so the file is
//! reported as not found.

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use crate::interpolation::{BorrowedChain, EnvironmentLookup, StrInterpolator, StrLookup};
use crate::next::{Payload, load_chain};
use errors::ConfigError;
use readers::{Reader, ReaderRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::ConfigMap;
use tracing::debug;

pub struct FileSource {
    filename: String,
    paths: Vec<String>,
    reader: Option<Arc<dyn Reader>>,
    registry: Arc<ReaderRegistry>,
}

impl FileSource {
    fn find(&self, filename: &str, ctx: &ReadContext<'_>) -> Result<PathBuf> {
        let lookup = BorrowedChain(vec![&EnvironmentLookup as &dyn StrLookup, ctx.lookup]);
        let interpolator = StrInterpolator::keeping();
        let filename = expand_home(&interpolator.resolve(filename, &lookup)?);

        if filename.is_file() {
            return Ok(filename);
        }
        if !filename.is_absolute() {
            for path in &self.paths {
                let dir = expand_home(&interpolator.resolve(path, &lookup)?);
                let candidate = dir.join(&filename);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(ConfigError::FileNotFound {
            path: filename.display().to_string(),
        })
    }

    fn read_file(&self, path: &Path) -> Result<ConfigMap> {
        let reader = match &self.reader {
            Some(reader) => reader.clone(),
            None => self.registry.reader_for_path(path)?,
        };
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), format = reader.format(), "Reading config file");
        reader.read(&text)
    }
}

/// Replace a leading `~` with the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

impl Source for FileSource {
    fn read(&self, ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        load_chain(&self.filename, |location| {
            let path = self.find(location, ctx)?;
            let data = self.read_file(&path)?;
            let id = path.canonicalize().unwrap_or(path).display().to_string();
            Ok(Payload { id, data })
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.filename)
    }
}

pub type FileConfig = DataConfig<FileSource>;

impl DataConfig<FileSource> {
    /// File node reading `filename`, relative to the working directory or
    /// to one of the search paths. Nothing is read until `load`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self::with_source(FileSource {
            filename: filename.into(),
            paths: Vec::new(),
            reader: None,
            registry: Arc::new(ReaderRegistry::with_defaults()),
        })
    }

    /// Directories searched in order for the file.
    pub fn with_paths<P: Into<String>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.source_mut().paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Use `reader` for every file instead of picking one by extension.
    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.source_mut().reader = Some(reader);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ReaderRegistry>) -> Self {
        self.source_mut().registry = registry;
        self
    }

    pub fn filename(&self) -> &str {
        &self.source().filename
    }

    pub fn paths(&self) -> &[String] {
        &self.source().paths
    }
}
