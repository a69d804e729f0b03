//! # URL Config
//!
//! Loads a payload over a [`Fetcher`] (HTTP by default) and follows
//! `@next` to further URLs.
//!
//! The reader is picked from the response content type first
//! (`application/json`, `text/x-yaml`, `application/vnd.yaml`, parameters
//! such as `; charset=utf-8` ignored) and from the URL path extension second.
//! Bodies must be UTF-8.

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use crate::interpolation::{BorrowedChain, EnvironmentLookup, StrInterpolator, StrLookup};
use crate::next::{Payload, load_chain};
use errors::ConfigError;
use parking_lot::Mutex;
use readers::{Reader, ReaderRegistry};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strata_core::ConfigMap;
use tracing::debug;

/// Timeout applied by [`HttpFetcher::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetched response.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL, after redirects.
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Retrieves the payload at a URL. Blocks until done or timed out.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Fetched>;
}

/// Blocking HTTP fetcher built on `reqwest`.
///
/// The client is created on first use, so constructing the fetcher inside an
/// async context is fine; `fetch` itself must run off the async workers.
pub struct HttpFetcher {
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            client: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self) -> Result<Client> {
        let mut client = self.client.lock();
        if let Some(client) = client.as_ref() {
            return Ok(client.clone());
        }

        let built = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| http_error("client", e))?;
        *client = Some(built.clone());
        Ok(built)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn http_error(url: &str, e: reqwest::Error) -> ConfigError {
    ConfigError::Source {
        source_name: url.to_string(),
        reason: e.to_string(),
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched> {
        let response = self
            .client()?
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| http_error(url, e))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().to_string();
        let body = response.bytes().map_err(|e| http_error(url, e))?.to_vec();

        Ok(Fetched {
            url: final_url,
            content_type,
            body,
        })
    }
}

/// Reader names suggested by a content type, e.g. `yaml` for `text/x-yaml`.
fn content_type_name(content_type: &str) -> Option<&str> {
    let mime = content_type.split(';').next()?.trim();
    let name = if mime.contains('.') {
        mime.rsplit('.').next()
    } else if mime.contains('-') {
        mime.rsplit('-').next()
    } else {
        mime.rsplit('/').next()
    }?;
    (!name.is_empty()).then_some(name)
}

fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let segment = parsed.path_segments()?.rfind(|s| !s.is_empty())?;
    Path::new(segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}

pub struct UrlSource {
    url: String,
    reader: Option<Arc<dyn Reader>>,
    registry: Arc<ReaderRegistry>,
    fetcher: Arc<dyn Fetcher>,
}

impl UrlSource {
    fn reader_for(&self, url: &str, content_type: Option<&str>) -> Result<Arc<dyn Reader>> {
        if let Some(reader) = &self.reader {
            return Ok(reader.clone());
        }

        let from_type = content_type.and_then(content_type_name).map(str::to_string);
        from_type
            .into_iter()
            .chain(url_extension(url))
            .find_map(|name| self.registry.get_reader(&name))
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                name: format!(
                    "{} (content type {})",
                    url,
                    content_type.unwrap_or("missing")
                ),
            })
    }

    fn fetch_one(&self, location: &str, ctx: &ReadContext<'_>) -> Result<Payload> {
        let lookup = BorrowedChain(vec![&EnvironmentLookup as &dyn StrLookup, ctx.lookup]);
        let url = StrInterpolator::keeping().resolve(location, &lookup)?;

        let fetched = self.fetcher.fetch(&url)?;
        let reader = self.reader_for(&fetched.url, fetched.content_type.as_deref())?;
        debug!(url = %fetched.url, format = reader.format(), "Reading config url");

        let text = String::from_utf8(fetched.body).map_err(|e| ConfigError::InvalidData {
            reason: format!("{} is not UTF-8: {}", fetched.url, e),
        })?;

        Ok(Payload {
            id: fetched.url,
            data: reader.read(&text)?,
        })
    }
}

impl Source for UrlSource {
    fn read(&self, ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        load_chain(&self.url, |location| self.fetch_one(location, ctx))
    }

    fn describe(&self) -> String {
        format!("url {}", self.url)
    }
}

pub type UrlConfig = DataConfig<UrlSource>;

impl DataConfig<UrlSource> {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_source(UrlSource {
            url: url.into(),
            reader: None,
            registry: Arc::new(ReaderRegistry::with_defaults()),
            fetcher: Arc::new(HttpFetcher::new()),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.source_mut().fetcher = fetcher;
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.source_mut().reader = Some(reader);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ReaderRegistry>) -> Self {
        self.source_mut().registry = registry;
        self
    }

    pub fn url(&self) -> &str {
        &self.source().url
    }
}
