//! Read-through cache for the configuration document.
//!
//! The first [`ConfigStore::get`] fetches from the store's [`ConfigSource`];
//! every later call, concurrent or not, gets the memoized outcome. Failures
//! are memoized too: retrying is the retry layer's business, and it gets the
//! same error back cheaply. Only [`ConfigStore::invalidate`] forces a refetch.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};

/// Where the configuration document comes from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Fetch the raw document text.
    async fn fetch(&self) -> LoaderResult<String>;
}

/// Fetches the document over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpConfigSource {
    url: String,
    client: reqwest::Client,
}

impl HttpConfigSource {
    /// Source that GETs `url` with a default client.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Source that GETs `url` with a caller-provided client.
    #[must_use]
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> LoaderResult<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LoaderError::config(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::config(&self.url, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| LoaderError::config(&self.url, e))
    }
}

/// Reads the document from a local file.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Source backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> LoaderResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| LoaderError::config(self.describe(), e))
    }
}

/// An in-memory document.
#[derive(Debug, Clone)]
pub struct StaticConfigSource {
    text: String,
}

impl StaticConfigSource {
    /// Source that always yields `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    fn describe(&self) -> String {
        "<static>".to_string()
    }

    async fn fetch(&self) -> LoaderResult<String> {
        Ok(self.text.clone())
    }
}

type Memo = Arc<OnceCell<LoaderResult<Arc<LoaderConfig>>>>;

/// Memoizing front for a [`ConfigSource`].
pub struct ConfigStore {
    source: Arc<dyn ConfigSource>,
    memo: Mutex<Memo>,
}

impl ConfigStore {
    /// Store reading from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            memo: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    fn current(&self) -> Memo {
        Arc::clone(&self.memo.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// The configuration, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns the memoized [`LoaderError::ConfigUnavailable`] if the fetch
    /// or parse failed.
    pub async fn get(&self) -> LoaderResult<Arc<LoaderConfig>> {
        let memo = self.current();
        memo.get_or_init(|| async {
            let source_name = self.source.describe();
            debug!(source = %source_name, "fetching loader config");
            let outcome = self
                .source
                .fetch()
                .await
                .and_then(|text| LoaderConfig::from_json(&source_name, &text))
                .map(Arc::new);
            match &outcome {
                Ok(config) => {
                    info!(source = %source_name, remotes = config.remotes.len(), "loader config loaded");
                },
                Err(e) => warn!(source = %source_name, error = %e, "loader config unavailable"),
            }
            outcome
        })
        .await
        .clone()
    }

    /// The configuration if it has already been fetched successfully.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<LoaderConfig>> {
        self.current()
            .get()
            .and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    /// Forget the memoized outcome so the next `get` fetches again.
    pub fn invalidate(&self) {
        *self.memo.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
        debug!(source = %self.source.describe(), "loader config invalidated");
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("source", &self.source.describe())
            .field("loaded", &self.peek().is_some())
            .finish()
    }
}
