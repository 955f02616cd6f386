//! Single-slot firmware manifest cache
//!
//! The cache holds at most one raw manifest document. It is filled lazily on
//! the first catalog read and kept until [`ManifestCache::invalidate`] is
//! called. The catalog itself is never stored: every read re-parses and
//! re-normalizes the cached text, so the result is always a pure function of
//! the cached document.
//!
//! A failed fetch leaves the slot empty. A failed parse keeps the document
//! cached so the next read re-parses it without going back to the network.

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::manifest::{normalize, ManifestDocument, NormalizeReport, ParseError};

/// Transport-level failure reaching the manifest URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::Status { url, .. } => url,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unable to retrieve firmware information: {0}")]
    Fetch(#[from] FetchError),
    #[error("Retrieved firmware information from {url}, but was unable to understand the response: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

impl CatalogError {
    /// URL of the manifest the failed read was for
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(e) => e.url(),
            Self::Parse { url, .. } => url,
        }
    }
}

/// Source of raw manifest text
///
/// Implementations own their timeout and transport policy. The cache never
/// retries a failed fetch.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// A fetched manifest document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    /// URL the document was fetched from
    pub url: String,
    /// Raw manifest text
    pub text: String,
    /// SHA256 of the text
    pub sha: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedDocument {
    pub fn new(url: impl Into<String>, text: String) -> Self {
        let sha = sha256_hex(text.as_bytes());
        Self {
            url: url.into(),
            text,
            sha,
            fetched_at: Utc::now(),
        }
    }

    /// First 8 characters of the SHA, for logging
    pub fn short_sha(&self) -> &str {
        &self.sha[..8.min(self.sha.len())]
    }
}

/// Lazily-filled manifest cache around a [`DocumentFetcher`]
pub struct ManifestCache<F> {
    fetcher: F,
    /// Held across fetch-and-populate so only one fetch is ever in flight
    slot: Mutex<Option<CachedDocument>>,
}

impl<F: DocumentFetcher> ManifestCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            slot: Mutex::new(None),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Get the catalog for `url`, fetching the manifest if nothing is cached
    pub async fn get_catalog(&self, url: &str) -> Result<Catalog, CatalogError> {
        self.get_catalog_with_report(url)
            .await
            .map(|(catalog, _)| catalog)
    }

    /// Like [`get_catalog`](Self::get_catalog), also returning what normalization skipped
    pub async fn get_catalog_with_report(
        &self,
        url: &str,
    ) -> Result<(Catalog, NormalizeReport), CatalogError> {
        let document = {
            let mut slot = self.slot.lock().await;

            let cached = match slot.take() {
                Some(doc) if doc.url == url => {
                    debug!(
                        url = %url,
                        sha = %doc.short_sha(),
                        age_secs = (Utc::now() - doc.fetched_at).num_seconds(),
                        "Using cached firmware manifest"
                    );
                    doc
                }
                stale => {
                    if let Some(doc) = stale {
                        info!(
                            cached_url = %doc.url,
                            url = %url,
                            "Cached firmware manifest is for a different URL, refetching"
                        );
                    }
                    self.fetch_document(url).await?
                }
            };
            let cached = slot.insert(cached);

            ManifestDocument::from_xml(&cached.text).map_err(|e| {
                warn!(
                    url = %url,
                    sha = %cached.short_sha(),
                    error = %e,
                    "Retrieved firmware manifest but could not parse it"
                );
                CatalogError::Parse {
                    url: url.to_string(),
                    source: e,
                }
            })?
        };

        let (catalog, report) = normalize(&document);
        debug!(
            url = %url,
            boards = catalog.len(),
            boards_skipped = report.boards_skipped,
            firmwares_skipped = report.firmwares_skipped,
            "Normalized firmware manifest"
        );

        Ok((catalog, report))
    }

    async fn fetch_document(&self, url: &str) -> Result<CachedDocument, FetchError> {
        info!(url = %url, "Fetching firmware manifest");

        let text = match self.fetcher.fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to fetch firmware manifest");
                return Err(e);
            }
        };

        let document = CachedDocument::new(url, text);
        info!(
            url = %url,
            sha = %document.short_sha(),
            bytes = document.text.len(),
            "Fetched firmware manifest"
        );
        Ok(document)
    }

    /// Drop the cached document; the next read fetches again
    pub async fn invalidate(&self) {
        if let Some(doc) = self.slot.lock().await.take() {
            info!(url = %doc.url, sha = %doc.short_sha(), "Cleared firmware manifest cache");
        }
    }

    /// The cached raw document, if any
    pub async fn raw_document(&self) -> Option<CachedDocument> {
        self.slot.lock().await.clone()
    }

    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// Compute SHA256 hash of data and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}
