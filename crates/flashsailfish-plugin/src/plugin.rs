//! The plugin component
//!
//! The host builds one [`FlashSailfish`] at load time, handing it the
//! fetcher and settings store to use, and routes its firmware endpoints to
//! the handler methods here.

use anyhow::Result;
use flashsailfish_core::{Catalog, CatalogError, DocumentFetcher, ManifestCache, NormalizeReport};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::api::{PluginResponse, RefreshRequest, STATUS_INTERNAL_SERVER_ERROR};
use crate::config::DEFAULT_SOURCE_URL;
use crate::settings::SettingsStore;

/// Settings the host registers on the plugin's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsDefaults {
    pub url: String,
}

pub struct FlashSailfish<F, S> {
    cache: ManifestCache<F>,
    settings: S,
}

impl<F: DocumentFetcher, S: SettingsStore> FlashSailfish<F, S> {
    pub fn new(fetcher: F, settings: S) -> Self {
        Self {
            cache: ManifestCache::new(fetcher),
            settings,
        }
    }

    pub fn settings_defaults() -> SettingsDefaults {
        SettingsDefaults {
            url: DEFAULT_SOURCE_URL.to_string(),
        }
    }

    pub fn cache(&self) -> &ManifestCache<F> {
        &self.cache
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Currently configured manifest URL
    pub fn source_url(&self) -> String {
        self.settings.source_url()
    }

    /// Catalog from the configured manifest URL
    pub async fn catalog(&self) -> Result<Catalog, CatalogError> {
        self.cache.get_catalog(&self.source_url()).await
    }

    pub async fn catalog_with_report(&self) -> Result<(Catalog, NormalizeReport), CatalogError> {
        self.cache.get_catalog_with_report(&self.source_url()).await
    }

    /// Change the manifest URL
    ///
    /// Persists the URL and clears the cache when it differs from the current
    /// one. Returns whether anything changed. Nothing is fetched here.
    pub async fn set_source(&self, url: &str) -> Result<bool> {
        let current = self.settings.source_url();
        if current == url {
            debug!(url = %url, "Manifest URL unchanged");
            return Ok(false);
        }

        self.settings.set_source_url(url)?;
        self.cache.invalidate().await;
        info!(previous = %current, url = %url, "Manifest URL changed");
        Ok(true)
    }

    /// Handler for `GET /firmware_info`
    pub async fn firmware_info(&self) -> PluginResponse {
        let catalog = match self.catalog().await {
            Ok(catalog) => catalog,
            Err(e) => return PluginResponse::from(&e),
        };

        match catalog.to_json() {
            Ok(json) => PluginResponse::json(json),
            Err(e) => {
                error!(error = %e, "Failed to serialize firmware catalog");
                PluginResponse::error(
                    STATUS_INTERNAL_SERVER_ERROR,
                    format!("Failed to serialize firmware catalog: {}", e),
                )
            }
        }
    }

    /// Handler for `POST /refresh_firmware_info`
    ///
    /// Applies the URL from the request if one is given, always drops the
    /// cached manifest, then answers like [`firmware_info`](Self::firmware_info).
    pub async fn refresh_firmware_info(&self, request: RefreshRequest) -> PluginResponse {
        if let Some(url) = request.url.as_deref() {
            if let Err(e) = self.set_source(url).await {
                error!(url = %url, error = %e, "Failed to save manifest URL");
                return PluginResponse::error(
                    STATUS_INTERNAL_SERVER_ERROR,
                    format!("Unable to save firmware URL {}", url),
                );
            }
        }

        self.cache.invalidate().await;
        self.firmware_info().await
    }
}
