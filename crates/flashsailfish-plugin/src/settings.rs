//! Settings store for the manifest source URL
//!
//! The host normally owns settings persistence. [`FileSettings`] keeps the
//! URL in the TOML configuration file for standalone use, and
//! [`MemorySettings`] is for hosts that persist settings themselves.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::config::{load_config, save_config, Config, DEFAULT_SOURCE_URL};

pub trait SettingsStore: Send + Sync {
    /// Currently configured manifest URL
    fn source_url(&self) -> String;

    /// Persist a new manifest URL
    fn set_source_url(&self, url: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settings backed by the TOML configuration file
pub struct FileSettings {
    path: PathBuf,
    config: Mutex<Config>,
}

impl FileSettings {
    /// Load settings from `path`, using defaults if the file doesn't exist yet
    pub fn load(path: &Path) -> Result<Self> {
        let config = load_config(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config: Mutex::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Config {
        lock(&self.config).clone()
    }
}

impl SettingsStore for FileSettings {
    fn source_url(&self) -> String {
        lock(&self.config).source.url.clone()
    }

    fn set_source_url(&self, url: &str) -> Result<()> {
        let mut config = lock(&self.config);
        let mut updated = config.clone();
        updated.source.url = url.to_string();
        save_config(&self.path, &updated)?;
        *config = updated;

        info!(path = %self.path.display(), url = %url, "Saved manifest URL");
        Ok(())
    }
}

/// Settings held in memory only
pub struct MemorySettings {
    url: Mutex<String>,
}

impl MemorySettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Mutex::new(url.into()),
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_URL)
    }
}

impl SettingsStore for MemorySettings {
    fn source_url(&self) -> String {
        lock(&self.url).clone()
    }

    fn set_source_url(&self, url: &str) -> Result<()> {
        *lock(&self.url) = url.to_string();
        Ok(())
    }
}
