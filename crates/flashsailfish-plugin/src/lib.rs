//! Flash Sailfish Plugin - The component a printer host loads to serve the firmware catalog
//!
//! The host constructs one [`FlashSailfish`] with its collaborators and routes
//! requests to it. This crate provides:
//! - The plugin component and its route-handler operations
//! - An HTTP manifest fetcher backed by reqwest
//! - TOML configuration and the settings store holding the manifest URL

pub mod api;
pub mod config;
pub mod fetch;
pub mod plugin;
pub mod settings;

pub use api::{PluginResponse, RefreshRequest, ResponseBody};
pub use config::{Config, DEFAULT_SOURCE_URL};
pub use fetch::HttpFetcher;
pub use plugin::{FlashSailfish, SettingsDefaults};
pub use settings::{FileSettings, MemorySettings, SettingsStore};
