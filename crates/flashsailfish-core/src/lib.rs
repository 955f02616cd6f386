//! Flash Sailfish Core - Firmware catalog types, manifest parsing, and caching
//!
//! This crate provides the pieces the plugin builds on:
//! - Catalog types (boards and their firmware variants)
//! - Manifest XML parsing and normalization into a catalog
//! - A single-slot manifest cache with lazy fetching and explicit invalidation

pub mod cache;
pub mod catalog;
pub mod manifest;

pub use cache::{sha256_hex, CachedDocument, CatalogError, DocumentFetcher, FetchError, ManifestCache};
pub use catalog::{Board, Catalog, Firmware};
pub use manifest::{normalize, BoardEntry, FirmwareEntry, ManifestDocument, NormalizeReport, ParseError};
