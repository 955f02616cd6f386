//! Firmware catalog types
//!
//! The catalog is the normalized form of the remote firmware manifest:
//! boards keyed by name, each carrying its firmware variants keyed by name.
//! Maps are ordered so that serializing the same catalog twice always
//! produces identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single flashable firmware variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    /// Path of the firmware image, relative to the manifest location
    pub relpath: String,
    /// Human-readable description shown to the operator
    pub description: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub speed: String,
    #[serde(rename = "arch", default)]
    pub architecture: String,
    /// Whether the board needs a manual reset before flashing (verbatim from the manifest)
    #[serde(rename = "manualreset", default)]
    pub manual_reset: String,
}

/// A control board and the firmware variants available for it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    /// Position of the board entry in the source manifest (skipped entries included)
    #[serde(rename = "idx")]
    pub index: usize,
    pub firmwares: BTreeMap<String, Firmware>,
}

impl Board {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            firmwares: BTreeMap::new(),
        }
    }

    /// Look up a firmware variant by name
    pub fn firmware(&self, name: &str) -> Option<&Firmware> {
        self.firmwares.get(name)
    }
}

/// Boards keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    boards: BTreeMap<String, Board>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a board, returning the board it replaced if the name was taken
    pub fn insert(&mut self, board: Board) -> Option<Board> {
        self.boards.insert(board.name.clone(), board)
    }

    pub fn get(&self, name: &str) -> Option<&Board> {
        self.boards.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.boards.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Iterate boards in name order
    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    /// Board names in name order
    pub fn board_names(&self) -> impl Iterator<Item = &str> {
        self.boards.keys().map(|k| k.as_str())
    }

    /// Serialize to the JSON shape served to the UI
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
