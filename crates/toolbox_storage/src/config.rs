//! Store configuration.
//!
//! # Responsibility
//! - Describe where a repository stores its data and how the connection is tuned.
//!
//! # Invariants
//! - `location = None` always means a fresh ephemeral store.
//! - `busy_timeout_ms` is interpreted as milliseconds.

use crate::db::StoreLocation;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration for opening a repository store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Database file path. `None` opens an ephemeral in-memory store.
    #[serde(default)]
    pub location: Option<PathBuf>,
    /// How long a writer waits for a lock held by another connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Whether to create the default `NoteStorage` table. Defaults to `true` only
    /// for ephemeral stores.
    #[serde(default)]
    pub bootstrap_default_schema: Option<bool>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::ephemeral()
    }
}

impl StoreConfig {
    pub fn ephemeral() -> Self {
        Self {
            location: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            bootstrap_default_schema: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Some(path.into()),
            ..Self::ephemeral()
        }
    }

    pub fn store_location(&self) -> StoreLocation {
        StoreLocation::from_path(self.location.as_ref())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn should_bootstrap(&self) -> bool {
        self.bootstrap_default_schema
            .unwrap_or_else(|| self.location.is_none())
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}
