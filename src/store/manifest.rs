// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository bookkeeping.
//!
//! The manifest records which repositories have been pulled into the store
//! and when. It never tracks item-level state, items are always derived by
//! scanning.
//!
//! Reads and writes are whole-file JSON round-trips. There is no locking, so
//! concurrent invocations race on read-modify-write and the last writer wins.
//! A missing or corrupt manifest is treated as a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// File name of the manifest inside the store root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Persisted store bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Manifest {
    /// Schema version.
    pub version: u32,

    /// Pulled repositories keyed by `owner/repo`.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepoEntry>,

    /// Last time the manifest was written.
    pub last_updated: DateTime<Utc>,

    /// Repository used by push when none is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            repositories: BTreeMap::new(),
            last_updated: Utc::now(),
            linked: None,
        }
    }
}

impl Manifest {
    /// Load manifest from target path.
    ///
    /// Missing or corrupt files yield a fresh manifest.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no manifest at {}, starting fresh", path.display());
                return Self::default();
            }
            Err(error) => {
                warn!("cannot read manifest at {}: {error}", path.display());
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|error| {
            warn!("corrupt manifest at {}, starting fresh: {error}", path.display());
            Self::default()
        })
    }

    /// Save whole manifest to target path, bumping its update timestamp.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Serialize`] if serialization fails.
    /// - Return [`ManifestError::Write`] if the file cannot be written.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.last_updated = Utc::now();
        let content = serde_json::to_string_pretty(self)?;
        write(path, content).map_err(|source| ManifestError::Write {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Record a successful pull of `key`.
    pub fn record_pull(&mut self, key: impl Into<String>, url: impl Into<String>, item_count: usize) {
        self.repositories.insert(
            key.into(),
            RepoEntry {
                url: url.into(),
                last_pulled: Utc::now(),
                item_count,
            },
        );
    }
}

/// Bookkeeping for one pulled repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoEntry {
    /// Remote URL of the repository.
    pub url: String,

    /// Time of last successful pull.
    pub last_pulled: DateTime<Utc>,

    /// Items found in the cache after the last pull.
    pub item_count: usize,
}

/// Manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Manifest cannot be written.
    #[error("failed to write manifest at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;
