// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Item discovery.
//!
//! Walk the three type directories of a root and produce the items found
//! there. Nothing is cached between calls, the filesystem is always the
//! source of truth.
//!
//! # Graceful Degradation
//!
//! Scanning never fails as a whole. Errors reading a type directory are
//! collapsed into zero items for that directory. A missing directory is the
//! common case and is collapsed silently, everything else is logged and kept
//! in a [`ScanReport`] for callers that want to tell "truly empty" apart
//! from "could not read".

use crate::item::{parse_metadata, Item, ItemKind, Metadata, MARKDOWN_EXT, SKILL_DESCRIPTOR};

use chrono::{DateTime, Utc};
use std::{
    collections::HashSet,
    fs::{metadata, read_dir, read_to_string},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Scan every type directory of `root`.
///
/// Items come out grouped by kind (skills, agents, output styles) and sorted
/// by name within each kind.
pub fn scan(root: impl AsRef<Path>) -> Vec<Item> {
    scan_report(root).items
}

/// Scan every type directory of `root`, keeping collapsed errors.
pub fn scan_report(root: impl AsRef<Path>) -> ScanReport {
    let root = root.as_ref();
    let mut report = ScanReport::default();
    let mut seen = HashSet::new();

    for kind in ItemKind::ALL {
        match try_scan_kind(root, kind) {
            Ok(items) => {
                // INVARIANT: At most one item per (kind, name) pair.
                for item in items {
                    if seen.insert((item.kind, item.name.clone())) {
                        report.items.push(item);
                    }
                }
            }
            Err(ScanError::MissingDir { .. }) => {}
            Err(error) => {
                warn!("treating {kind} directory as empty: {error}");
                report.errors.push(error);
            }
        }
    }

    report
}

/// Find first item named `name` in `root`, looking up kinds in order.
pub fn find(root: impl AsRef<Path>, name: &str) -> Option<Item> {
    scan(root).into_iter().find(|item| item.name == name)
}

/// Find item named `name` of a specific kind in `root`.
pub fn find_kind(root: impl AsRef<Path>, kind: ItemKind, name: &str) -> Option<Item> {
    try_scan_kind(root, kind)
        .ok()?
        .into_iter()
        .find(|item| item.name == name)
}

/// Scan a single type directory of `root`.
///
/// Entries that are not valid items of `kind` are skipped, e.g., a skill
/// directory without a descriptor or a non-markdown file among agents.
///
/// # Errors
///
/// - Return [`ScanError::MissingDir`] if type directory does not exist.
/// - Return [`ScanError::ReadDir`] if type directory cannot be read.
pub fn try_scan_kind(root: impl AsRef<Path>, kind: ItemKind) -> Result<Vec<Item>> {
    let dir = root.as_ref().join(kind.dir_name());
    let entries = read_dir(&dir).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ScanError::MissingDir { dir: dir.clone() },
        _ => ScanError::ReadDir {
            source,
            dir: dir.clone(),
        },
    })?;

    let mut items = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        let (name, descriptor) = match kind {
            ItemKind::Skill => {
                let descriptor = path.join(SKILL_DESCRIPTOR);
                if !path.is_dir() || !descriptor.is_file() {
                    debug!("skip {}: no {SKILL_DESCRIPTOR}", path.display());
                    continue;
                }
                (file_name.to_string(), descriptor)
            }
            ItemKind::Agent | ItemKind::OutputStyle => {
                let is_markdown = path.extension().and_then(|ext| ext.to_str()) == Some(MARKDOWN_EXT);
                if !path.is_file() || !is_markdown {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                (stem.to_string(), path.clone())
            }
        };

        items.push(Item {
            kind,
            path: kind.relative_path(&name),
            name,
            metadata: read_metadata(&descriptor),
            updated_at: modified_at(&descriptor),
        });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(items)
}

fn read_metadata(path: &Path) -> Metadata {
    match read_to_string(path) {
        Ok(content) => parse_metadata(&content),
        Err(error) => {
            debug!("cannot read {}: {error}", path.display());
            Metadata::new()
        }
    }
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_default()
}

/// Result of scanning a root with collapsed errors kept around.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Items found.
    pub items: Vec<Item>,

    /// Errors that were collapsed into zero items, excluding missing
    /// directories.
    pub errors: Vec<ScanError>,
}

/// Scan error types.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Type directory does not exist.
    #[error("type directory {:?} does not exist", dir.display())]
    MissingDir { dir: PathBuf },

    /// Type directory cannot be read.
    #[error("failed to read type directory {:?}", dir.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        dir: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
