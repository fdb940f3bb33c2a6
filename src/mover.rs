// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moving items between the project and user scopes.
//!
//! __Promote__ moves an item from the project root to the user root,
//! __demote__ moves it back. Both directions share one algorithm:
//!
//! 1. Locate the item by name in the source root.
//! 2. Pick the destination name, i.e., the supplied rename if any, the
//!    original name otherwise.
//! 3. Check the destination for an item of that name and kind. Resolve a
//!    collision by overwriting when forced, or fail with a suggested unique
//!    name.
//! 4. Copy the item over, record the move in the intent log, delete the
//!    source, and clear the intent.
//!
//! # Intent Log
//!
//! A move is a copy followed by a delete, so a crash between the two leaves
//! the item in both scopes. The intent log at `<store>/pending-moves.json`
//! makes that state detectable: an entry is written once the copy is in
//! place and removed once the source is gone. [`reconcile`] finishes any
//! move left behind.

use crate::{
    files::{remove_path, replace_path, same_path, FileError},
    item::{Item, ItemKind},
    scan::{find, find_kind},
    store::{suggest_name, Store},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// File name of the intent log inside the store root.
pub const INTENT_LOG_FILE: &str = "pending-moves.json";

/// Direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Project root to user root.
    Promote,

    /// User root to project root.
    Demote,
}

impl Display for Direction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
        })
    }
}

/// Collision handling for a move.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MoveOptions {
    /// Overwrite a colliding destination item.
    pub force: bool,

    /// Name to use at the destination instead of the original name.
    pub rename: Option<String>,
}

/// Result of a completed move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Item as found at its destination.
    pub item: Item,

    /// Absolute path the item was moved from.
    pub from: PathBuf,

    /// Absolute path the item was moved to.
    pub to: PathBuf,

    pub original_name: String,
    pub new_name: String,
    pub renamed: bool,
}

/// Move item named `name` from the project root to the user root.
///
/// # Errors
///
/// - Return [`MoveError::SameRoot`] if both roots are one directory.
/// - Return [`MoveError::NotFound`] if the project root has no such item.
/// - Return [`MoveError::Conflict`] if the user root has a colliding item
///   and neither force nor rename resolve it.
/// - Return [`MoveError::Files`] if copying or deleting fails.
pub fn promote(store: &Store, name: &str, options: &MoveOptions) -> Result<MoveOutcome> {
    relocate(store, Direction::Promote, name, options)
}

/// Move item named `name` from the user root to the project root.
///
/// # Errors
///
/// - Return [`MoveError::SameRoot`] if both roots are one directory.
/// - Return [`MoveError::NotFound`] if the user root has no such item.
/// - Return [`MoveError::Conflict`] if the project root has a colliding
///   item and neither force nor rename resolve it.
/// - Return [`MoveError::Files`] if copying or deleting fails.
pub fn demote(store: &Store, name: &str, options: &MoveOptions) -> Result<MoveOutcome> {
    relocate(store, Direction::Demote, name, options)
}

#[instrument(skip(store), level = "debug")]
fn relocate(store: &Store, direction: Direction, name: &str, options: &MoveOptions) -> Result<MoveOutcome> {
    let (source_root, dest_root) = match direction {
        Direction::Promote => (store.roots().project(), store.roots().user()),
        Direction::Demote => (store.roots().user(), store.roots().project()),
    };

    // INVARIANT: Source and destination must be distinct directories.
    if same_path(source_root, dest_root) {
        return Err(MoveError::SameRoot {
            root: source_root.to_path_buf(),
        });
    }

    let item = find(source_root, name).ok_or_else(|| MoveError::NotFound {
        name: name.to_string(),
        root: source_root.to_path_buf(),
    })?;
    let new_name = resolve_target_name(&item, dest_root, options)?;

    let from = item.location(source_root);
    let to = dest_root.join(item.kind.relative_path(&new_name));

    // INVARIANT: Destination copy must exist before the intent is recorded.
    replace_path(&from, &to)?;

    let intent = MoveIntent {
        direction: direction.to_string(),
        kind: item.kind,
        name: new_name.clone(),
        source: from.clone(),
        destination: to.clone(),
        recorded_at: Utc::now(),
    };
    let log = IntentLog::new(store.root());
    log.record(&intent)?;

    remove_path(&from)?;
    log.clear(&intent)?;

    info!(
        "{direction}d {} {:?} to {}",
        item.kind,
        new_name,
        dest_root.display()
    );

    let moved = find_kind(dest_root, item.kind, &new_name).unwrap_or_else(|| Item {
        name: new_name.clone(),
        path: item.kind.relative_path(&new_name),
        ..item.clone()
    });

    Ok(MoveOutcome {
        item: moved,
        from,
        to,
        renamed: new_name != item.name,
        original_name: item.name,
        new_name,
    })
}

fn resolve_target_name(item: &Item, dest_root: &Path, options: &MoveOptions) -> Result<String> {
    if let Some(rename) = &options.rename {
        if !is_valid_item_name(rename) {
            return Err(MoveError::InvalidName(rename.clone()));
        }

        // INVARIANT: Rename target is checked for collisions like the original name.
        if !options.force && find_kind(dest_root, item.kind, rename).is_some() {
            return Err(conflict(item.kind, rename, dest_root));
        }

        return Ok(rename.clone());
    }

    if find_kind(dest_root, item.kind, &item.name).is_none() {
        return Ok(item.name.clone());
    }

    if options.force {
        debug!("overwrite {} {:?} in {}", item.kind, item.name, dest_root.display());
        return Ok(item.name.clone());
    }

    Err(conflict(item.kind, &item.name, dest_root))
}

fn conflict(kind: ItemKind, name: &str, dest_root: &Path) -> MoveError {
    MoveError::Conflict {
        kind,
        name: name.to_string(),
        root: dest_root.to_path_buf(),
        suggestion: suggest_name(dest_root, kind, name),
    }
}

fn is_valid_item_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Recorded move between copy and delete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MoveIntent {
    pub direction: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub recorded_at: DateTime<Utc>,
}

/// Persisted list of unfinished moves.
#[derive(Debug, Clone)]
pub struct IntentLog {
    path: PathBuf,
}

impl IntentLog {
    /// Construct new intent log handle for store root `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(INTENT_LOG_FILE),
        }
    }

    /// Read every recorded intent.
    ///
    /// A missing or corrupt log reads as empty.
    pub fn entries(&self) -> Vec<MoveIntent> {
        match read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("ignoring corrupt intent log {}: {error}", self.path.display());
                Vec::new()
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => Vec::new(),
            Err(error) => {
                warn!("cannot read intent log {}: {error}", self.path.display());
                Vec::new()
            }
        }
    }

    /// Append `intent` to the log.
    ///
    /// # Errors
    ///
    /// - Return [`MoveError::IntentLog`] if log cannot be written.
    pub fn record(&self, intent: &MoveIntent) -> Result<()> {
        let mut entries = self.entries();
        entries.push(intent.clone());
        self.write(&entries)
    }

    /// Remove `intent` from the log.
    ///
    /// # Errors
    ///
    /// - Return [`MoveError::IntentLog`] if log cannot be written.
    pub fn clear(&self, intent: &MoveIntent) -> Result<()> {
        let mut entries = self.entries();
        entries.retain(|entry| entry != intent);
        self.write(&entries)
    }

    fn write(&self, entries: &[MoveIntent]) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        write(&self.path, content).map_err(|source| MoveError::IntentLog {
            source,
            path: self.path.clone(),
        })
    }
}

/// List moves that copied their item but never deleted the source.
pub fn pending_moves(store: &Store) -> Vec<MoveIntent> {
    IntentLog::new(store.root()).entries()
}

/// Finish every pending move.
///
/// A leftover source is deleted when its destination copy exists. When the
/// destination is missing the source is kept, since it is the only copy.
/// Either way the intent is cleared.
///
/// # Errors
///
/// - Return [`MoveError::Files`] if a leftover source cannot be deleted.
/// - Return [`MoveError::IntentLog`] if log cannot be written.
pub fn reconcile(store: &Store) -> Result<Vec<MoveIntent>> {
    let log = IntentLog::new(store.root());
    let pending = log.entries();

    for intent in &pending {
        if intent.destination.exists() {
            info!(
                "finish {} of {} {:?}, removing {}",
                intent.direction,
                intent.kind,
                intent.name,
                intent.source.display()
            );
            remove_path(&intent.source)?;
        } else {
            warn!(
                "destination {} of {} {:?} is gone, keeping source",
                intent.destination.display(),
                intent.kind,
                intent.name
            );
        }
        log.clear(intent)?;
    }

    Ok(pending)
}

/// Move error types.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// Item does not exist in source root.
    #[error("no item named {name:?} in {:?}", root.display())]
    NotFound { name: String, root: PathBuf },

    /// Destination already has an item with the same name and kind.
    #[error("{kind} {name:?} already exists in {:?}, use force to overwrite or rename to {suggestion:?}", root.display())]
    Conflict {
        kind: ItemKind,
        name: String,
        root: PathBuf,
        suggestion: String,
    },

    /// User and project scopes resolve to the same directory.
    #[error("user and project scope are both {:?}, nothing to move", root.display())]
    SameRoot { root: PathBuf },

    /// Rename target is not usable as an item name.
    #[error("invalid item name {0:?}")]
    InvalidName(String),

    /// Item files cannot be copied or removed.
    #[error(transparent)]
    Files(#[from] FileError),

    /// Intent log cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Intent log cannot be written.
    #[error("failed to write intent log at {:?}", path.display())]
    IntentLog {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MoveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Scope, ScopeRoots};
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write as write_file};
    use tempfile::TempDir;

    fn fixture() -> anyhow::Result<(TempDir, Store)> {
        let dir = tempfile::tempdir()?;
        let roots = ScopeRoots::new(dir.path().join("user"), dir.path().join("project"));
        let store = Store::open(dir.path().join("store"), roots)?;
        Ok((dir, store))
    }

    fn put(store: &Store, scope: &Scope, relative: &str, content: &str) -> anyhow::Result<()> {
        let path = store.resolve(scope).join(relative);
        create_dir_all(path.parent().unwrap())?;
        write_file(path, content)?;
        Ok(())
    }

    #[test]
    fn force_overwrites_destination() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::Project, "agents/notifier.md", "project")?;
        put(&store, &Scope::User, "agents/notifier.md", "user")?;

        let options = MoveOptions {
            force: true,
            ..Default::default()
        };
        let outcome = promote(&store, "notifier", &options)?;

        assert!(!outcome.renamed);
        assert_eq!(read_to_string(&outcome.to)?, "project");
        assert!(!outcome.from.exists());

        Ok(())
    }

    #[test]
    fn rename_target_is_rechecked() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::Project, "agents/x.md", "")?;
        put(&store, &Scope::User, "agents/x.md", "")?;
        put(&store, &Scope::User, "agents/y.md", "")?;

        let options = MoveOptions {
            rename: Some("y".into()),
            ..Default::default()
        };
        match promote(&store, "x", &options) {
            Err(MoveError::Conflict { name, suggestion, .. }) => {
                assert_eq!(name, "y");
                assert_eq!(suggestion, "y-1");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn rename_must_be_a_plain_name() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::Project, "agents/x.md", "")?;
        put(&store, &Scope::User, "agents/x.md", "")?;

        let options = MoveOptions {
            rename: Some("../escape".into()),
            ..Default::default()
        };
        assert!(matches!(
            promote(&store, "x", &options),
            Err(MoveError::InvalidName(_))
        ));

        Ok(())
    }

    #[test]
    fn rename_applies_without_collision() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::Project, "agents/notifier.md", "ping")?;

        let options = MoveOptions {
            rename: Some("pager".into()),
            ..Default::default()
        };
        let outcome = promote(&store, "notifier", &options)?;

        assert!(outcome.renamed);
        assert_eq!(outcome.new_name, "pager");
        assert_eq!(read_to_string(store.resolve(&Scope::User).join("agents/pager.md"))?, "ping");
        assert!(!store.resolve(&Scope::User).join("agents/notifier.md").exists());

        Ok(())
    }

    #[test]
    fn forced_move_within_one_directory_keeps_item() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let roots = ScopeRoots::new(
            dir.path().join("home/.claude"),
            dir.path().join("home/./.claude"),
        );
        let store = Store::open(dir.path().join("store"), roots)?;
        put(&store, &Scope::User, "agents/notifier.md", "precious")?;

        let options = MoveOptions {
            force: true,
            ..Default::default()
        };
        assert!(matches!(
            promote(&store, "notifier", &options),
            Err(MoveError::SameRoot { .. })
        ));
        assert_eq!(
            read_to_string(store.resolve(&Scope::Project).join("agents/notifier.md"))?,
            "precious"
        );
        assert!(pending_moves(&store).is_empty());

        Ok(())
    }

    #[test]
    fn missing_item_is_not_found() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        assert!(matches!(
            demote(&store, "ghost", &MoveOptions::default()),
            Err(MoveError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn completed_move_leaves_no_intent() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::User, "output-styles/terse.md", "")?;

        demote(&store, "terse", &MoveOptions::default())?;
        assert!(pending_moves(&store).is_empty());

        Ok(())
    }

    #[test]
    fn reconcile_finishes_interrupted_move() -> anyhow::Result<()> {
        let (_dir, store) = fixture()?;
        put(&store, &Scope::Project, "skills/reviewer/SKILL.md", "a")?;
        put(&store, &Scope::User, "skills/reviewer/SKILL.md", "a")?;
        put(&store, &Scope::Project, "agents/orphan.md", "b")?;

        let log = IntentLog::new(store.root());
        let finished = MoveIntent {
            direction: Direction::Promote.to_string(),
            kind: ItemKind::Skill,
            name: "reviewer".into(),
            source: store.resolve(&Scope::Project).join("skills/reviewer"),
            destination: store.resolve(&Scope::User).join("skills/reviewer"),
            recorded_at: Utc::now(),
        };
        let lost = MoveIntent {
            direction: Direction::Promote.to_string(),
            kind: ItemKind::Agent,
            name: "orphan".into(),
            source: store.resolve(&Scope::Project).join("agents/orphan.md"),
            destination: store.resolve(&Scope::User).join("agents/orphan.md"),
            recorded_at: Utc::now(),
        };
        log.record(&finished)?;
        log.record(&lost)?;
        assert_eq!(pending_moves(&store).len(), 2);

        let reconciled = reconcile(&store)?;
        assert_eq!(reconciled.len(), 2);
        assert!(pending_moves(&store).is_empty());
        assert!(!finished.source.exists());
        assert!(finished.destination.exists());
        assert!(lost.source.exists());

        Ok(())
    }
}
