// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Store management and manipulation.
//!
//! Skillsync keeps everything it owns in one place called the __store__.
//! The store houses the manifest, the staging area, and a cache for every
//! repository that was ever pulled.
//!
//! # Store Layout
//!
//! The store can be placed anywhere on the user's file system. However, the
//! default location is `$XDG_DATA_HOME/skillsync`.
//!
//! ```text
//! <store>/
//! ├── manifest.json
//! ├── pending-moves.json
//! ├── local/                  staging area
//! │   ├── skillsync.json
//! │   ├── skills/
//! │   ├── agents/
//! │   └── output-styles/
//! └── repos/
//!     └── <owner>/<repo>/     repository cache
//! ```
//!
//! The staging area and each repository cache are plain roots, so the
//! scanner can be pointed at them like any other scope.

pub mod descriptor;
pub mod manifest;

use crate::{
    config::{ConfigError, Settings},
    files::{replace_path, remove_path, FileError},
    item::{Item, ItemKind},
    remote::RepoRef,
    scan::{find, find_kind, scan},
    scope::{Scope, ScopeRoots},
    store::{
        descriptor::{refresh, DescriptorError, DescriptorFields},
        manifest::{Manifest, ManifestError, RepoEntry, MANIFEST_FILE},
    },
};

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Name of the staging area directory inside the store.
pub const STAGING_DIR: &str = "local";

/// Name of the repository pool directory inside the store.
pub const REPOS_DIR: &str = "repos";

/// Handle to an opened store.
///
/// Constructed once per run and passed into every engine call.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    roots: ScopeRoots,
}

impl Store {
    /// Open store at `root`, creating its layout if needed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Layout`] if store directories cannot be created.
    /// - Return [`StoreError::Manifest`] if initial manifest cannot be written.
    #[instrument(skip(root, roots), level = "debug")]
    pub fn open(root: impl Into<PathBuf>, roots: ScopeRoots) -> Result<Self> {
        let store = Self {
            root: root.into(),
            roots,
        };

        let mut dirs = vec![store.repos_dir()];
        dirs.extend(ItemKind::ALL.map(|kind| store.staging_dir().join(kind.dir_name())));
        for dir in dirs {
            mkdirp::mkdirp(&dir).map_err(|source| StoreError::Layout { source, path: dir })?;
        }

        let manifest_path = store.manifest_path();
        if !manifest_path.exists() {
            info!("initialize new store at {}", store.root.display());
            Manifest::default().save(&manifest_path)?;
        }

        Ok(store)
    }

    /// Open store described by settings.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Config`] if store or scope roots are unknown.
    /// - Return [`StoreError`] if store cannot be opened.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(settings.store_dir()?, ScopeRoots::from_settings(settings)?)
    }

    /// Root of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the staging area.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Directory holding every repository cache.
    pub fn repos_dir(&self) -> PathBuf {
        self.root.join(REPOS_DIR)
    }

    /// Root of the cache of `repo`.
    pub fn repo_dir(&self, repo: &RepoRef) -> PathBuf {
        self.repos_dir().join(&repo.owner).join(&repo.repo)
    }

    /// Path to the manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Fixed scope roots.
    pub fn roots(&self) -> &ScopeRoots {
        &self.roots
    }

    /// Resolve scope to its root directory.
    pub fn resolve(&self, scope: &Scope) -> PathBuf {
        self.roots.resolve(scope)
    }

    /// Resolve cache source to its root directory.
    pub fn source_dir(&self, source: &CacheSource) -> PathBuf {
        match source {
            CacheSource::Staging => self.staging_dir(),
            CacheSource::Repository(repo) => self.repo_dir(repo),
        }
    }

    /// List items of `scope`.
    pub fn list(&self, scope: &Scope) -> Vec<Item> {
        scan(self.resolve(scope))
    }

    /// List items of the staging area.
    pub fn list_staged(&self) -> Vec<Item> {
        scan(self.staging_dir())
    }

    /// Copy item named `name` from `scope` into the staging area.
    ///
    /// Existing staged copy is replaced unconditionally, so staging the same
    /// item twice yields the same end state.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if `scope` has no such item.
    /// - Return [`StoreError::Files`] if the copy fails.
    /// - Return [`StoreError::Descriptor`] if staging descriptor cannot be refreshed.
    #[instrument(skip(self), level = "debug")]
    pub fn stage(&self, name: &str, scope: &Scope) -> Result<Item> {
        let source = self.resolve(scope);
        let item = find(&source, name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
            root: source.clone(),
        })?;

        let staged = self.stage_item(&item, &source)?;
        self.refresh_staging()?;

        Ok(staged)
    }

    /// Stage every item of `scope`, optionally only names matching `pattern`.
    ///
    /// Failures are recorded per item and never abort the batch, nor roll
    /// back items staged before them.
    #[instrument(skip(self, pattern), level = "debug")]
    pub fn stage_all(&self, scope: &Scope, pattern: Option<&glob::Pattern>) -> BatchReport {
        let source = self.resolve(scope);
        let mut report = BatchReport::default();

        for item in scan(&source) {
            if pattern.is_some_and(|pattern| !pattern.matches(&item.name)) {
                continue;
            }

            match self.stage_item(&item, &source) {
                Ok(staged) => report.succeeded.push(staged),
                Err(error) => report.fail(&item, error),
            }
        }

        if let Err(error) = self.refresh_staging() {
            warn!("staging descriptor not refreshed: {error}");
        }

        report
    }

    /// Remove staged copy of item named `name`.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if nothing by that name is staged.
    /// - Return [`StoreError::Files`] if removal fails.
    #[instrument(skip(self), level = "debug")]
    pub fn unstage(&self, name: &str) -> Result<Item> {
        let staging = self.staging_dir();
        let item = find(&staging, name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
            root: staging.clone(),
        })?;

        remove_path(item.location(&staging))?;
        info!("unstaged {} {:?}", item.kind, item.name);
        self.refresh_staging()?;

        Ok(item)
    }

    /// Copy item named `name` from a cache into `target`.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if the cache has no such item.
    /// - Return [`StoreError::Conflict`] if `target` already has the item
    ///   and `force` is not set.
    /// - Return [`StoreError::Files`] if the copy fails.
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self, name: &str, source: &CacheSource, target: &Scope, force: bool) -> Result<Item> {
        let from = self.source_dir(source);
        let item = find(&from, name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
            root: from.clone(),
        })?;

        self.apply_item(&item, &from, &self.resolve(target), force)
    }

    /// Copy every item of a cache into `target`.
    ///
    /// Failures, including conflicts, are recorded per item and never abort
    /// the batch.
    #[instrument(skip(self), level = "debug")]
    pub fn apply_all(&self, source: &CacheSource, target: &Scope, force: bool) -> BatchReport {
        let from = self.source_dir(source);
        let to = self.resolve(target);
        let mut report = BatchReport::default();

        for item in scan(&from) {
            match self.apply_item(&item, &from, &to, force) {
                Ok(applied) => report.succeeded.push(applied),
                Err(error) => report.fail(&item, error),
            }
        }

        report
    }

    /// List every pulled repository.
    pub fn repositories(&self) -> Vec<(String, RepoEntry)> {
        self.manifest().repositories.into_iter().collect()
    }

    /// Load current manifest.
    pub fn manifest(&self) -> Manifest {
        Manifest::load(self.manifest_path())
    }

    /// Apply `edit` to the manifest and save it in full.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Manifest`] if manifest cannot be saved.
    pub fn edit_manifest<E>(&self, edit: E) -> Result<Manifest>
    where
        E: FnOnce(&mut Manifest),
    {
        let path = self.manifest_path();
        let mut manifest = Manifest::load(&path);
        edit(&mut manifest);
        manifest.save(&path)?;

        Ok(manifest)
    }

    /// Make `repo` the default push target.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Manifest`] if manifest cannot be saved.
    pub fn link(&self, repo: &RepoRef) -> Result<()> {
        info!("link store to {}", repo.key());
        self.edit_manifest(|manifest| manifest.linked = Some(repo.key()))?;
        Ok(())
    }

    /// Forget the default push target.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Manifest`] if manifest cannot be saved.
    pub fn unlink(&self) -> Result<()> {
        self.edit_manifest(|manifest| manifest.linked = None)?;
        Ok(())
    }

    /// Default push target, if linked.
    pub fn linked(&self) -> Option<String> {
        self.manifest().linked
    }

    fn stage_item(&self, item: &Item, source: &Path) -> Result<Item> {
        let staging = self.staging_dir();
        replace_path(item.location(source), item.location(&staging))?;
        info!("staged {} {:?}", item.kind, item.name);

        Ok(find_kind(&staging, item.kind, &item.name).unwrap_or_else(|| item.clone()))
    }

    fn apply_item(&self, item: &Item, from: &Path, to: &Path, force: bool) -> Result<Item> {
        if !force && find_kind(to, item.kind, &item.name).is_some() {
            return Err(StoreError::Conflict {
                kind: item.kind,
                name: item.name.clone(),
                root: to.to_path_buf(),
                suggestion: suggest_name(to, item.kind, &item.name),
            });
        }

        replace_path(item.location(from), item.location(to))?;
        info!("applied {} {:?} to {}", item.kind, item.name, to.display());

        Ok(find_kind(to, item.kind, &item.name).unwrap_or_else(|| item.clone()))
    }

    fn refresh_staging(&self) -> Result<()> {
        refresh(self.staging_dir(), &DescriptorFields::default(), STAGING_DIR)?;
        Ok(())
    }
}

/// Cache that items can be applied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSource {
    /// The staging area.
    Staging,

    /// Cache of a pulled repository.
    Repository(RepoRef),
}

impl Display for CacheSource {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Staging => fmt.write_str("staging area"),
            Self::Repository(repo) => write!(fmt, "cache of {}", repo.key()),
        }
    }
}

/// Generate a name for an item of `kind` that does not collide in `root`.
///
/// Appends `-1`, `-2`, and so on to `name` until no item of the same kind
/// carries the candidate name.
pub fn suggest_name(root: impl AsRef<Path>, kind: ItemKind, name: &str) -> String {
    let taken: HashSet<String> = scan(root)
        .into_iter()
        .filter(|item| item.kind == kind)
        .map(|item| item.name)
        .collect();

    (1..)
        .map(|n| format!("{name}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{name}-copy"))
}

/// Outcome of a batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items processed successfully.
    pub succeeded: Vec<Item>,

    /// Items that failed, with the reason.
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    fn fail(&mut self, item: &Item, error: StoreError) {
        warn!("{} {:?} failed: {error}", item.kind, item.name);
        self.failed.push(BatchFailure {
            kind: item.kind,
            name: item.name.clone(),
            error,
        });
    }
}

/// Single failure inside a batch operation.
#[derive(Debug)]
pub struct BatchFailure {
    pub kind: ItemKind,
    pub name: String,
    pub error: StoreError,
}

/// All possible error types for store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Item does not exist in root.
    #[error("no item named {name:?} in {:?}", root.display())]
    NotFound { name: String, root: PathBuf },

    /// Item already exists at destination.
    #[error("{kind} {name:?} already exists in {:?}, use force to overwrite or try the name {suggestion:?}", root.display())]
    Conflict {
        kind: ItemKind,
        name: String,
        root: PathBuf,
        suggestion: String,
    },

    /// Store directory cannot be created.
    #[error("failed to create store directory {:?}", path.display())]
    Layout {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Item files cannot be copied or removed.
    #[error(transparent)]
    Files(#[from] FileError),

    /// Manifest cannot be saved.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Descriptor cannot be saved.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Settings cannot be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
