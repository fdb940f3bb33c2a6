// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository synchronization.
//!
//! The [`RepoClient`] moves items between the local store and remote
//! repositories:
//!
//! - __pull__ downloads every item file of a remote branch into the
//!   repository cache at `<store>/repos/<owner>/<repo>`.
//! - __browse__ lists the items of a remote branch without writing anything.
//! - __push__ materializes a scope into a temporary directory, adds a fresh
//!   descriptor and README, and pushes it with the Git binary.
//!
//! Every request is issued sequentially in listing order. A failed file
//! download during pull is recorded and does not abort the remaining files.

use crate::{
    config::Settings,
    files::{copy_path, remove_path, FileError},
    item::{ItemKind, MARKDOWN_EXT, SKILL_DESCRIPTOR},
    remote::{
        git::{GitCli, GitError},
        github::GithubHost,
        RemoteError, RemoteHost, RepoRef, TreeEntry,
    },
    scan::scan,
    scope::Scope,
    store::{
        descriptor::{DescriptorError, DescriptorFields, DescriptorItem, RepoDescriptor, DESCRIPTOR_FILE},
        Store, StoreError,
    },
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Commit message used when the caller supplies none.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update settings via skillsync";

/// Client for pulling, browsing, and pushing remote repositories.
#[derive(Debug, Clone)]
pub struct RepoClient<H> {
    host: H,
    git: GitCli,
    web_url: String,
    default_branch: String,
}

impl RepoClient<GithubHost> {
    /// Construct new client against GitHub from settings.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Remote`] if HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let host = GithubHost::from_settings(settings)?;
        Ok(Self::new(
            host,
            settings.github.web_url.as_str(),
            settings.github.branch.as_str(),
        ))
    }
}

impl<H: RemoteHost> RepoClient<H> {
    /// Construct new client over `host`.
    pub fn new(host: H, web_url: impl Into<String>, default_branch: impl Into<String>) -> Self {
        Self {
            host,
            git: GitCli::default(),
            web_url: web_url.into(),
            default_branch: default_branch.into(),
        }
    }

    /// Use `git` to drive pushes.
    pub fn with_git(mut self, git: GitCli) -> Self {
        self.git = git;
        self
    }

    /// Parse repository reference with the configured default branch.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Remote`] if reference cannot be parsed.
    pub fn parse(&self, input: impl AsRef<str>) -> Result<RepoRef> {
        Ok(RepoRef::parse(input, &self.default_branch)?)
    }

    /// Download every item file of `repo` into its repository cache.
    ///
    /// Files that already exist locally are skipped unless forced. The
    /// remote descriptor follows the same rule and is never counted.
    /// Progress is reported through `bar`.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Remote`] if the tree listing fails.
    /// - Return [`SyncError::NoMatchingItems`] if no file belongs to an item.
    /// - Return [`SyncError::Store`] if the manifest cannot be updated.
    #[instrument(skip(self, store, bar), level = "debug")]
    pub async fn pull(
        &self,
        store: &Store,
        repo: &RepoRef,
        options: &PullOptions,
        bar: &ProgressBar,
    ) -> Result<PullReport> {
        let tree = self.host.tree(repo).await?;
        let files: Vec<&TreeEntry> = tree.iter().filter(|entry| is_item_file(entry)).collect();
        if files.is_empty() {
            return Err(SyncError::NoMatchingItems(repo.key()));
        }

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_length(files.len() as u64);

        let cache = store.repo_dir(repo);
        let mut report = PullReport::default();
        for entry in files {
            bar.set_message(entry.path.clone());
            let target = cache.join(&entry.path);
            let status = if target.exists() && !options.force {
                debug!("skip existing {}", entry.path);
                FileStatus::Skipped
            } else {
                match self.download(repo, &entry.path, &target).await {
                    Ok(()) => FileStatus::Downloaded,
                    Err(error) => {
                        warn!("failed to download {}: {error}", entry.path);
                        FileStatus::Failed(error.to_string())
                    }
                }
            };
            report.record(entry.path.clone(), status);
            bar.inc(1);
        }
        bar.finish_and_clear();

        let descriptor = cache.join(DESCRIPTOR_FILE);
        if descriptor.exists() && !options.force {
            debug!("skip existing {DESCRIPTOR_FILE}");
        } else if tree.iter().any(|entry| entry.is_blob() && entry.path == DESCRIPTOR_FILE) {
            if let Err(error) = self.download(repo, DESCRIPTOR_FILE, &descriptor).await {
                warn!("failed to refresh descriptor of {repo}: {error}");
            }
        }

        let item_count = scan(&cache).len();
        let url = repo.clone_url(&self.web_url);
        store.edit_manifest(|manifest| manifest.record_pull(repo.key(), url, item_count))?;
        info!(
            "pulled {repo}: {} downloaded, {} skipped, {} failed",
            report.downloaded, report.skipped, report.failed
        );

        Ok(report)
    }

    /// List items of `repo` without writing anything locally.
    ///
    /// A remote descriptor is preferred over inferring items from the tree
    /// listing, so at most one file is fetched.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Remote`] if the tree listing fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn browse(&self, repo: &RepoRef) -> Result<Vec<DescriptorItem>> {
        let tree = self.host.tree(repo).await?;

        if tree.iter().any(|entry| entry.is_blob() && entry.path == DESCRIPTOR_FILE) {
            match self.host.raw(repo, DESCRIPTOR_FILE).await {
                Ok(data) => match RepoDescriptor::from_slice(&data) {
                    Ok(descriptor) => return Ok(descriptor.items),
                    Err(error) => warn!("ignoring malformed descriptor of {repo}: {error}"),
                },
                Err(error) => warn!("cannot fetch descriptor of {repo}: {error}"),
            }
        }

        Ok(tree.iter().filter_map(infer_item).collect())
    }

    /// Push every item of `source` to a remote repository.
    ///
    /// Target is the supplied repository, else the linked one. Without
    /// either, the prepared directory is returned for a manual push.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::NoMatchingItems`] if `source` holds no items.
    /// - Return [`SyncError::Git`] if Git is missing or fails.
    /// - Return [`SyncError::Files`] if items cannot be copied.
    /// - Return [`SyncError::Descriptor`] if descriptor cannot be written.
    #[instrument(skip(self, store), level = "debug")]
    pub fn push(&self, store: &Store, source: &PushSource, options: &PushOptions) -> Result<PushOutcome> {
        let root = source.root(store);
        let items = scan(&root);
        if items.is_empty() {
            return Err(SyncError::NoMatchingItems(root.display().to_string()));
        }

        let target = options.repo.clone().or_else(|| {
            store
                .linked()
                .and_then(|key| RepoRef::parse(key, &self.default_branch).ok())
        });

        let work = tempfile::Builder::new()
            .prefix("skillsync-push-")
            .tempdir()
            .map_err(SyncError::TempDir)?
            .keep();
        for item in &items {
            copy_path(item.location(&root), item.location(&work))?;
        }

        let previous = RepoDescriptor::load(&root);
        let fallback = target
            .as_ref()
            .map(|repo| repo.repo.clone())
            .unwrap_or_else(|| "skillsync".into());
        let descriptor = RepoDescriptor::generate(&items, previous.as_ref(), &options.fields, &fallback);
        descriptor.save(&work)?;
        descriptor.save_readme(&work)?;

        let Some(repo) = target else {
            info!("no repository linked, prepared {}", work.display());
            return Ok(PushOutcome::Prepared {
                instructions: manual_instructions(&work, &options.message),
                path: work,
                items: descriptor.items,
            });
        };

        let url = repo.clone_url(&self.web_url);
        self.publish(&work, &url, &repo.branch, options)?;
        remove_path(&work)?;
        info!("pushed {} items to {url}", descriptor.items.len());

        Ok(PushOutcome::Pushed {
            repository: repo,
            url,
            items: descriptor.items,
        })
    }

    async fn download(&self, repo: &RepoRef, path: &str, target: &Path) -> Result<()> {
        let data = self.host.raw(repo, path).await?;
        if let Some(parent) = target.parent() {
            create_dir_all(parent).map_err(|source| SyncError::Write {
                source,
                path: parent.to_path_buf(),
            })?;
        }
        write(target, data).map_err(|source| SyncError::Write {
            source,
            path: target.to_path_buf(),
        })
    }

    fn publish(&self, work: &Path, url: &str, branch: &str, options: &PushOptions) -> Result<()> {
        self.git.ensure_available()?;
        self.git.run(work, ["init"])?;
        self.git.run(work, ["add", "-A"])?;
        self.git.run(work, ["commit", "-m", options.message.as_str()])?;
        self.git.run(work, ["remote", "add", "origin", url])?;

        let mut push = vec!["push", "-u", "origin", branch];
        if options.force {
            push.push("--force");
        }

        if let Err(error) = self.git.run(work, &push) {
            debug!("first push failed, renaming branch to {branch}: {error}");
            self.git.run(work, ["branch", "-M", branch])?;
            self.git.run(work, &push)?;
        }

        Ok(())
    }
}

fn is_item_file(entry: &TreeEntry) -> bool {
    if !entry.is_blob() || entry.path.starts_with('/') {
        return false;
    }

    let segments: Vec<&str> = entry.path.split('/').collect();
    if segments.iter().any(|segment| matches!(*segment, "" | "." | "..")) {
        warn!("ignoring unsafe path {:?}", entry.path);
        return false;
    }

    segments.len() >= 2 && ItemKind::from_dir_name(segments[0]).is_some()
}

fn infer_item(entry: &TreeEntry) -> Option<DescriptorItem> {
    if !entry.is_blob() {
        return None;
    }

    let segments: Vec<&str> = entry.path.split('/').collect();
    let (kind, name, path) = match segments.as_slice() {
        [dir, name, SKILL_DESCRIPTOR] if ItemKind::from_dir_name(dir) == Some(ItemKind::Skill) => {
            (ItemKind::Skill, name.to_string(), format!("{dir}/{name}"))
        }
        [dir, file] => {
            let kind = ItemKind::from_dir_name(dir).filter(|kind| !kind.is_dir())?;
            let name = Path::new(file).file_stem()?.to_str()?;
            let is_markdown = Path::new(file).extension().is_some_and(|ext| ext == MARKDOWN_EXT);
            if !is_markdown || name.is_empty() {
                return None;
            }
            (kind, name.to_string(), entry.path.clone())
        }
        _ => return None,
    };

    Some(DescriptorItem {
        kind,
        name,
        path,
        description: String::new(),
    })
}

fn manual_instructions(work: &Path, message: &str) -> String {
    format!(
        "cd {}\ngit init\ngit add -A\ngit commit -m {message:?}\ngit remote add origin <repository-url>\ngit push -u origin main",
        work.display()
    )
}

/// Root a push reads items from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSource {
    /// Staging area of the store.
    Staging,

    /// User, project, or custom scope.
    Scope(Scope),
}

impl PushSource {
    /// Absolute root directory of this source.
    pub fn root(&self, store: &Store) -> PathBuf {
        match self {
            Self::Staging => store.staging_dir(),
            Self::Scope(scope) => store.resolve(scope),
        }
    }
}

/// Pull behavior.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullOptions {
    /// Overwrite files that already exist locally.
    pub force: bool,
}

/// Push behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    pub repo: Option<RepoRef>,
    pub message: String,
    pub force: bool,
    pub fields: DescriptorFields,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            repo: None,
            message: DEFAULT_COMMIT_MESSAGE.into(),
            force: false,
            fields: DescriptorFields::default(),
        }
    }
}

/// Outcome of a single file during pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Downloaded,
    Skipped,
    Failed(String),
}

/// Per-file record of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledFile {
    pub path: String,
    pub status: FileStatus,
}

/// Summary of a pull.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files: Vec<PulledFile>,
}

impl PullReport {
    fn record(&mut self, path: String, status: FileStatus) {
        match status {
            FileStatus::Downloaded => self.downloaded += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Failed(_) => self.failed += 1,
        }
        self.files.push(PulledFile { path, status });
    }
}

/// Result of a push.
#[derive(Debug, Clone)]
pub enum PushOutcome {
    /// Items were committed and pushed.
    Pushed {
        repository: RepoRef,
        url: String,
        items: Vec<DescriptorItem>,
    },

    /// No target repository, items were left for a manual push.
    Prepared {
        path: PathBuf,
        instructions: String,
        items: Vec<DescriptorItem>,
    },
}

/// Synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Remote hosting API failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Repository or scope holds nothing that looks like an item.
    #[error("no items found in {0}")]
    NoMatchingItems(String),

    /// Git binary is missing or failed.
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Files(#[from] FileError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Downloaded file cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Temporary push directory cannot be created.
    #[error("failed to create temporary push directory")]
    TempDir(#[source] std::io::Error),

    #[error(transparent)]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
