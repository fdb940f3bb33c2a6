// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote repository access.
//!
//! Remote repositories are addressed through a [`RepoRef`], i.e., an owner,
//! a repository name, and a branch. Access to the hosting API goes through
//! the [`RemoteHost`] trait, which only needs two things: a recursive file
//! tree listing of a branch, and the raw content of a single file.
//!
//! # Reference Syntax
//!
//! - `owner/repo` shorthand, resolves to the default branch.
//! - `https://github.com/owner/repo(.git)`, resolves to the default branch.
//! - `https://github.com/owner/repo/tree/<branch>`, names its own branch.
//! - `git@github.com:owner/repo.git`, resolves to the default branch.

pub mod git;
pub mod github;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

/// Reference to a branch of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    /// Construct new repository reference.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Parse full URL or `owner/repo` shorthand.
    ///
    /// Uses `default_branch` unless a URL names its own branch.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::InvalidReference`] if input cannot be parsed.
    pub fn parse(input: impl AsRef<str>, default_branch: &str) -> Result<Self> {
        let raw = input.as_ref().trim();
        let invalid = || RemoteError::InvalidReference(raw.to_string());

        let segments: Vec<String> = if let Some(rest) = raw.strip_prefix("git@") {
            let (_, path) = rest.split_once(':').ok_or_else(invalid)?;
            path.split('/').map(str::to_owned).collect()
        } else if raw.contains("://") {
            url_segments(raw).ok_or_else(invalid)?
        } else if raw.starts_with("github.com/") || raw.starts_with("www.github.com/") {
            url_segments(&format!("https://{raw}")).ok_or_else(invalid)?
        } else {
            raw.split('/').map(str::to_owned).collect()
        };

        let is_url = raw.contains("://") || raw.contains("github.com");
        let (owner, repo, branch) = match segments.as_slice() {
            [owner, repo] => (owner, repo, None),
            [owner, repo, marker, branch @ ..]
                if is_url && matches!(marker.as_str(), "tree" | "blob") && !branch.is_empty() =>
            {
                (owner, repo, Some(branch.join("/")))
            }
            _ => return Err(invalid()),
        };

        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if !is_valid_name(owner) || !is_valid_name(repo) {
            return Err(invalid());
        }

        Ok(Self::new(
            owner.as_str(),
            repo,
            branch.unwrap_or_else(|| default_branch.to_string()),
        ))
    }

    /// Manifest and cache key, i.e., `owner/repo`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Clone URL relative to a web base URL.
    pub fn clone_url(&self, web_url: &str) -> String {
        format!("{}/{}/{}.git", web_url.trim_end_matches('/'), self.owner, self.repo)
    }
}

impl Display for RepoRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

fn url_segments(raw: &str) -> Option<Vec<String>> {
    let url = Url::parse(raw).ok()?;
    url.host_str()?;
    let segments = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();
    Some(segments)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    /// Path relative to repository root, `/` separated.
    pub path: String,

    /// Either "blob" or "tree", submodules show up as "commit".
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub sha: String,
}

impl TreeEntry {
    /// Construct new blob entry.
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: "blob".into(),
            sha: String::new(),
        }
    }

    /// Construct new tree entry.
    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: "tree".into(),
            sha: String::new(),
        }
    }

    /// Whether entry is a file.
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// Layer of indirection for the remote hosting API.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// List every entry of the referenced branch recursively.
    async fn tree(&self, repo: &RepoRef) -> Result<Vec<TreeEntry>>;

    /// Fetch raw content of file at `path` on the referenced branch.
    async fn raw(&self, repo: &RepoRef, path: &str) -> Result<Vec<u8>>;
}

/// Remote access error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Reference string cannot be parsed.
    #[error("invalid repository reference {0:?}, expected owner/repo or a repository URL")]
    InvalidReference(String),

    /// Repository, branch, or file does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Repository exists but has no commits.
    #[error("repository {0} is empty")]
    EmptyRepository(String),

    /// Request rate limit is exhausted.
    #[error("rate limit exceeded{}; set GITHUB_TOKEN to raise the limit", reset.as_ref().map(|at| format!(" until {at}")).unwrap_or_default())]
    RateLimited { reset: Option<String> },

    /// Hosting API answered with an unexpected status.
    #[error("hosting API returned {status} for {context}: {message}")]
    Api {
        status: u16,
        context: String,
        message: String,
    },

    /// Transport failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("acme/skills", "acme", "skills", "main"; "shorthand")]
    #[test_case("  acme/skills  ", "acme", "skills", "main"; "shorthand with whitespace")]
    #[test_case("https://github.com/acme/skills", "acme", "skills", "main"; "https url")]
    #[test_case("https://github.com/acme/skills.git", "acme", "skills", "main"; "clone url")]
    #[test_case("https://github.com/acme/skills/tree/dev", "acme", "skills", "dev"; "url with branch")]
    #[test_case("https://github.com/acme/skills/tree/feature/x", "acme", "skills", "feature/x"; "url with nested branch")]
    #[test_case("github.com/acme/skills", "acme", "skills", "main"; "url without scheme")]
    #[test_case("git@github.com:acme/skills.git", "acme", "skills", "main"; "ssh url")]
    #[test]
    fn parse_valid_reference(input: &str, owner: &str, repo: &str, branch: &str) -> anyhow::Result<()> {
        let result = RepoRef::parse(input, "main")?;
        pretty_assertions::assert_eq!(result, RepoRef::new(owner, repo, branch));
        Ok(())
    }

    #[test_case(""; "empty")]
    #[test_case("acme"; "owner only")]
    #[test_case("acme/skills/extra"; "too many segments")]
    #[test_case("acme/"; "missing repo")]
    #[test_case("ac me/skills"; "whitespace in owner")]
    #[test_case("../skills"; "parent segment")]
    #[test_case("https://github.com/acme"; "url without repo")]
    #[test_case("git@github.com"; "ssh without path")]
    #[test]
    fn parse_invalid_reference(input: &str) {
        assert!(matches!(
            RepoRef::parse(input, "main"),
            Err(RemoteError::InvalidReference(_))
        ));
    }

    #[test]
    fn reference_key_and_urls() {
        let repo = RepoRef::new("acme", "skills", "main");
        assert_eq!(repo.key(), "acme/skills");
        assert_eq!(repo.clone_url("https://github.com/"), "https://github.com/acme/skills.git");
        assert_eq!(repo.to_string(), "acme/skills@main");
    }
}
