// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scope resolution.
//!
//! A __scope__ is a root directory that items can live in. Scopes are never
//! persisted, they are resolved to a concrete path at the call boundary.

use crate::config::{ConfigError, Settings};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Root directory reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// User-level root, e.g., `~/.claude`.
    User,

    /// Project-level root, e.g., `./.claude`.
    Project,

    /// Arbitrary root supplied by the caller.
    Custom(PathBuf),
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    /// Parse `user`, `project`, or treat anything else as a custom path.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(match data {
            "user" => Self::User,
            "project" => Self::Project,
            path => Self::Custom(PathBuf::from(path)),
        })
    }
}

impl Display for Scope {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::User => fmt.write_str("user"),
            Self::Project => fmt.write_str("project"),
            Self::Custom(path) => write!(fmt, "{}", path.display()),
        }
    }
}

/// Concrete roots of the fixed scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRoots {
    pub user: PathBuf,
    pub project: PathBuf,
}

impl ScopeRoots {
    /// Construct new scope roots.
    pub fn new(user: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            project: project.into(),
        }
    }

    /// Resolve fixed scope roots from settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if either root cannot be determined.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(settings.user_root()?, settings.project_root()?))
    }

    /// Resolve scope to its root directory.
    pub fn resolve(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::User => self.user.clone(),
            Scope::Project => self.project.clone(),
            Scope::Custom(path) => path.clone(),
        }
    }

    /// Root of the user scope.
    pub fn user(&self) -> &Path {
        &self.user
    }

    /// Root of the project scope.
    pub fn project(&self) -> &Path {
        &self.project
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scope_parsing_and_resolution() {
        let roots = ScopeRoots::new("/home/me/.claude", "/work/app/.claude");
        let cases = [
            ("user", "/home/me/.claude"),
            ("project", "/work/app/.claude"),
            ("/tmp/elsewhere", "/tmp/elsewhere"),
        ];

        for (input, expect) in cases {
            let scope: Scope = input.parse().unwrap();
            assert_eq!(roots.resolve(&scope), PathBuf::from(expect));
            assert_eq!(scope.to_string(), input);
        }
    }
}
