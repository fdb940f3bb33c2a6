// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that skillsync reads at
//! startup. Every field is optional, so a missing file or a missing section
//! simply falls back to the defaults.
//!
//! # General Layout
//!
//! ```toml
//! [store]
//! path = "$XDG_DATA_HOME/skillsync"
//!
//! [scopes]
//! user = "~/.claude"
//! project = ".claude"
//!
//! [github]
//! api_url = "https://api.github.com"
//! raw_url = "https://raw.githubusercontent.com"
//! web_url = "https://github.com"
//! branch = "main"
//! ```
//!
//! Path fields are shell expanded on parse. A relative project root is
//! resolved against the current working directory at call time.

use crate::path::{default_store_dir, default_user_root, NoWayHome, SCOPE_DIR_NAME};

use serde::{Deserialize, Serialize};
use std::{
    env,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Location of the store.
    pub store: StoreSettings,

    /// Roots of the user and project scopes.
    pub scopes: ScopeSettings,

    /// Remote hosting API endpoints and credentials.
    pub github: GithubSettings,
}

impl Settings {
    /// Load settings from target path.
    ///
    /// A missing file yields default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Absolute path to the store root.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default cannot be determined.
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(default_store_dir()?),
        }
    }

    /// Absolute path to the user scope root.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default cannot be determined.
    pub fn user_root(&self) -> Result<PathBuf> {
        match &self.scopes.user {
            Some(path) => Ok(path.clone()),
            None => Ok(default_user_root()?),
        }
    }

    /// Absolute path to the project scope root.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::CurrentDir`] if working directory is unknown.
    pub fn project_root(&self) -> Result<PathBuf> {
        let project = &self.scopes.project;
        if project.is_absolute() {
            return Ok(project.clone());
        }

        Ok(env::current_dir()
            .map_err(ConfigError::CurrentDir)?
            .join(project))
    }

    /// Bearer credential for the hosting API, if any.
    ///
    /// Configured token takes precedence over [`TOKEN_ENV`]. Blank values
    /// count as absent.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| env::var(TOKEN_ENV).ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        if let Some(path) = settings.store.path.take() {
            settings.store.path = Some(expand(&path)?);
        }
        if let Some(path) = settings.scopes.user.take() {
            settings.scopes.user = Some(expand(&path)?);
        }
        settings.scopes.project = expand(&settings.scopes.project)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Store location settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store root. Defaults to `$XDG_DATA_HOME/skillsync`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Scope root settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScopeSettings {
    /// User scope root. Defaults to `~/.claude`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PathBuf>,

    /// Project scope root, relative paths resolve against the working
    /// directory.
    pub project: PathBuf,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            user: None,
            project: PathBuf::from(SCOPE_DIR_NAME),
        }
    }
}

/// Remote hosting API settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubSettings {
    /// Base URL of the REST API used for tree listings.
    pub api_url: String,

    /// Base URL serving raw file content.
    pub raw_url: String,

    /// Base URL used to build clone and push URLs.
    pub web_url: String,

    /// Branch used when a reference does not name one.
    pub branch: String,

    /// Optional bearer credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            raw_url: "https://raw.githubusercontent.com".into(),
            web_url: "https://github.com".into(),
            branch: "main".into(),
            token: None,
        }
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Current working directory cannot be determined.
    #[error("cannot determine current working directory")]
    CurrentDir(#[source] std::io::Error),

    /// Default path cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [store]
            path = "$BLAH/store"

            [scopes]
            user = "$BLAH/.claude"

            [github]
            branch = "trunk"
        "#
        .parse()?;

        let expect = Settings {
            store: StoreSettings {
                path: Some("/home/blah/store".into()),
            },
            scopes: ScopeSettings {
                user: Some("/home/blah/.claude".into()),
                project: ".claude".into(),
            },
            github: GithubSettings {
                branch: "trunk".into(),
                ..GithubSettings::default()
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            store: StoreSettings {
                path: Some("/data/skillsync".into()),
            },
            scopes: ScopeSettings {
                user: Some("/home/blah/.claude".into()),
                project: ".claude".into(),
            },
            github: GithubSettings::default(),
        }
        .to_string();

        let expect = indoc! {r#"
            [store]
            path = "/data/skillsync"

            [scopes]
            user = "/home/blah/.claude"
            project = ".claude"

            [github]
            api_url = "https://api.github.com"
            raw_url = "https://raw.githubusercontent.com"
            web_url = "https://github.com"
            branch = "main"
        "#};

        assert_eq!(result, expect);
    }

    #[sealed_test(env = [("GITHUB_TOKEN", "  env-token  ")])]
    fn token_falls_back_to_environment() {
        let mut settings = Settings::default();
        assert_eq!(settings.github_token(), Some("env-token".into()));

        settings.github.token = Some("file-token".into());
        assert_eq!(settings.github_token(), Some("file-token".into()));
    }

    #[sealed_test(env = [("GITHUB_TOKEN", "   ")])]
    fn blank_token_counts_as_absent() {
        assert_eq!(Settings::default().github_token(), None);
    }

    #[test]
    fn missing_file_yields_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = Settings::load(dir.path().join("config.toml"))?;
        assert_eq!(settings, Settings::default());
        Ok(())
    }

    #[sealed_test]
    fn relative_project_root_resolves_against_cwd() -> anyhow::Result<()> {
        let settings = Settings::default();
        assert_eq!(settings.project_root()?, env::current_dir()?.join(".claude"));
        Ok(())
    }
}
