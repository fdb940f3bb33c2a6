// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git command-line driver.
//!
//! Push is performed by calling the Git binary against a freshly
//! materialized directory. Using the binary rather than libgit2 lets the
//! user's own credential helpers and SSH setup do the authentication.

use std::{
    ffi::{OsStr, OsString},
    io::ErrorKind,
    path::Path,
    process::Command,
};
use tracing::{debug, instrument};

/// Driver for the Git binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    envs: Vec<(OsString, OsString)>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    /// Construct new driver for target Git executable.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
        }
    }

    /// Set environment variable for every call.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Check that the Git executable can be run.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::ToolMissing`] if executable cannot be spawned.
    /// - Return [`GitError::Failed`] if executable reports failure.
    pub fn ensure_available(&self) -> Result<String> {
        self.call(None, ["--version"])
    }

    /// Run Git with `args` inside `dir`.
    ///
    /// Returns combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::ToolMissing`] if executable cannot be spawned.
    /// - Return [`GitError::Failed`] if Git exits unsuccessfully.
    #[instrument(skip(self, dir, args), level = "debug")]
    pub fn run(
        &self,
        dir: impl AsRef<Path>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Result<String> {
        self.call(Some(dir.as_ref()), args)
    }

    fn call(
        &self,
        dir: Option<&Path>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Result<String> {
        let args: Vec<OsString> = args.into_iter().map(|arg| arg.as_ref().to_owned()).collect();
        let mut command = Command::new(&self.program);
        command.args(&args);
        command.envs(self.envs.iter().map(|(key, value)| (key, value)));
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        debug!("run {:?} {:?}", self.program, args);
        let output = command.output().map_err(|error| match error.kind() {
            ErrorKind::NotFound => GitError::ToolMissing {
                program: self.program.to_string_lossy().into_owned(),
            },
            _ => GitError::Syscall(error),
        })?;

        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
        let mut message = String::new();

        if !stdout.is_empty() {
            message.push_str(format!("stdout: {stdout}").as_str());
        }

        if !stderr.is_empty() {
            message.push_str(format!("stderr: {stderr}").as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        let message = message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message);

        if !output.status.success() {
            let command = args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            return Err(GitError::Failed { command, message });
        }

        Ok(message)
    }
}

/// Git driver error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Git executable is not available.
    #[error("cannot run {program:?}, is git installed and on PATH?")]
    ToolMissing { program: String },

    /// Git exited unsuccessfully.
    #[error("command \"git {command}\" failed:\n{message}")]
    Failed { command: String, message: String },

    /// Process could not be spawned for other reasons.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_tool_missing() {
        let git = GitCli::new("definitely-not-a-real-git-binary");
        assert!(matches!(
            git.ensure_available(),
            Err(GitError::ToolMissing { .. })
        ));
    }
}
