// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Item file transfer.
//!
//! Copy and remove item paths. Skills are directories copied recursively,
//! everything else is a single file.

use std::{
    fs::{canonicalize, copy, create_dir_all, remove_dir_all, remove_file},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;
use walkdir::WalkDir;

/// Copy file or directory at `from` to `to`, replacing whatever is at `to`.
///
/// Does nothing when both paths resolve to the same location.
///
/// # Errors
///
/// - Return [`FileError::Copy`] if any part of the copy fails.
/// - Return [`FileError::Remove`] if existing destination cannot be removed.
pub fn replace_path(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());

    // INVARIANT: Never remove the destination if it is also the source.
    if same_path(from, to) {
        debug!("{} is already in place", from.display());
        return Ok(());
    }

    remove_path(to)?;
    copy_path(from, to)
}

/// Whether `a` and `b` resolve to the same existing location.
///
/// Paths that cannot be resolved, e.g., missing ones, never match.
pub fn same_path(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    match (canonicalize(a.as_ref()), canonicalize(b.as_ref())) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy file or directory at `from` to `to`.
///
/// Parent directories of `to` are created as needed. Existing files at the
/// destination are overwritten, but nothing is removed beforehand.
///
/// # Errors
///
/// - Return [`FileError::Copy`] if any part of the copy fails.
pub fn copy_path(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    let copy_err = |source: std::io::Error| FileError::Copy {
        source,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    };

    if from.is_dir() {
        for entry in WalkDir::new(from).follow_links(false) {
            let entry = entry.map_err(|err| copy_err(err.into()))?;
            let Ok(relative) = entry.path().strip_prefix(from) else {
                continue;
            };
            let target = to.join(relative);
            if entry.file_type().is_dir() {
                create_dir_all(&target).map_err(copy_err)?;
            } else {
                if let Some(parent) = target.parent() {
                    create_dir_all(parent).map_err(copy_err)?;
                }
                copy(entry.path(), &target).map_err(copy_err)?;
            }
        }
    } else {
        if let Some(parent) = to.parent() {
            create_dir_all(parent).map_err(copy_err)?;
        }
        copy(from, to).map_err(copy_err)?;
    }

    Ok(())
}

/// Remove file or directory at `path`.
///
/// Missing paths are not an error.
///
/// # Errors
///
/// - Return [`FileError::Remove`] if removal fails.
pub fn remove_path(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let result = if path.is_dir() {
        remove_dir_all(path)
    } else {
        remove_file(path)
    };

    match result {
        Err(source) if source.kind() != ErrorKind::NotFound => Err(FileError::Remove {
            source,
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

/// File transfer error types.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// Copy failed.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Removal failed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FileError> = std::result::Result<T, E>;
