// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Settings synchronization engine.
//!
//! Manages __items__, i.e., skills, agents, and output-styles, that live
//! under a user root, a project root, or any custom root, and synchronizes
//! them with remote repositories.
//!
//! Items are staged into a local store, pushed from there to a repository,
//! pulled from repositories into per-repository caches, and applied from a
//! cache back into a root. Items can also be moved directly between the
//! project and user roots through promote and demote.
//!
//! # Layout
//!
//! ```text
//! <root>/skills/<name>/SKILL.md
//! <root>/agents/<name>.md
//! <root>/output-styles/<name>.md
//!
//! <store>/manifest.json
//! <store>/pending-moves.json
//! <store>/local/...
//! <store>/repos/<owner>/<repo>/...
//! ```

pub mod config;
pub mod files;
pub mod item;
pub mod mover;
pub mod path;
pub mod remote;
pub mod scan;
pub mod scope;
pub mod store;
pub mod sync;

pub use item::{Item, ItemKind};
pub use remote::RepoRef;
pub use scope::{Scope, ScopeRoots};
pub use store::{CacheSource, Store};
pub use sync::{PushSource, RepoClient};
