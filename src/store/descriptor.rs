// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository descriptors.
//!
//! A __descriptor__ is a small JSON record listing the items of a root along
//! with aggregate counts per kind. It is pushed alongside items so browsing a
//! remote repository can skip inferring items from the file tree, and it is
//! rendered into a generated README.
//!
//! Descriptors are always regenerated from a live scan. A previous
//! descriptor only lends its hand-authored fields (name, description,
//! author, creation time), never its item list.

use crate::{
    item::{Item, ItemKind},
    scan::scan,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// File name of a descriptor inside a root.
pub const DESCRIPTOR_FILE: &str = "skillsync.json";

/// File name of the generated README inside a root.
pub const README_FILE: &str = "README.md";

/// Current descriptor schema version.
pub const DESCRIPTOR_VERSION: &str = "1.0";

/// Inventory of a root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoDescriptor {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<DescriptorItem>,
    #[serde(default)]
    pub stats: DescriptorStats,
}

/// Item listing inside a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DescriptorItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

impl From<&Item> for DescriptorItem {
    fn from(item: &Item) -> Self {
        Self {
            kind: item.kind,
            name: item.name.clone(),
            path: item.path.to_string_lossy().replace('\\', "/"),
            description: item.description().unwrap_or_default().to_string(),
        }
    }
}

/// Aggregate counts per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DescriptorStats {
    #[serde(default)]
    pub skills: usize,
    #[serde(default)]
    pub agents: usize,
    #[serde(default)]
    pub output_styles: usize,
    #[serde(default)]
    pub total: usize,
}

impl DescriptorStats {
    fn tally<'a>(kinds: impl IntoIterator<Item = &'a ItemKind>) -> Self {
        let mut stats = Self::default();
        for kind in kinds {
            match kind {
                ItemKind::Skill => stats.skills += 1,
                ItemKind::Agent => stats.agents += 1,
                ItemKind::OutputStyle => stats.output_styles += 1,
            }
            stats.total += 1;
        }
        stats
    }
}

/// Hand-authored descriptor fields supplied by the caller.
///
/// Supplied fields win over the previous descriptor, which wins over the
/// built-in fallbacks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DescriptorFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl RepoDescriptor {
    /// Generate descriptor for `items`.
    ///
    /// `fallback_name` is used when neither `fields` nor `previous` name the
    /// descriptor. Author falls back to Git's `user.name`.
    pub fn generate(
        items: &[Item],
        previous: Option<&RepoDescriptor>,
        fields: &DescriptorFields,
        fallback_name: &str,
    ) -> Self {
        let now = Utc::now();
        let pick = |field: &Option<String>, prior: Option<&String>| -> Option<String> {
            field
                .clone()
                .or_else(|| prior.filter(|value| !value.is_empty()).cloned())
        };

        let name = pick(&fields.name, previous.map(|p| &p.name))
            .unwrap_or_else(|| fallback_name.to_string());
        let description = pick(&fields.description, previous.map(|p| &p.description))
            .unwrap_or_else(|| format!("Settings collection {name}"));
        let author = pick(&fields.author, previous.map(|p| &p.author))
            .or_else(git_user_name)
            .unwrap_or_else(|| "unknown".into());

        Self {
            version: DESCRIPTOR_VERSION.into(),
            name,
            description,
            author,
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
            items: items.iter().map(DescriptorItem::from).collect(),
            stats: DescriptorStats::tally(items.iter().map(|item| &item.kind)),
        }
    }

    /// Parse descriptor from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::Json`] if content is malformed.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Load descriptor of `root`, if present and well-formed.
    pub fn load(root: impl AsRef<Path>) -> Option<Self> {
        let path = root.as_ref().join(DESCRIPTOR_FILE);
        let content = match read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return None,
            Err(error) => {
                warn!("cannot read descriptor at {}: {error}", path.display());
                return None;
            }
        };

        serde_json::from_str(&content)
            .map_err(|error| warn!("ignoring corrupt descriptor at {}: {error}", path.display()))
            .ok()
    }

    /// Write descriptor into `root`.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::Json`] if serialization fails.
    /// - Return [`DescriptorError::Write`] if the file cannot be written.
    pub fn save(&self, root: impl AsRef<Path>) -> Result<()> {
        let path = root.as_ref().join(DESCRIPTOR_FILE);
        let content = serde_json::to_string_pretty(self)?;
        write(&path, content).map_err(|source| DescriptorError::Write { source, path })
    }

    /// Write generated README into `root`.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::Write`] if the file cannot be written.
    pub fn save_readme(&self, root: impl AsRef<Path>) -> Result<()> {
        let path = root.as_ref().join(README_FILE);
        write(&path, self.render_readme()).map_err(|source| DescriptorError::Write { source, path })
    }

    /// Render human-readable README.
    pub fn render_readme(&self) -> String {
        Readme(self).to_string()
    }
}

/// README view of a descriptor.
struct Readme<'a>(&'a RepoDescriptor);

impl Display for Readme<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let descriptor = self.0;
        writeln!(fmt, "# {}\n", descriptor.name)?;
        if !descriptor.description.is_empty() {
            writeln!(fmt, "{}\n", descriptor.description)?;
        }

        let stats = &descriptor.stats;
        writeln!(fmt, "| Type | Count |")?;
        writeln!(fmt, "|------|-------|")?;
        writeln!(fmt, "| Skills | {} |", stats.skills)?;
        writeln!(fmt, "| Agents | {} |", stats.agents)?;
        writeln!(fmt, "| Output styles | {} |", stats.output_styles)?;
        writeln!(fmt, "| **Total** | **{}** |", stats.total)?;

        for (kind, heading) in [
            (ItemKind::Skill, "Skills"),
            (ItemKind::Agent, "Agents"),
            (ItemKind::OutputStyle, "Output Styles"),
        ] {
            let listed: Vec<_> = descriptor.items.iter().filter(|item| item.kind == kind).collect();
            if listed.is_empty() {
                continue;
            }

            writeln!(fmt, "\n## {heading}\n")?;
            for item in listed {
                write!(fmt, "- **{}** (`{}`)", item.name, item.path)?;
                if !item.description.is_empty() {
                    write!(fmt, ": {}", item.description)?;
                }
                writeln!(fmt)?;
            }
        }

        writeln!(fmt, "\n## Usage\n")?;
        writeln!(fmt, "```sh")?;
        writeln!(fmt, "skillsync pull <owner>/<repo>")?;
        writeln!(fmt, "skillsync apply --all --from-repo <owner>/<repo> --to user")?;
        writeln!(fmt, "```")?;
        writeln!(
            fmt,
            "\n_Author: {}. Updated {}._",
            descriptor.author,
            descriptor.updated_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Regenerate and save the descriptor of `root` from a live scan.
///
/// # Errors
///
/// - Return [`DescriptorError`] if the descriptor cannot be written.
pub fn refresh(
    root: impl AsRef<Path>,
    fields: &DescriptorFields,
    fallback_name: &str,
) -> Result<RepoDescriptor> {
    let root = root.as_ref();
    let previous = RepoDescriptor::load(root);
    let descriptor = RepoDescriptor::generate(&scan(root), previous.as_ref(), fields, fallback_name);
    descriptor.save(root)?;
    debug!(
        "refreshed descriptor of {} with {} items",
        root.display(),
        descriptor.stats.total
    );

    Ok(descriptor)
}

/// Git's configured `user.name`, if any.
pub fn git_user_name() -> Option<String> {
    git2::Config::open_default()
        .and_then(|config| config.get_string("user.name"))
        .ok()
        .filter(|name| !name.trim().is_empty())
}

/// Descriptor error types.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Descriptor JSON cannot be parsed or produced.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Descriptor or README cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Metadata;
    use pretty_assertions::assert_eq;

    fn item(kind: ItemKind, name: &str, description: &str) -> Item {
        let mut metadata = Metadata::new();
        if !description.is_empty() {
            metadata.insert("description".into(), description.into());
        }
        Item {
            kind,
            name: name.into(),
            path: kind.relative_path(name),
            metadata,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn generate_counts_items_per_kind() {
        let items = vec![
            item(ItemKind::Skill, "reviewer", "reviews PRs"),
            item(ItemKind::Skill, "planner", ""),
            item(ItemKind::Agent, "notifier", "pings people"),
        ];
        let fields = DescriptorFields {
            author: Some("Jane".into()),
            ..Default::default()
        };

        let result = RepoDescriptor::generate(&items, None, &fields, "local");
        assert_eq!(result.name, "local");
        assert_eq!(result.author, "Jane");
        assert_eq!(
            result.stats,
            DescriptorStats {
                skills: 2,
                agents: 1,
                output_styles: 0,
                total: 3
            }
        );
        assert_eq!(
            result.items[0],
            DescriptorItem {
                kind: ItemKind::Skill,
                name: "reviewer".into(),
                path: "skills/reviewer".into(),
                description: "reviews PRs".into(),
            }
        );
    }

    #[test]
    fn generate_borrows_authored_fields_but_not_items() {
        let old_items = vec![item(ItemKind::Agent, "gone", "")];
        let fields = DescriptorFields {
            name: Some("team-settings".into()),
            description: Some("shared by the team".into()),
            author: Some("Jane".into()),
        };
        let previous = RepoDescriptor::generate(&old_items, None, &fields, "ignored");

        let items = vec![item(ItemKind::OutputStyle, "terse", "")];
        let result = RepoDescriptor::generate(&items, Some(&previous), &DescriptorFields::default(), "fallback");

        assert_eq!(result.name, "team-settings");
        assert_eq!(result.description, "shared by the team");
        assert_eq!(result.author, "Jane");
        assert_eq!(result.created_at, previous.created_at);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "terse");
        assert_eq!(result.stats.total, 1);
    }

    #[test]
    fn readme_lists_items_by_kind() {
        let items = vec![
            item(ItemKind::Skill, "reviewer", "reviews PRs"),
            item(ItemKind::Agent, "notifier", ""),
        ];
        let fields = DescriptorFields {
            author: Some("Jane".into()),
            ..Default::default()
        };
        let readme = RepoDescriptor::generate(&items, None, &fields, "demo").render_readme();

        assert!(readme.starts_with("# demo\n"));
        assert!(readme.contains("## Skills\n\n- **reviewer** (`skills/reviewer`): reviews PRs\n"));
        assert!(readme.contains("## Agents\n\n- **notifier** (`agents/notifier.md`)\n"));
        assert!(!readme.contains("## Output Styles"));
        assert!(readme.contains("| **Total** | **2** |"));
        assert!(readme.contains("```sh\nskillsync pull <owner>/<repo>\n"));
        assert!(readme.contains("\n_Author: Jane. Updated "));
    }

    #[test]
    fn readme_carries_description_and_footer() {
        let fields = DescriptorFields {
            author: Some("Jane".into()),
            description: Some("shared by the team".into()),
            name: None,
        };
        let descriptor = RepoDescriptor::generate(&[], None, &fields, "demo");
        let readme = descriptor.render_readme();

        assert!(readme.starts_with("# demo\n\nshared by the team\n\n| Type | Count |\n"));
        let footer = format!(
            "\n_Author: Jane. Updated {}._\n",
            descriptor.updated_at.format("%Y-%m-%d %H:%M UTC")
        );
        assert!(readme.ends_with(&footer));
        assert!(!readme.contains("## Skills"));
    }

    #[test]
    fn descriptor_json_uses_schema_field_names() -> anyhow::Result<()> {
        let raw = r#"{
            "version": "1.0",
            "name": "remote",
            "description": "authored remotely",
            "author": "someone",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z",
            "items": [
                {"type": "output-style", "name": "terse", "path": "output-styles/terse.md", "description": "short"}
            ],
            "stats": {"skills": 0, "agents": 0, "output_styles": 1, "total": 1}
        }"#;

        let result = RepoDescriptor::from_slice(raw.as_bytes())?;
        assert_eq!(result.items[0].kind, ItemKind::OutputStyle);
        assert_eq!(result.stats.output_styles, 1);

        Ok(())
    }
}
