// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Item representation.
//!
//! An __item__ is a named, typed configuration artifact that lives under a
//! root directory. There are three kinds of items:
//!
//! - __Skill__: a directory `skills/<name>/` that must contain a `SKILL.md`
//!   descriptor.
//! - __Agent__: a single file `agents/<name>.md`.
//! - __Output style__: a single file `output-styles/<name>.md`.
//!
//! # Metadata Block
//!
//! Descriptors and single-file items may open with a block delimited by
//! `---` lines. The block holds `key: value` pairs that describe the item,
//! e.g., its description. Items without the block simply carry empty
//! metadata.
//!
//! ```text
//! ---
//! description: reviews PRs
//! model: sonnet
//! ---
//! # Reviewer
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Required descriptor file of every skill directory.
pub const SKILL_DESCRIPTOR: &str = "SKILL.md";

/// Extension of single-file items.
pub const MARKDOWN_EXT: &str = "md";

/// Kind of item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Skill,
    Agent,
    OutputStyle,
}

impl ItemKind {
    /// Every kind, in lookup order.
    pub const ALL: [ItemKind; 3] = [ItemKind::Skill, ItemKind::Agent, ItemKind::OutputStyle];

    /// Name of the type directory under a root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Agent => "agents",
            Self::OutputStyle => "output-styles",
        }
    }

    /// Determine kind from a type directory name.
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.dir_name() == dir)
    }

    /// Relative path of an item of this kind named `name`.
    pub fn relative_path(self, name: &str) -> PathBuf {
        match self {
            Self::Skill => Path::new(self.dir_name()).join(name),
            _ => Path::new(self.dir_name()).join(format!("{name}.{MARKDOWN_EXT}")),
        }
    }

    /// Relative path of the file carrying the metadata block.
    pub fn descriptor_path(self, name: &str) -> PathBuf {
        match self {
            Self::Skill => self.relative_path(name).join(SKILL_DESCRIPTOR),
            _ => self.relative_path(name),
        }
    }

    /// Whether items of this kind are directories.
    pub fn is_dir(self) -> bool {
        matches!(self, Self::Skill)
    }
}

impl Display for ItemKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Skill => "skill",
            Self::Agent => "agent",
            Self::OutputStyle => "output-style",
        })
    }
}

impl FromStr for ItemKind {
    type Err = UnknownKind;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "skill" | "skills" => Ok(Self::Skill),
            "agent" | "agents" => Ok(Self::Agent),
            "output-style" | "output-styles" => Ok(Self::OutputStyle),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// String does not name any item kind.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown item kind {0:?}")]
pub struct UnknownKind(pub String);

/// Key/value pairs from an item's metadata block.
pub type Metadata = BTreeMap<String, String>;

/// A single item found under some root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Kind of item.
    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Directory name for skills, file stem otherwise.
    pub name: String,

    /// Path relative to the root the item was found in.
    pub path: PathBuf,

    /// Parsed metadata block.
    pub metadata: Metadata,

    /// Modification time of the item's descriptor or file.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Description from metadata, if any.
    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").map(String::as_str)
    }

    /// Absolute location of the item under `root`.
    pub fn location(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.path)
    }
}

/// Parse leading metadata block of markdown content.
///
/// Block is read as YAML first. Blocks that are not valid YAML fall back to
/// plain `key: value` line splitting so a stray colon in a description does
/// not drop the whole block. Missing block yields empty metadata.
pub fn parse_metadata(content: &str) -> Metadata {
    let Some(block) = leading_block(content) else {
        return Metadata::new();
    };

    match serde_yaml::from_str::<serde_yaml::Value>(&block) {
        Ok(serde_yaml::Value::Mapping(mapping)) => mapping
            .into_iter()
            .filter_map(|(key, value)| Some((scalar_to_string(key)?, value_to_string(value))))
            .collect(),
        Ok(serde_yaml::Value::Null) => Metadata::new(),
        Ok(_) | Err(_) => {
            debug!("metadata block is not a mapping, splitting lines instead");
            parse_lines(&block)
        }
    }
}

fn leading_block(content: &str) -> Option<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }

    let mut block = Vec::new();
    for line in lines {
        if line.trim_end() == "---" {
            return Some(block.join("\n"));
        }
        block.push(line);
    }

    // INVARIANT: Unterminated block is not a block.
    None
}

fn parse_lines(block: &str) -> Metadata {
    block
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty() && !key.starts_with('#'))
        .collect()
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_yaml_metadata_block() {
        let content = indoc! {r#"
            ---
            name: reviewer
            description: "reviews PRs"
            version: 2
            tools:
              - Read
              - Grep
            ---
            # Reviewer
        "#};

        let result = parse_metadata(content);
        assert_eq!(result.get("name").map(String::as_str), Some("reviewer"));
        assert_eq!(result.get("description").map(String::as_str), Some("reviews PRs"));
        assert_eq!(result.get("version").map(String::as_str), Some("2"));
        assert_eq!(result.get("tools").map(String::as_str), Some("- Read\n- Grep"));
    }

    #[test]
    fn missing_block_yields_empty_metadata() {
        assert!(parse_metadata("# Just a heading\n\nbody").is_empty());
        assert!(parse_metadata("").is_empty());
    }

    #[test]
    fn unterminated_block_yields_empty_metadata() {
        assert!(parse_metadata("---\ndescription: never closed\n").is_empty());
    }

    #[test]
    fn invalid_yaml_falls_back_to_line_splitting() {
        let content = indoc! {r#"
            ---
            description: checks: style and lint
            color: 'blue'
            ---
        "#};

        let result = parse_metadata(content);
        let expect = Metadata::from([
            ("color".to_string(), "blue".to_string()),
            ("description".to_string(), "checks: style and lint".to_string()),
        ]);
        assert_eq!(result, expect);
    }

    #[test]
    fn kind_paths_follow_type_directories() {
        assert_eq!(ItemKind::Skill.relative_path("x"), PathBuf::from("skills/x"));
        assert_eq!(
            ItemKind::Skill.descriptor_path("x"),
            PathBuf::from("skills/x/SKILL.md")
        );
        assert_eq!(ItemKind::Agent.relative_path("y"), PathBuf::from("agents/y.md"));
        assert_eq!(
            ItemKind::OutputStyle.descriptor_path("z"),
            PathBuf::from("output-styles/z.md")
        );
        assert_eq!(ItemKind::from_dir_name("output-styles"), Some(ItemKind::OutputStyle));
        assert_eq!(ItemKind::from_dir_name("docs"), None);
    }

    #[test]
    fn kind_round_trips_through_display() -> anyhow::Result<()> {
        for kind in ItemKind::ALL {
            assert_eq!(kind.to_string().parse::<ItemKind>()?, kind);
        }
        assert_eq!("output-styles".parse::<ItemKind>()?, ItemKind::OutputStyle);
        assert!("plugin".parse::<ItemKind>().is_err());
        Ok(())
    }
}
