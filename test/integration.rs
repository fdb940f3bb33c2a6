// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{OfflineHost, RemoteFixture, StoreFixture};

use skillsync::{
    mover::{demote, pending_moves, promote, MoveError, MoveOptions},
    remote::git::GitCli,
    scan::{find_kind, scan},
    store::descriptor::{DescriptorFields, RepoDescriptor, DESCRIPTOR_FILE, README_FILE},
    sync::{PushOptions, PushOutcome, SyncError},
    ItemKind, PushSource, RepoClient, RepoRef, Scope,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;

const REVIEWER: &str = indoc! {r#"
    ---
    name: reviewer
    description: "reviews PRs"
    ---
    Review the diff.
"#};

fn git() -> GitCli {
    GitCli::default()
        .with_env("GIT_AUTHOR_NAME", "John Doe")
        .with_env("GIT_AUTHOR_EMAIL", "john@doe.com")
        .with_env("GIT_COMMITTER_NAME", "John Doe")
        .with_env("GIT_COMMITTER_EMAIL", "john@doe.com")
}

fn push_client(fixture: &StoreFixture) -> RepoClient<OfflineHost> {
    let web_url = format!("file://{}", fixture.dir.path().join("remotes").display());
    RepoClient::new(OfflineHost, web_url, "main").with_git(git())
}

fn fields() -> DescriptorFields {
    DescriptorFields {
        author: Some("John Doe".into()),
        ..Default::default()
    }
}

#[test]
fn promote_moves_skill_to_user_scope() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.put(&Scope::Project, "skills/reviewer/SKILL.md", REVIEWER)?;

    let outcome = promote(&fixture.store, "reviewer", &MoveOptions::default())?;

    assert!(!outcome.renamed);
    assert_eq!(outcome.new_name, "reviewer");
    assert_eq!(fixture.read(&Scope::User, "skills/reviewer/SKILL.md")?, REVIEWER);
    assert_eq!(outcome.item.description(), Some("reviews PRs"));
    assert!(find_kind(fixture.root(&Scope::Project), ItemKind::Skill, "reviewer").is_none());
    assert!(pending_moves(&fixture.store).is_empty());

    Ok(())
}

#[test]
fn demote_conflict_then_rename() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.put(&Scope::User, "agents/notifier.md", "user copy")?;
    fixture.put(&Scope::Project, "agents/notifier.md", "project copy")?;

    match demote(&fixture.store, "notifier", &MoveOptions::default()) {
        Err(MoveError::Conflict { suggestion, .. }) => assert_eq!(suggestion, "notifier-1"),
        other => panic!("expected conflict, got {other:?}"),
    }

    let options = MoveOptions {
        rename: Some("notifier-1".into()),
        ..Default::default()
    };
    let outcome = demote(&fixture.store, "notifier", &options)?;

    assert!(outcome.renamed);
    assert_eq!(outcome.original_name, "notifier");
    assert_eq!(fixture.read(&Scope::Project, "agents/notifier-1.md")?, "user copy");
    assert_eq!(fixture.read(&Scope::Project, "agents/notifier.md")?, "project copy");
    assert!(find_kind(fixture.root(&Scope::User), ItemKind::Agent, "notifier").is_none());

    Ok(())
}

#[test]
fn conflict_suggestion_skips_taken_names() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.put(&Scope::Project, "output-styles/x.md", "")?;
    fixture.put(&Scope::User, "output-styles/x.md", "")?;
    fixture.put(&Scope::User, "output-styles/x-1.md", "")?;

    match promote(&fixture.store, "x", &MoveOptions::default()) {
        Err(MoveError::Conflict { suggestion, .. }) => assert_eq!(suggestion, "x-2"),
        other => panic!("expected conflict, got {other:?}"),
    }

    Ok(())
}

#[test]
fn promote_then_demote_restores_item() -> Result<()> {
    let fixture = StoreFixture::new()?;
    fixture.put(&Scope::Project, "skills/reviewer/SKILL.md", REVIEWER)?;
    fixture.put(&Scope::Project, "skills/reviewer/notes/checklist.md", "- tests")?;
    let before = find_kind(fixture.root(&Scope::Project), ItemKind::Skill, "reviewer");

    promote(&fixture.store, "reviewer", &MoveOptions::default())?;
    demote(&fixture.store, "reviewer", &MoveOptions::default())?;

    let after = find_kind(fixture.root(&Scope::Project), ItemKind::Skill, "reviewer");
    assert_eq!(
        before.map(|item| item.metadata),
        after.map(|item| item.metadata)
    );
    assert_eq!(fixture.read(&Scope::Project, "skills/reviewer/SKILL.md")?, REVIEWER);
    assert_eq!(
        fixture.read(&Scope::Project, "skills/reviewer/notes/checklist.md")?,
        "- tests"
    );
    assert!(scan(fixture.root(&Scope::User)).is_empty());

    Ok(())
}

#[test]
fn staged_items_are_pushed_to_remote() -> Result<()> {
    if GitCli::default().ensure_available().is_err() {
        return Ok(());
    }

    let fixture = StoreFixture::new()?;
    let remote = RemoteFixture::new(fixture.dir.path().join("remotes"), "acme", "skills")?;
    fixture.put(&Scope::Project, "skills/reviewer/SKILL.md", REVIEWER)?;
    fixture.put(&Scope::Project, "agents/notifier.md", "---\ndescription: pings\n---\n")?;
    fixture.store.stage("reviewer", &Scope::Project)?;
    fixture.store.stage("notifier", &Scope::Project)?;

    let client = push_client(&fixture);
    let options = PushOptions {
        repo: Some(RepoRef::new("acme", "skills", "main")),
        message: "sync settings".into(),
        fields: fields(),
        ..Default::default()
    };
    let outcome = client.push(&fixture.store, &PushSource::Staging, &options)?;

    match outcome {
        PushOutcome::Pushed { repository, items, .. } => {
            assert_eq!(repository.key(), "acme/skills");
            assert_eq!(items.len(), 2);
        }
        other => panic!("expected push, got {other:?}"),
    }

    assert_eq!(remote.head_message("main")?, "sync settings");
    assert_eq!(remote.cat_file("main", "skills/reviewer/SKILL.md")?, REVIEWER);
    let descriptor = RepoDescriptor::from_slice(remote.cat_file("main", DESCRIPTOR_FILE)?.as_bytes())?;
    assert_eq!(descriptor.author, "John Doe");
    assert_eq!(descriptor.stats.skills, 1);
    assert_eq!(descriptor.stats.agents, 1);
    assert!(remote.cat_file("main", README_FILE)?.contains("**notifier**"));

    Ok(())
}

#[test]
fn push_uses_linked_repository() -> Result<()> {
    if GitCli::default().ensure_available().is_err() {
        return Ok(());
    }

    let fixture = StoreFixture::new()?;
    let remote = RemoteFixture::new(fixture.dir.path().join("remotes"), "acme", "team")?;
    fixture.put(&Scope::User, "output-styles/terse.md", "Be brief.")?;
    fixture.store.link(&RepoRef::new("acme", "team", "main"))?;

    let client = push_client(&fixture);
    let options = PushOptions {
        fields: fields(),
        ..Default::default()
    };
    let outcome = client.push(&fixture.store, &PushSource::Scope(Scope::User), &options)?;

    assert!(matches!(outcome, PushOutcome::Pushed { .. }));
    assert_eq!(remote.cat_file("main", "output-styles/terse.md")?, "Be brief.");

    Ok(())
}

#[test]
fn push_to_missing_remote_fails_with_git_error() -> Result<()> {
    if GitCli::default().ensure_available().is_err() {
        return Ok(());
    }

    let fixture = StoreFixture::new()?;
    fixture.put(&Scope::Project, "agents/notifier.md", "")?;

    let client = push_client(&fixture);
    let options = PushOptions {
        repo: Some(RepoRef::new("acme", "missing", "main")),
        fields: fields(),
        ..Default::default()
    };
    let result = client.push(&fixture.store, &PushSource::Scope(Scope::Project), &options);
    assert!(matches!(result, Err(SyncError::Git(_))));

    Ok(())
}
