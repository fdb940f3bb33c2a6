// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use skillsync::{
    config::Settings,
    mover::{self, demote, pending_moves, promote, reconcile, MoveError, MoveOptions, MoveOutcome},
    path::default_config_path,
    store::{descriptor::DescriptorFields, BatchReport},
    sync::{FileStatus, PullOptions, PushOptions, PushOutcome, DEFAULT_COMMIT_MESSAGE},
    CacheSource, Item, PushSource, RepoClient, RepoRef, Scope, Store,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use inquire::Confirm;
use std::{io::IsTerminal, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "skillsync [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let settings = Settings::load(config)?;
        let store = Store::from_settings(&settings)?;

        match self.command {
            Command::List(opts) => run_list(&store, opts),
            Command::Staged => run_staged(&store),
            Command::Stage(opts) => run_stage(&store, opts),
            Command::Unstage(opts) => run_unstage(&store, opts),
            Command::Apply(opts) => run_apply(&store, &settings, opts),
            Command::Pull(opts) => run_pull(&store, &settings, opts).await,
            Command::Browse(opts) => run_browse(&settings, opts).await,
            Command::Push(opts) => run_push(&store, &settings, opts),
            Command::Promote(opts) => run_move(&store, opts, promote),
            Command::Demote(opts) => run_move(&store, opts, demote),
            Command::Repos => run_repos(&store),
            Command::Link(opts) => run_link(&store, &settings, opts),
            Command::Unlink => run_unlink(&store),
            Command::Reconcile => run_reconcile(&store),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List items of a scope.
    #[command(override_usage = "skillsync list [options] [<scope>]")]
    List(ListOptions),

    /// List items in the staging area.
    Staged,

    /// Copy items from a scope into the staging area.
    #[command(override_usage = "skillsync stage [options] [<name>]...")]
    Stage(StageOptions),

    /// Remove items from the staging area.
    #[command(override_usage = "skillsync unstage <name>...")]
    Unstage(UnstageOptions),

    /// Copy items from the staging area or a repository cache into a scope.
    #[command(override_usage = "skillsync apply [options] [<name>]...")]
    Apply(ApplyOptions),

    /// Download items of a remote repository into its cache.
    #[command(override_usage = "skillsync pull [options] <repository>")]
    Pull(PullArgs),

    /// List items of a remote repository without downloading them.
    #[command(override_usage = "skillsync browse <repository>")]
    Browse(BrowseOptions),

    /// Push items of a scope to a remote repository.
    #[command(override_usage = "skillsync push [options]")]
    Push(PushArgs),

    /// Move item from project scope to user scope.
    #[command(override_usage = "skillsync promote [options] <name>")]
    Promote(MoveArgs),

    /// Move item from user scope to project scope.
    #[command(override_usage = "skillsync demote [options] <name>")]
    Demote(MoveArgs),

    /// List pulled repositories.
    Repos,

    /// Set default push target.
    #[command(override_usage = "skillsync link <repository>")]
    Link(LinkOptions),

    /// Forget default push target.
    Unlink,

    /// Finish moves that were interrupted.
    Reconcile,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Scope to list: user, project, or a path.
    #[arg(default_value = "project", value_name = "scope")]
    pub scope: Scope,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StageOptions {
    /// Names of items to stage.
    #[arg(group = "selection", value_name = "name")]
    pub names: Vec<String>,

    /// Stage every item of the scope.
    #[arg(short, long, group = "selection")]
    pub all: bool,

    /// Only stage items whose name matches glob pattern, implies --all.
    #[arg(short, long, value_name = "pattern")]
    pub matching: Option<String>,

    /// Scope to stage from: user, project, or a path.
    #[arg(short, long, default_value = "project", value_name = "scope")]
    pub from: Scope,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UnstageOptions {
    /// Names of items to unstage.
    #[arg(required = true, value_name = "name")]
    pub names: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Names of items to apply.
    #[arg(group = "selection", value_name = "name")]
    pub names: Vec<String>,

    /// Apply every item of the source.
    #[arg(short, long, group = "selection")]
    pub all: bool,

    /// Apply from cache of pulled repository instead of staging area.
    #[arg(short = 'r', long, value_name = "repository")]
    pub from_repo: Option<String>,

    /// Scope to apply to: user, project, or a path.
    #[arg(short, long, default_value = "project", value_name = "scope")]
    pub to: Scope,

    /// Overwrite existing items.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PullArgs {
    /// Repository reference, i.e., owner/repo or URL.
    #[arg(required = true, value_name = "repository")]
    pub repository: String,

    /// Overwrite files that were already pulled.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BrowseOptions {
    /// Repository reference, i.e., owner/repo or URL.
    #[arg(required = true, value_name = "repository")]
    pub repository: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PushArgs {
    /// Scope to push: staging, user, project, or a path.
    #[arg(long, default_value = "staging", value_name = "scope")]
    pub from: String,

    /// Repository to push to instead of the linked one.
    #[arg(short, long, value_name = "repository")]
    pub repository: Option<String>,

    /// Commit message.
    #[arg(short, long, default_value = DEFAULT_COMMIT_MESSAGE, value_name = "message")]
    pub message: String,

    /// Force push over remote history.
    #[arg(short, long)]
    pub force: bool,

    /// Descriptor name.
    #[arg(long, value_name = "name")]
    pub name: Option<String>,

    /// Descriptor description.
    #[arg(long, value_name = "summary")]
    pub description: Option<String>,

    /// Descriptor author.
    #[arg(long, value_name = "author")]
    pub author: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MoveArgs {
    /// Name of item to move.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Overwrite item at destination.
    #[arg(short, long)]
    pub force: bool,

    /// Name to use at destination instead of the original name.
    #[arg(short, long, value_name = "name")]
    pub rename: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LinkOptions {
    /// Repository reference, i.e., owner/repo or URL.
    #[arg(required = true, value_name = "repository")]
    pub repository: String,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_list(store: &Store, opts: ListOptions) -> Result<()> {
    print_items(&store.list(&opts.scope));
    Ok(())
}

fn run_staged(store: &Store) -> Result<()> {
    print_items(&store.list_staged());
    Ok(())
}

fn run_stage(store: &Store, opts: StageOptions) -> Result<()> {
    if opts.all || opts.matching.is_some() {
        let pattern = opts.matching.as_deref().map(glob::Pattern::new).transpose()?;
        return check_batch(store.stage_all(&opts.from, pattern.as_ref()));
    }

    if opts.names.is_empty() {
        bail!("name items to stage or pass --all");
    }

    for name in opts.names {
        store.stage(&name, &opts.from)?;
    }

    Ok(())
}

fn run_unstage(store: &Store, opts: UnstageOptions) -> Result<()> {
    for name in opts.names {
        store.unstage(&name)?;
    }

    Ok(())
}

fn run_apply(store: &Store, settings: &Settings, opts: ApplyOptions) -> Result<()> {
    let source = match opts.from_repo {
        Some(reference) => CacheSource::Repository(RepoRef::parse(reference, &settings.github.branch)?),
        None => CacheSource::Staging,
    };

    if opts.all {
        return check_batch(store.apply_all(&source, &opts.to, opts.force));
    }

    if opts.names.is_empty() {
        bail!("name items to apply or pass --all");
    }

    for name in opts.names {
        store.apply(&name, &source, &opts.to, opts.force)?;
    }

    Ok(())
}

async fn run_pull(store: &Store, settings: &Settings, opts: PullArgs) -> Result<()> {
    let client = RepoClient::from_settings(settings)?;
    let repo = client.parse(&opts.repository)?;
    let bar = ProgressBar::new(0);
    let report = client
        .pull(store, &repo, &PullOptions { force: opts.force }, &bar)
        .await?;

    for file in &report.files {
        if let FileStatus::Failed(reason) = &file.status {
            warn!("{}: {reason}", file.path);
        }
    }
    info!(
        "{} downloaded, {} skipped, {} failed",
        report.downloaded, report.skipped, report.failed
    );

    Ok(())
}

async fn run_browse(settings: &Settings, opts: BrowseOptions) -> Result<()> {
    let client = RepoClient::from_settings(settings)?;
    let repo = client.parse(&opts.repository)?;
    for item in client.browse(&repo).await? {
        println!("{:<13} {:<30} {}", item.kind.to_string(), item.name, item.description);
    }

    Ok(())
}

fn run_push(store: &Store, settings: &Settings, opts: PushArgs) -> Result<()> {
    let client = RepoClient::from_settings(settings)?;
    let source = match opts.from.as_str() {
        "staging" => PushSource::Staging,
        scope => PushSource::Scope(scope.parse()?),
    };
    let options = PushOptions {
        repo: opts.repository.map(|reference| client.parse(reference)).transpose()?,
        message: opts.message,
        force: opts.force,
        fields: DescriptorFields {
            name: opts.name,
            description: opts.description,
            author: opts.author,
        },
    };

    match client.push(store, &source, &options)? {
        PushOutcome::Pushed { url, items, .. } => {
            info!("pushed {} items to {url}", items.len());
        }
        PushOutcome::Prepared { path, instructions, items } => {
            info!(
                "prepared {} items at {:?}, no repository linked",
                items.len(),
                path.display()
            );
            println!("{instructions}");
        }
    }

    Ok(())
}

fn run_move(
    store: &Store,
    opts: MoveArgs,
    relocate: fn(&Store, &str, &MoveOptions) -> mover::Result<MoveOutcome>,
) -> Result<()> {
    let mut options = MoveOptions {
        force: opts.force,
        rename: opts.rename,
    };

    let outcome = match relocate(store, &opts.name, &options) {
        Err(MoveError::Conflict { kind, name, suggestion, .. }) if std::io::stdin().is_terminal() => {
            let accepted = Confirm::new(&format!(
                "{kind} {name:?} already exists, move it as {suggestion:?} instead?"
            ))
            .with_default(true)
            .prompt()?;
            if !accepted {
                bail!("{kind} {name:?} left in place");
            }

            options.rename = Some(suggestion);
            relocate(store, &opts.name, &options)?
        }
        result => result?,
    };

    if outcome.renamed {
        info!(
            "{:?} is now {:?} at {:?}",
            outcome.original_name,
            outcome.new_name,
            outcome.to.display()
        );
    }

    Ok(())
}

fn run_repos(store: &Store) -> Result<()> {
    let linked = store.linked();
    for (key, entry) in store.repositories() {
        let marker = if linked.as_deref() == Some(key.as_str()) { "*" } else { " " };
        println!(
            "{marker} {key:<40} {:>4} items  pulled {}",
            entry.item_count,
            entry.last_pulled.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

fn run_link(store: &Store, settings: &Settings, opts: LinkOptions) -> Result<()> {
    store.link(&RepoRef::parse(opts.repository, &settings.github.branch)?)?;
    Ok(())
}

fn run_unlink(store: &Store) -> Result<()> {
    store.unlink()?;
    Ok(())
}

fn run_reconcile(store: &Store) -> Result<()> {
    if pending_moves(store).is_empty() {
        info!("no interrupted moves");
        return Ok(());
    }

    for intent in reconcile(store)? {
        info!("reconciled {} of {} {:?}", intent.direction, intent.kind, intent.name);
    }

    Ok(())
}

fn print_items(items: &[Item]) {
    for item in items {
        println!(
            "{:<13} {:<30} {}",
            item.kind.to_string(),
            item.name,
            item.description().unwrap_or_default()
        );
    }
}

fn check_batch(report: BatchReport) -> Result<()> {
    for item in &report.succeeded {
        info!("{} {:?} done", item.kind, item.name);
    }

    if !report.failed.is_empty() {
        bail!(
            "{} of {} items failed",
            report.failed.len(),
            report.failed.len() + report.succeeded.len()
        );
    }

    Ok(())
}
