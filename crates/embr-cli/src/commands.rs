use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use embr_store::{PruneExpire, RemoveOptions, RepoContext, Repository};
use embr_sync::{list_remote, pull_set, push_set, PushOptions, RemoteConfig, RepoConfig};
use embr_types::ObjectId;

use crate::cli::*;

const DEFAULT_REMOTE: &str = "origin";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init(args) => cmd_init(args),
        Command::Store(args) => cmd_store(args),
        Command::Resolve(args) => cmd_resolve(args),
        Command::Cat(args) => cmd_cat(args),
        Command::Log(args) => cmd_log(args),
        Command::Set(args) => cmd_set(args),
        Command::Remote(args) => cmd_remote(args),
        Command::Push(args) => cmd_push(args),
        Command::Pull(args) => cmd_pull(args),
        Command::LsRemote(args) => cmd_ls_remote(args),
        Command::Rm(args) => cmd_rm(args),
        Command::Gc(args) => cmd_gc(args),
    }
}

fn open_repo() -> anyhow::Result<Repository> {
    let ctx = RepoContext::cached().context("not inside an EmbeddingBridge repository")?;
    Ok(Repository::open(ctx.clone())?)
}

/// Remote config and set name for a sync command.
fn sync_target(
    repo: &Repository,
    remote: Option<String>,
    set: Option<String>,
) -> anyhow::Result<(RepoConfig, String, RemoteConfig, String)> {
    let config = RepoConfig::load(repo.context())?;
    let name = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let remote = config.remote(&name)?.clone();
    let set = match set {
        Some(set) => set,
        None => repo.head()?,
    };
    Ok((config, name, remote, set))
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(|| ".".into());
    let repo = Repository::init(&path).with_context(|| format!("initializing {path}"))?;
    let config = RepoConfig::default();
    config.save(repo.context())?;
    repo.set_head(&config.core.default_set)?;
    println!(
        "{} Initialized EmbeddingBridge repository in {}",
        "✓".green().bold(),
        repo.context().eb_dir().display().to_string().bold()
    );
    println!("  Set: {}", config.core.default_set.yellow());
    Ok(())
}

fn cmd_store(args: StoreArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let data = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file))?;
    let source = args.source.unwrap_or_else(|| args.file.clone());
    let stored = repo.store_embedding(&data, &source, &args.model)?;
    println!(
        "{} Stored {} ({} dimensions) in set {}",
        "✓".green().bold(),
        stored.id.short_hex().yellow(),
        stored.dimensions,
        stored.set.cyan()
    );
    Ok(())
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    println!("{}", repo.resolve(&args.prefix)?);
    Ok(())
}

fn cmd_cat(args: CatArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let id: ObjectId = repo.resolve(&args.prefix)?;
    let data = repo.read(&id)?;
    if args.raw {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&data)?;
        stdout.flush()?;
        return Ok(());
    }
    let values: Vec<String> = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]).to_string())
        .collect();
    println!("[{}]", values.join(", "));
    Ok(())
}

fn cmd_log(args: LogArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let set = match args.set {
        Some(name) => repo.set(&name)?,
        None => repo.current_set()?,
    };
    let entries = set.read_log()?;
    if entries.is_empty() {
        println!("No embeddings in set {}.", set.name().yellow());
        return Ok(());
    }
    for entry in entries.iter().rev().take(args.limit) {
        let short = entry.hash().short_hex();
        if args.oneline {
            println!("{} {}", short.yellow(), entry.source());
            continue;
        }
        let when = chrono::DateTime::from_timestamp(entry.timestamp(), 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| entry.timestamp().to_string());
        println!("{}  {}", short.yellow().bold(), when.dimmed());
        println!("  Source: {}", entry.source());
        if let Some(model) = entry.model() {
            println!("  Model: {}", model.cyan());
        }
    }
    Ok(())
}

fn cmd_set(args: SetArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    match args.name {
        Some(name) => {
            repo.set_head(&name)?;
            println!("Switched to set {}", name.yellow().bold());
        }
        None => {
            let head = repo.head()?;
            let mut sets = repo.list_sets()?;
            if !sets.contains(&head) {
                sets.push(head.clone());
                sets.sort();
            }
            for name in sets {
                if name == head {
                    println!("* {}", name.green().bold());
                } else {
                    println!("  {name}");
                }
            }
        }
    }
    Ok(())
}

fn cmd_remote(args: RemoteArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let mut config = RepoConfig::load(repo.context())?;
    match args.action {
        Some(RemoteAction::Add {
            name,
            url,
            timeout,
            transformer,
        }) => {
            let remote = RemoteConfig {
                url: url.clone(),
                timeout_secs: timeout,
                transformer,
            };
            config.add_remote(&name, remote)?;
            config.save(repo.context())?;
            println!("Added remote {} → {}", name.bold(), url.blue());
        }
        Some(RemoteAction::Remove { name }) => {
            config.remove_remote(&name)?;
            config.save(repo.context())?;
            println!("Removed remote {}", name.bold());
        }
        Some(RemoteAction::List) | None => {
            if config.remotes.is_empty() {
                println!("No remotes configured.");
            }
            for (name, remote) in &config.remotes {
                println!("{}\t{}", name.bold(), remote.url);
            }
        }
    }
    Ok(())
}

fn cmd_push(args: PushArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let (config, name, remote, set) = sync_target(&repo, args.remote, args.set)?;
    let settings = config.transport_settings(&remote, Some(repo.context()));
    let result = push_set(&repo, &remote.url, &set, settings, PushOptions { force: args.force })?;
    println!(
        "{} Pushed {} objects ({} bytes) to {}/{}",
        "✓".green().bold(),
        result.objects_sent.to_string().bold(),
        result.bytes_sent,
        name.bold(),
        set.yellow()
    );
    for key in &result.pruned {
        println!("  {} {}", "pruned:".red(), key);
    }
    Ok(())
}

fn cmd_pull(args: PullArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let (config, name, remote, set) = sync_target(&repo, args.remote, args.set)?;
    let settings = config.transport_settings(&remote, None);
    let result = pull_set(&repo, &remote.url, &set, settings)?;
    println!(
        "{} Pulled {} objects ({} bytes) from {}/{}, {} already present",
        "✓".green().bold(),
        result.objects_received.to_string().bold(),
        result.bytes_received,
        name.bold(),
        set.yellow(),
        result.already_present
    );
    Ok(())
}

fn cmd_ls_remote(args: LsRemoteArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let (config, _name, remote, set) = sync_target(&repo, args.remote, args.set)?;
    let settings = config.transport_settings(&remote, None);
    for key in list_remote(&remote.url, &set, settings)? {
        println!("{key}");
    }
    Ok(())
}

fn cmd_rm(args: RmArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let set = match args.set {
        Some(set) => set,
        None => repo.head()?,
    };
    let options = RemoveOptions {
        model: args.model,
        cached: args.cached,
    };
    let removed = repo.remove_source(&set, &args.source, &options)?;
    if removed.untracked.is_empty() {
        println!("{} No matching embeddings found to remove", "!".yellow().bold());
        return Ok(());
    }
    println!(
        "{} Removed {} from set {}",
        "✓".green().bold(),
        args.source.bold(),
        set.yellow()
    );
    for id in &removed.deleted {
        println!("  {} {}", "deleted:".red(), id.short_hex());
    }
    Ok(())
}

fn cmd_gc(args: GcArgs) -> anyhow::Result<()> {
    let repo = open_repo()?;
    let expire = match args.prune {
        Some(text) => text.parse::<PruneExpire>()?,
        None => PruneExpire::default(),
    };
    let report = repo.gc(expire)?;
    println!(
        "{} Removed {} unreferenced objects ({} bytes freed)",
        "✓".green().bold(),
        report.objects_removed.to_string().bold(),
        report.bytes_freed
    );
    if report.objects_kept > 0 {
        println!("  {} unreferenced objects are within the grace period", report.objects_kept);
    }
    Ok(())
}
