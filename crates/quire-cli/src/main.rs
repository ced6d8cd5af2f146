//! Quire - command-line frontend for the virtual file tree.
//!
//! Restores remembered roots, opens any `--root` folders, runs one action
//! and prints the result.

mod cli;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quire_core::{
    ActionContext, ActionExecutor, ActionRegistry, Command, ConfigStore, LocalDisk, Notification,
    Outcome, RootRegistry, TomlRootStore,
};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.current().logging.level);

    let roots_file = cli.roots_file.clone().unwrap_or_else(|| config_dir().join("roots.toml"));
    let registry = RootRegistry::load(TomlRootStore::new(&roots_file))
        .with_context(|| format!("reading {}", roots_file.display()))?;

    let executor = ActionExecutor::builder(Arc::new(LocalDisk::new()))
        .config(Arc::new(config))
        .roots(Arc::new(registry))
        .build();
    let mut notifications = executor.subscribe();

    executor.restore_roots().await;
    let ctx = ActionContext::new();
    for root in &cli.roots {
        let path = std::path::absolute(root).with_context(|| format!("resolving {}", root.display()))?;
        executor.execute(&ctx, Command::OpenRoot { path }).await?;
    }
    // Opening roots is setup, not the command being watched.
    drain(&mut notifications);

    let output = run(&executor, &ctx, cli.command).await?;
    print!("{output}");

    if cli.watch {
        for notification in drain(&mut notifications) {
            eprintln!("{}", serde_json::to_string(&notification)?);
        }
    }
    Ok(())
}

async fn run(executor: &ActionExecutor, ctx: &ActionContext, command: Commands) -> anyhow::Result<String> {
    let command = match command {
        Commands::Tree => return Ok(render::render_tree(&executor.tree().snapshot())),
        Commands::Attachments { dir } => {
            let files = executor
                .tree()
                .list_attachments(dir.0)
                .with_context(|| format!("no directory {}", dir.0))?;
            return Ok(render::render_attachments(&files));
        }
        Commands::Actions { query } => {
            let registry = ActionRegistry::new();
            let found = registry.fuzzy_search(query.as_deref().unwrap_or(""));
            return Ok(render::render_actions(&found));
        }
        Commands::Cat { file } => {
            let outcome = executor
                .execute(ctx, Command::LoadContent { file: file.0 })
                .await?;
            let content = outcome
                .node()
                .and_then(|n| n.as_file())
                .and_then(|f| f.content())
                .unwrap_or_default();
            return Ok(content.to_string());
        }
        Commands::Open { path } => Command::OpenRoot {
            path: std::path::absolute(&path)?,
        },
        Commands::Mkdir { dir, name } => Command::CreateDirectory { parent: dir.0, name },
        Commands::Touch { dir, name, content } => Command::CreateFile {
            parent: dir.0,
            name,
            content,
        },
        Commands::Save { file, content } => Command::SaveFile {
            file: file.0,
            content,
        },
        Commands::Rename { node, name } => Command::Rename {
            node: node.0,
            new_name: name,
        },
        Commands::Mv { node, dir } => Command::Move {
            node: node.0,
            target: dir.0,
        },
        Commands::Rm { node } => Command::Delete { node: node.0 },
        Commands::Close { root } => Command::Unload { root: root.0 },
    };

    let kind = command.kind();
    let outcome = executor.execute(ctx, command).await?;
    let summary = match &outcome {
        Outcome::Node(node) => format!("{kind}: {}  {}\n", node.hash(), node.path().display()),
        Outcome::Removed(subtree) => format!(
            "{kind}: removed {} ({} nodes)\n",
            subtree.root().path().display(),
            subtree.len()
        ),
        Outcome::Unchanged => format!("{kind}: nothing to do\n"),
    };
    Ok(summary)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigStore> {
    match path {
        Some(path) => ConfigStore::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let default = config_dir().join("config.toml");
            if default.exists() {
                ConfigStore::load(&default).with_context(|| format!("loading {}", default.display()))
            } else {
                Ok(ConfigStore::default())
            }
        }
    }
}

/// `~/.config/quire`, or `/.config/quire` when `HOME` is unset.
fn config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
        .join(".config")
        .join("quire")
}

fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notification) => out.push(notification),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification output fell behind");
            }
            Err(_) => break,
        }
    }
    out
}
