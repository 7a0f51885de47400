// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use compdeps::{
    component::jsonnetfile::JsonnetBinary,
    config::JsonnetfileParameters,
    path::{default_manifest_path, default_work_root},
    Component, ComponentOptions, ComponentStore, HeadState, Resolution,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  compdeps [options] <compdeps-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Sync(opts) => run_sync(opts).await,
            Command::Checkout(opts) => run_checkout(opts),
            Command::Status(opts) => run_status(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Check out every component listed by manifest.
    #[command(override_usage = "compdeps sync [options]")]
    Sync(SyncOptions),

    /// Check out a single component.
    #[command(override_usage = "compdeps checkout [options] <name> <url>")]
    Checkout(CheckoutOptions),

    /// Show where each component listed by manifest is checked out at.
    #[command(override_usage = "compdeps status [options]")]
    Status(StatusOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Path to component manifest.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CheckoutOptions {
    /// Name of component.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// URL of remote to fetch component from.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Branch, tag, or commit to check out.
    #[arg(short, long, value_name = "version")]
    pub version: Option<String>,

    /// Work root to check component out beneath.
    #[arg(short, long, value_name = "path")]
    pub work_root: Option<PathBuf>,

    /// Explicit directory to check component out into.
    #[arg(short, long, value_name = "path")]
    pub directory: Option<PathBuf>,

    /// Override push URL derived from fetch URL.
    #[arg(short, long, value_name = "url")]
    pub push_url: Option<String>,

    /// Initialize a fresh repository even if one exists.
    #[arg(short, long)]
    pub force_init: bool,

    /// External variable for jsonnetfile rendering.
    #[arg(short = 'P', long = "parameter", value_name = "key=value", value_parser = parse_parameter)]
    pub parameters: Vec<(String, String)>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Path to component manifest.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,
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

fn parse_parameter(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {arg:?}"))
}

fn open_store(manifest: Option<PathBuf>) -> Result<ComponentStore> {
    let path = match manifest {
        Some(path) => path,
        None => default_manifest_path()?,
    };

    Ok(ComponentStore::open(path)?)
}

async fn run_sync(opts: SyncOptions) -> Result<()> {
    let store = open_store(opts.manifest)?;
    let outcomes = store.sync_all().await?;
    let failed = outcomes
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .count();

    if failed > 0 {
        return Err(anyhow!(
            "{failed} of {} components failed to synchronize",
            outcomes.len()
        ));
    }

    Ok(())
}

fn run_checkout(opts: CheckoutOptions) -> Result<()> {
    let work_root = match (&opts.directory, opts.work_root) {
        (None, None) => Some(default_work_root()?),
        (_, work_root) => work_root,
    };

    let mut component = Component::try_new(ComponentOptions {
        name: opts.name,
        work_root,
        directory: opts.directory,
        repo_url: Some(opts.url),
        version: opts.version,
        force_init: opts.force_init,
    })?;

    if let Some(push_url) = opts.push_url {
        component.set_push_url(push_url)?;
    }

    match component.checkout()? {
        Resolution::Branch { name, target } => info!("on branch {name} at {target}"),
        Resolution::Detached(version) => info!("detached at {version}"),
    }

    let parameters: JsonnetfileParameters = opts.parameters.into_iter().collect();
    component.render_jsonnetfile_json(&JsonnetBinary::default(), &parameters)?;

    Ok(())
}

fn run_status(opts: StatusOptions) -> Result<()> {
    let store = open_store(opts.manifest)?;
    for status in store.status()? {
        let head = match status.head {
            Some(HeadState::Branch { name, target }) => format!("{name} ({target})"),
            Some(HeadState::Detached(target)) => format!("detached ({target})"),
            Some(HeadState::Unborn) => "nothing checked out".to_string(),
            None => "not synchronized".to_string(),
        };
        println!("{}\t{}\t{head}", status.name, status.directory.display());
    }

    Ok(())
}
