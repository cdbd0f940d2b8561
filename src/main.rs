mod agent;
mod cache;
mod config;
mod http;
mod net;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

use agent::{CachingAgent, FetchOutcome, ServeSource, CACHE_NAME};
use cache::{CacheStore, SqliteStore};
use config::Config;
use http::{FetchRequest, RequestMode};
use net::{Fetcher, HttpFetcher};

#[derive(Parser, Debug)]
#[command(name = "checkmate-agent")]
#[command(about = "Offline-asset caching agent for the Checkmate GP web app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/checkmate-agent/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pre-cache the asset manifest into the current generation
  Install,
  /// Delete stale generations and take control
  Activate,
  /// Install, then activate
  Sync,
  /// Resolve one request through the agent's serving policy
  Fetch {
    /// Absolute URL, or a path relative to the configured origin
    target: String,
    /// Request mode, as the application would have issued it
    #[arg(long, value_enum, default_value = "same-origin")]
    mode: ModeArg,
    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Show cached generations and their entries
  Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
  Navigate,
  SameOrigin,
  Cors,
  NoCors,
}

impl From<ModeArg> for RequestMode {
  fn from(mode: ModeArg) -> Self {
    match mode {
      ModeArg::Navigate => RequestMode::Navigate,
      ModeArg::SameOrigin => RequestMode::SameOrigin,
      ModeArg::Cors => RequestMode::Cors,
      ModeArg::NoCors => RequestMode::NoCors,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let origin = config.origin()?;

  let store = match &config.cache.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open_default()?,
  };

  match args.command {
    Command::Install => {
      build_agent(store, origin)?.install().await?;
    }
    Command::Activate => {
      build_agent(store, origin)?.activate().await?;
    }
    Command::Sync => {
      let agent = build_agent(store, origin)?;
      agent.install().await?;
      agent.activate().await?;
    }
    Command::Fetch {
      target,
      mode,
      output,
    } => {
      run_fetch(store, origin, &target, mode, output.as_deref()).await?;
    }
    Command::Status => {
      run_status(&store)?;
    }
  }

  Ok(())
}

fn build_agent(store: SqliteStore, origin: Url) -> Result<CachingAgent<SqliteStore, HttpFetcher>> {
  Ok(CachingAgent::new(store, HttpFetcher::new()?, origin))
}

/// Resolve one request through the agent.
///
/// Activation is local-only, so this works fully offline against a cache
/// primed by an earlier `install`. Bypassed requests (cross-origin) go
/// straight to the network.
async fn run_fetch(
  store: SqliteStore,
  origin: Url,
  target: &str,
  mode: ModeArg,
  output: Option<&Path>,
) -> Result<()> {
  let fetcher = HttpFetcher::new()?;
  let agent = CachingAgent::new(store, fetcher.clone(), origin.clone());
  agent.activate().await?;

  let url = resolve_target(&origin, target)?;
  let request = match mode {
    ModeArg::Navigate => FetchRequest::navigation(url),
    other => {
      let mut request = FetchRequest::get(url);
      request.mode = other.into();
      request
    }
  };

  let (response, via) = match agent.handle_fetch(&request).await? {
    FetchOutcome::Served(served) => {
      let via = match served.source {
        ServeSource::Network => "network",
        ServeSource::Cache => "cache",
      };
      (served.response, via)
    }
    FetchOutcome::Bypass => (fetcher.fetch(&request).await?, "passthrough"),
  };

  eprintln!(
    "HTTP {} {} via {} ({} bytes)",
    response.status,
    response.header("content-type").unwrap_or("-"),
    via,
    response.body.len()
  );

  match output {
    Some(path) => std::fs::write(path, &response.body)
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
    None => std::io::stdout().write_all(&response.body)?,
  }

  Ok(())
}

fn resolve_target(origin: &Url, target: &str) -> Result<Url> {
  if let Ok(url) = Url::parse(target) {
    return Ok(url);
  }
  origin
    .join(target)
    .map_err(|e| eyre!("Invalid fetch target {}: {}", target, e))
}

fn run_status(store: &SqliteStore) -> Result<()> {
  let generations = store.generation_names()?;
  if generations.is_empty() {
    println!("No cache generations.");
    return Ok(());
  }

  for name in generations {
    let marker = if name == CACHE_NAME { "current" } else { "stale" };
    println!("{} ({})", name, marker);

    for key in store.entry_keys(&name)? {
      if let Some(entry) = store.lookup(&name, &key)? {
        println!(
          "  {}  {}  {} bytes  sha256:{}  cached {}",
          key,
          entry.response.status,
          entry.response.body.len(),
          &entry.response.body_digest()[..12],
          entry.cached_at.format("%Y-%m-%d %H:%M:%S")
        );
      }
    }
  }

  Ok(())
}
