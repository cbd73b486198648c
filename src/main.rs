//! padaily - Port Alberni daily dashboard feeds
//!
//! Prints the weather, ferry and gas price feeds as JSON, serving each from
//! the on-disk cache while it is fresh and refreshing it from upstream when not.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padaily::analytics::TracingSink;
use padaily::cache::{CacheStore, FileStore, MemoryStore, TemporalCache};
use padaily::cli::{Cli, RunConfig, Storage};
use padaily::config::Config;
use padaily::dashboard::Dashboard;

/// Logs go to stderr so stdout stays pure JSON
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("padaily=info".parse()?);

    // Use JSON format for log shipping when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn build_store(storage: &Storage) -> Arc<dyn CacheStore> {
    match storage {
        Storage::Memory => Arc::new(MemoryStore::new()),
        Storage::Dir(dir) => Arc::new(FileStore::with_dir(dir.clone())),
        Storage::Default => match FileStore::new() {
            Some(store) => {
                info!(dir = %store.dir().display(), "Using cache directory");
                Arc::new(store)
            }
            None => {
                warn!("No home directory found, caching in memory only");
                Arc::new(MemoryStore::new())
            }
        },
    }
}

async fn run(run: RunConfig, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cache = TemporalCache::new(build_store(&run.storage)).single_flight();
    let dashboard = Dashboard::new(cache, Arc::new(TracingSink), run.location, &config)?;

    let output = match run.command.feed() {
        Some(feed) => dashboard.feed(feed).await?,
        None => dashboard.all().await?,
    };

    let text = if run.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", text);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = Config::from_env();
    let run_config = match RunConfig::from_cli(&cli, &config) {
        Ok(run_config) => run_config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(run_config, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
