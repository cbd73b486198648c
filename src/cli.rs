//! Command-line interface parsing for padaily
//!
//! This module handles parsing of CLI arguments using clap and resolving them,
//! together with environment configuration, into what the binary runs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Config;
use crate::dashboard::Feed;
use crate::sources::{all_locations, get_location_by_slug, Location};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified location slug is not recognized
    #[error("Unknown location: '{0}'. Valid locations: {1}")]
    UnknownLocation(String, String),
}

/// Port Alberni daily dashboard feeds
#[derive(Parser, Debug)]
#[command(name = "padaily")]
#[command(about = "Port Alberni weather, ferry and gas price feeds as JSON")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for cached feed data (defaults to the per-user cache dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Keep the cache in memory only; nothing is written to disk
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    pub memory: bool,

    /// Print single-line JSON
    #[arg(long, global = true)]
    pub compact: bool,

    /// Location to serve (e.g., port_alberni)
    #[arg(long, value_name = "SLUG", global = true)]
    pub location: Option<String>,
}

/// Which feed to print
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Current conditions and 5-day forecast
    Weather,
    /// Today's off-island ferry sailings
    Ferry,
    /// Local gas prices by station
    Gas,
    /// Every feed in one document
    All,
}

impl Command {
    /// The single feed this command prints, or `None` for all of them
    pub fn feed(&self) -> Option<Feed> {
        match self {
            Command::Weather => Some(Feed::Weather),
            Command::Ferry => Some(Feed::Ferry),
            Command::Gas => Some(Feed::GasPrices),
            Command::All => None,
        }
    }
}

/// Where cache entries are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// In-process only
    Memory,
    /// A specific directory
    Dir(PathBuf),
    /// The per-user cache directory
    Default,
}

/// Settings resolved from CLI arguments and environment
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub command: Command,
    pub location: &'static Location,
    pub storage: Storage,
    pub compact: bool,
}

/// Parses a location slug argument
///
/// # Returns
/// * `Ok(&Location)` if the slug is known
/// * `Err(CliError::UnknownLocation)` otherwise
pub fn parse_location_arg(slug: &str) -> Result<&'static Location, CliError> {
    get_location_by_slug(slug).ok_or_else(|| {
        let valid: Vec<&str> = all_locations().iter().map(|l| l.slug).collect();
        CliError::UnknownLocation(slug.to_string(), valid.join(", "))
    })
}

impl RunConfig {
    /// Resolves parsed arguments against `config`; flags win over env
    pub fn from_cli(cli: &Cli, config: &Config) -> Result<Self, CliError> {
        let slug = cli.location.as_deref().unwrap_or(&config.location);
        let location = parse_location_arg(slug)?;

        let storage = if cli.memory {
            Storage::Memory
        } else if let Some(dir) = cli.cache_dir.clone().or_else(|| config.cache_dir.clone()) {
            Storage::Dir(dir)
        } else {
            Storage::Default
        };

        Ok(RunConfig {
            command: cli.command,
            location,
            storage,
            compact: cli.compact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_arg_known() {
        let location = parse_location_arg("port_alberni").unwrap();
        assert_eq!(location.name, "Port Alberni, BC");
    }

    #[test]
    fn test_parse_location_arg_unknown() {
        let err = parse_location_arg("tofino").unwrap_err();
        assert!(err.to_string().contains("Unknown location"));
        assert!(err.to_string().contains("tofino"));
        assert!(err.to_string().contains("port_alberni"));
    }

    #[test]
    fn test_cli_parse_subcommands() {
        assert_eq!(Cli::parse_from(["padaily", "weather"]).command, Command::Weather);
        assert_eq!(Cli::parse_from(["padaily", "ferry"]).command, Command::Ferry);
        assert_eq!(Cli::parse_from(["padaily", "gas"]).command, Command::Gas);
        assert_eq!(Cli::parse_from(["padaily", "all"]).command, Command::All);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["padaily"]).is_err());
    }

    #[test]
    fn test_memory_conflicts_with_cache_dir() {
        let result = Cli::try_parse_from(["padaily", "all", "--memory", "--cache-dir", "/tmp/x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_command_feed_mapping() {
        assert_eq!(Command::Gas.feed(), Some(Feed::GasPrices));
        assert_eq!(Command::All.feed(), None);
    }

    #[test]
    fn test_run_config_defaults() {
        let cli = Cli::parse_from(["padaily", "weather"]);
        let run = RunConfig::from_cli(&cli, &Config::default()).unwrap();
        assert_eq!(run.location.slug, "port_alberni");
        assert_eq!(run.storage, Storage::Default);
        assert!(!run.compact);
    }

    #[test]
    fn test_run_config_memory_flag() {
        let cli = Cli::parse_from(["padaily", "gas", "--memory", "--compact"]);
        let config = Config {
            cache_dir: Some(PathBuf::from("/var/cache/padaily")),
            ..Config::default()
        };
        let run = RunConfig::from_cli(&cli, &config).unwrap();
        assert_eq!(run.storage, Storage::Memory);
        assert!(run.compact);
    }

    #[test]
    fn test_run_config_cache_dir_flag_overrides_env() {
        let cli = Cli::parse_from(["padaily", "ferry", "--cache-dir", "/tmp/pa"]);
        let config = Config {
            cache_dir: Some(PathBuf::from("/var/cache/padaily")),
            ..Config::default()
        };
        let run = RunConfig::from_cli(&cli, &config).unwrap();
        assert_eq!(run.storage, Storage::Dir(PathBuf::from("/tmp/pa")));
    }

    #[test]
    fn test_run_config_env_cache_dir() {
        let cli = Cli::parse_from(["padaily", "ferry"]);
        let config = Config {
            cache_dir: Some(PathBuf::from("/var/cache/padaily")),
            ..Config::default()
        };
        let run = RunConfig::from_cli(&cli, &config).unwrap();
        assert_eq!(run.storage, Storage::Dir(PathBuf::from("/var/cache/padaily")));
    }

    #[test]
    fn test_run_config_unknown_location() {
        let cli = Cli::parse_from(["padaily", "all", "--location", "nanaimo"]);
        assert!(RunConfig::from_cli(&cli, &Config::default()).is_err());
    }
}
