//! Runtime configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder key shipped in sample env files; treated as unset
const DEMO_API_KEY: &str = "demo_key";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOCATION: &str = "port_alberni";

/// Application configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// OpenWeatherMap API key; `None` means the weather feed always falls back
    pub openweather_api_key: Option<String>,
    /// Overrides the default per-user cache directory
    pub cache_dir: Option<PathBuf>,
    /// Per-request timeout for upstream HTTP calls
    pub http_timeout: Duration,
    /// Location slug to serve
    pub location: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            cache_dir: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            location: DEFAULT_LOCATION.to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let openweather_api_key = lookup("OPENWEATHER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != DEMO_API_KEY);

        let cache_dir = lookup("PADAILY_CACHE_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        let http_timeout = lookup("PADAILY_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        let location = lookup("PADAILY_LOCATION")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        Self {
            openweather_api_key,
            cache_dir,
            http_timeout,
            location,
        }
    }
}
