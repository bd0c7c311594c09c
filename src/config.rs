// Runtime configuration.
// Command line flags, with the API token taken from the environment or a .env file.

use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;
use crate::github::GITHUB_API_BASE;

/// Environment variable holding the GitHub API token.
pub const TOKEN_ENV: &str = "GITHUB_API_TOKEN";

/// Caching proxy in front of the GitHub REST API.
#[derive(Parser, Debug, Clone)]
#[command(name = "nfcache", version, about)]
pub struct Config {
    /// Port to listen on (all interfaces).
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Organization whose endpoints are cached.
    #[arg(long, default_value = "Netflix")]
    pub org: String,

    /// Base URL of the origin API.
    #[arg(long, default_value = GITHUB_API_BASE)]
    pub api_url: String,

    /// Seconds between background refreshes.
    #[arg(
        long = "refresh-interval",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,

    /// Deadline in seconds for one refresh, across all pages.
    #[arg(
        long = "fetch-timeout",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub fetch_timeout_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// API token; unauthenticated requests are heavily rate limited.
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

impl Config {
    /// Parse flags after loading `.env` into the process environment.
    /// Returns whether a `.env` file was found.
    pub fn load() -> (Self, bool) {
        let dotenv_loaded = dotenv::dotenv().is_ok();
        (Self::parse(), dotenv_loaded)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_refresh_interval(Duration::from_secs(self.refresh_interval_secs))
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}
