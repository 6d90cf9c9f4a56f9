//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! GitHub tokens come from the GITHUB_TOKENS env var or tokens_file, never
//! from the TOML itself.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubSection,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// GitHub client settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub base_url: String,
    pub page_size: u32,
    pub max_sample_pages: u32,
    pub rate_limit_floor_pct: u8,
    pub max_concurrent_requests: usize,
    pub timeout_secs: u64,
    /// File with one token per line (alternative to GITHUB_TOKENS)
    pub tokens_file: Option<PathBuf>,
    #[serde(skip)]
    pub tokens: Vec<Secret<String>>,
}

impl Default for GitHubSection {
    fn default() -> Self {
        let client = github::Config::default();
        Self {
            base_url: client.base_url,
            page_size: client.page_size,
            max_sample_pages: client.max_sample_pages,
            rate_limit_floor_pct: client.rate_limit_floor_pct,
            max_concurrent_requests: client.max_concurrent_requests,
            timeout_secs: 30,
            tokens_file: None,
            tokens: Vec::new(),
        }
    }
}

impl GitHubSection {
    /// Client tunables for the `github` crate.
    pub fn client_config(&self) -> github::Config {
        github::Config {
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            max_sample_pages: self.max_sample_pages,
            rate_limit_floor_pct: self.rate_limit_floor_pct,
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Raw token strings, in configured order.
    pub fn token_keys(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.expose().clone()).collect()
    }
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Token resolution order:
    /// 1. GITHUB_TOKENS env var (comma-separated)
    /// 2. tokens_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| common::Error::read(path, e))?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(tokens) = std::env::var("GITHUB_TOKENS") {
            config.github.tokens = split_tokens(tokens.split(','));
        } else if let Some(ref tokens_file) = config.github.tokens_file {
            let contents = std::fs::read_to_string(tokens_file)
                .map_err(|e| common::Error::read(tokens_file, e))?;
            config.github.tokens = split_tokens(contents.lines());
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let github = &self.github;

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if !github.base_url.starts_with("http://") && !github.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                github.base_url
            )));
        }

        if !(1..=100).contains(&github.page_size) {
            return Err(common::Error::Config(format!(
                "page_size must be between 1 and 100, got: {}",
                github.page_size
            )));
        }

        if github.max_sample_pages == 0 {
            return Err(common::Error::Config(
                "max_sample_pages must be greater than 0".into(),
            ));
        }

        if github.rate_limit_floor_pct > 100 {
            return Err(common::Error::Config(format!(
                "rate_limit_floor_pct must be between 0 and 100, got: {}",
                github.rate_limit_floor_pct
            )));
        }

        if github.max_concurrent_requests == 0 {
            return Err(common::Error::Config(
                "max_concurrent_requests must be greater than 0".into(),
            ));
        }

        if github.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("starcharts.toml")
    }
}

fn split_tokens<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<Secret<String>> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| Secret::new(t.to_owned()))
        .collect()
}
