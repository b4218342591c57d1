// ⚙️ Configuration - environment driven

use crate::pipeline::DEFAULT_FETCH_TIMEOUT;
use crate::provider::{FileProvider, HttpJsonProvider, StatsProvider};
use crate::scheduler::DEFAULT_CRON;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSource {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// None when neither STATS_PROVIDER_URL nor STATS_PROVIDER_FILE is set
    pub provider: Option<ProviderSource>,
    pub cron: String,
    pub fetch_timeout: Duration,
    pub scheduler_enabled: bool,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("stats.db"),
            provider: None,
            cron: DEFAULT_CRON.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            scheduler_enabled: true,
            port: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match (var("STATS_PROVIDER_URL"), var("STATS_PROVIDER_FILE")) {
            (Some(_), Some(_)) => {
                bail!("set only one of STATS_PROVIDER_URL and STATS_PROVIDER_FILE")
            }
            (Some(url), None) => Some(ProviderSource::Url(url)),
            (None, Some(path)) => Some(ProviderSource::File(PathBuf::from(path))),
            (None, None) => None,
        };

        let fetch_timeout = match var("STATS_FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("STATS_FETCH_TIMEOUT_SECS is not a number: {}", raw))?;
                if secs == 0 {
                    bail!("STATS_FETCH_TIMEOUT_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => defaults.fetch_timeout,
        };

        let scheduler_enabled = match var("STATS_SCHEDULER_ENABLED") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("STATS_SCHEDULER_ENABLED is not a boolean: {}", raw))?,
            None => defaults.scheduler_enabled,
        };

        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", raw))?,
            None => defaults.port,
        };

        Ok(Config {
            db_path: var("STATS_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            provider,
            cron: var("STATS_CRON").unwrap_or(defaults.cron),
            fetch_timeout,
            scheduler_enabled,
            port,
        })
    }

    /// Instantiate the configured provider
    pub fn build_provider(&self) -> Result<Arc<dyn StatsProvider>> {
        match &self.provider {
            Some(ProviderSource::Url(url)) => {
                let provider = HttpJsonProvider::new(url, self.fetch_timeout)
                    .context("Failed to build statistics HTTP client")?;
                Ok(Arc::new(provider))
            }
            Some(ProviderSource::File(path)) => Ok(Arc::new(FileProvider::new(path))),
            None => bail!("no statistics provider configured (set STATS_PROVIDER_URL or STATS_PROVIDER_FILE)"),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stat_ingest=info,stat_server=info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
