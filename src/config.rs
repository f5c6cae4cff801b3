use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RAPIDAPI_HOST: &str = "idealista2.p.rapidapi.com";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: String,
    pub provider_base_url: String,
    pub country: String,
    pub snapshot_dir: PathBuf,
    pub port: u16,
    pub check_interval: Duration,
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let rapidapi_host =
            env::var("RAPIDAPI_HOST").unwrap_or_else(|_| DEFAULT_RAPIDAPI_HOST.to_string());

        Ok(Self {
            rapidapi_key: env::var("RAPIDAPI_KEY").ok().filter(|k| !k.trim().is_empty()),
            provider_base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| format!("https://{}", rapidapi_host)),
            rapidapi_host,
            country: env::var("SEARCH_COUNTRY").unwrap_or_else(|_| "es".to_string()),
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            port: parse_var("PORT", 5000)?,
            check_interval: nonzero_secs(
                "CHECK_INTERVAL_SECS",
                parse_var("CHECK_INTERVAL_SECS", 3600)?,
            )?,
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 30)?),
            max_retries: parse_var("PROVIDER_MAX_RETRIES", 3)?,
            retry_backoff: Duration::from_millis(parse_var("PROVIDER_RETRY_BACKOFF_MS", 500)?),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

/// Periods feed `tokio::time::interval`, which cannot tick at zero
fn nonzero_secs(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(Duration::from_secs(secs))
}
