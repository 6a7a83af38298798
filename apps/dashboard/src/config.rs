use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cache::TtlPolicy;
use crate::orchestrator::RecommendationPolicy;
use crate::processing::PollConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    File,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "file" => Ok(CacheBackendKind::File),
            "redis" => Ok(CacheBackendKind::Redis),
            other => bail!("CACHE_BACKEND must be one of memory, file, redis (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub request_timeout: Duration,
    pub cache_backend: CacheBackendKind,
    pub cache_dir: PathBuf,
    pub cache_namespace: String,
    pub redis_url: Option<String>,
    pub ttl: TtlPolicy,
    pub poll: PollConfig,
    pub recommendations: RecommendationPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let cache_backend = parse_or(&lookup, "CACHE_BACKEND", CacheBackendKind::File)?;
        let redis_url = lookup("REDIS_URL").filter(|v| !v.trim().is_empty());
        if cache_backend == CacheBackendKind::Redis && redis_url.is_none() {
            bail!("REDIS_URL is required when CACHE_BACKEND=redis");
        }

        let poll = PollConfig {
            interval: Duration::from_millis(parse_or(&lookup, "POLL_INTERVAL_MS", 3000u64)?),
            max_attempts: parse_or(&lookup, "POLL_MAX_ATTEMPTS", 30u32)?,
        };
        if poll.interval.is_zero() || poll.max_attempts == 0 {
            bail!("POLL_INTERVAL_MS and POLL_MAX_ATTEMPTS must be greater than zero");
        }

        Ok(Config {
            api_base_url: require("API_BASE_URL")?,
            api_token: lookup("API_TOKEN").filter(|v| !v.trim().is_empty()),
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?),
            cache_backend,
            cache_dir: lookup("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".dashboard-cache")),
            cache_namespace: lookup("CACHE_NAMESPACE").unwrap_or_else(|| "jobmatch".to_string()),
            redis_url,
            ttl: TtlPolicy {
                short: Duration::from_secs(parse_or(&lookup, "CACHE_SHORT_TTL_SECS", 300u64)?),
                long: Duration::from_secs(parse_or(&lookup, "CACHE_LONG_TTL_SECS", 1800u64)?),
            },
            poll,
            recommendations: RecommendationPolicy {
                suppress_during_upload: parse_or(
                    &lookup,
                    "SUPPRESS_RECOMMENDATIONS_DURING_UPLOAD",
                    true,
                )?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        _ => Ok(default),
    }
}
