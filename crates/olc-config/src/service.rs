//! Typed service configuration extracted from the merged config JSON.
//!
//! # Contract
//! - Every field has a default; an empty config is a valid config.
//! - Cache capacity never fails startup: a missing, negative or non-numeric
//!   value falls back to [`DEFAULT_CACHE_SIZE`] with a warning.
//! - Environment overrides are resolved together with the YAML layers in
//!   [`ServiceConfig::from_config_with`]; an override wins.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

/// Capacity used when `cache.size` / `OLC_CACHE_SIZE` is absent or invalid.
pub const DEFAULT_CACHE_SIZE: usize = 10;

pub const DEFAULT_DB_URL_ENV: &str = "OLC_DATABASE_URL";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 2_000;

pub const ENV_CACHE_SIZE: &str = "OLC_CACHE_SIZE";
pub const ENV_DAEMON_ADDR: &str = "OLC_DAEMON_ADDR";
/// Comma-separated YAML paths, base first.
pub const ENV_CONFIG_PATHS: &str = "OLC_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Maximum number of orders resident in the cache. 0 disables caching.
    pub cache_size: usize,
    pub bind_addr: SocketAddr,
    /// NAME of the env var holding the database URL (never the URL itself).
    pub db_url_env: String,
    pub db_max_connections: u32,
    /// Upper bound on a single store fetch made on behalf of a cache miss.
    pub query_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8899)),
            db_url_env: DEFAULT_DB_URL_ENV.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
        }
    }
}

impl ServiceConfig {
    /// Typed config from merged YAML alone, no environment overrides.
    pub fn from_config_json(config: &Value) -> Result<Self> {
        Self::from_config_with(config, |_| None)
    }

    /// Typed config from merged YAML with `OLC_CACHE_SIZE` / `OLC_DAEMON_ADDR`
    /// taken from `lookup` (tests must not mutate the process environment).
    ///
    /// An override wins over the YAML value. Cache size that neither source
    /// provides resolves to the default with a warning.
    pub fn from_config_with<F>(config: &Value, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let cache_size = match (lookup(ENV_CACHE_SIZE), config.pointer("/cache/size")) {
            (Some(raw), _) => parse_capacity(Some(&raw)),
            (None, None | Some(Value::Null)) => parse_capacity(None),
            (None, Some(Value::String(s))) => parse_capacity(Some(s)),
            (None, Some(other)) => parse_capacity(Some(&other.to_string())),
        };

        let yaml_addr = match config.pointer("/daemon/bind_addr").and_then(Value::as_str) {
            Some(s) => s
                .trim()
                .parse()
                .with_context(|| format!("daemon.bind_addr is not a socket address: {s}"))?,
            None => d.bind_addr,
        };
        let bind_addr = match lookup(ENV_DAEMON_ADDR) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(var = ENV_DAEMON_ADDR, "ignoring unparseable bind address override");
                yaml_addr
            }),
            None => yaml_addr,
        };

        let db_url_env = config
            .pointer("/db/url_env")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(d.db_url_env);

        let db_max_connections = match config.pointer("/db/max_connections") {
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .context("db.max_connections must be a positive integer")?,
            None => d.db_max_connections,
        };

        let query_timeout = match config.pointer("/query/timeout_ms") {
            Some(v) => Duration::from_millis(
                v.as_u64()
                    .filter(|n| *n > 0)
                    .context("query.timeout_ms must be a positive integer")?,
            ),
            None => d.query_timeout,
        };

        Ok(Self {
            cache_size,
            bind_addr,
            db_url_env,
            db_max_connections,
            query_timeout,
        })
    }

    /// Full startup resolution: YAML layers named by `OLC_CONFIG` (none means
    /// an empty config), then environment overrides.
    ///
    /// Unused keys are reported as warnings; literal secrets abort.
    pub fn load_from_env() -> Result<Self> {
        let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
        let paths: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let config = if paths.is_empty() {
            info!("no {ENV_CONFIG_PATHS} set; using built-in defaults");
            Value::Object(Default::default())
        } else {
            let loaded = crate::load_layered_yaml(&paths)?;
            info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
            let report =
                crate::report_unused_keys(&loaded.config_json, crate::UnusedKeyPolicy::Warn)?;
            for ptr in &report.unused_leaf_pointers {
                warn!(key = %ptr, "unused config key");
            }
            loaded.config_json
        };

        Self::from_config_with(&config, |k| std::env::var(k).ok())
    }
}

/// Resolve a cache capacity from raw text.
///
/// Absent, blank, negative or non-numeric input yields [`DEFAULT_CACHE_SIZE`]
/// and logs a warning. `0` is valid and disables caching.
pub fn parse_capacity(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        warn!(default = DEFAULT_CACHE_SIZE, "cache size not configured; using default");
        return DEFAULT_CACHE_SIZE;
    };
    match raw.trim().parse::<usize>() {
        Ok(n) => n,
        Err(_) => {
            warn!(
                raw = raw,
                default = DEFAULT_CACHE_SIZE,
                "invalid cache size; using default"
            );
            DEFAULT_CACHE_SIZE
        }
    }
}
