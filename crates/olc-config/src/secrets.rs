//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `db.url_env: "OLC_DATABASE_URL"`).
//! - At startup, callers invoke [`resolve_database_url`] once and pass the
//!   result into the store constructor; never scatter `std::env::var` calls.
//! - `Debug` on [`DatabaseUrl`] **redacts** the value.
//! - Error messages reference the env var **NAME**, never the value.

use anyhow::{bail, Result};

use crate::ServiceConfig;

/// A resolved database connection string. **Redacted in `Debug` output.**
#[derive(Clone)]
pub struct DatabaseUrl(String);

impl DatabaseUrl {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DatabaseUrl(<REDACTED>)")
    }
}

/// Resolve the database URL from the env var named by `cfg.db_url_env`.
pub fn resolve_database_url(cfg: &ServiceConfig) -> Result<DatabaseUrl> {
    resolve_database_url_from(cfg, |k| std::env::var(k).ok())
}

/// Same as [`resolve_database_url`] with an injectable lookup.
pub fn resolve_database_url_from<F>(cfg: &ServiceConfig, lookup: F) -> Result<DatabaseUrl>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(&cfg.db_url_env) {
        Some(v) if !v.trim().is_empty() => Ok(DatabaseUrl(v.trim().to_string())),
        _ => bail!(
            "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
            cfg.db_url_env
        ),
    }
}
