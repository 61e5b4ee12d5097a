//! Command handler modules for olc-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod cache;
pub mod order;

use anyhow::Result;
use olc_config::{secrets, ServiceConfig};
use olc_db::PgPool;

/// Resolve config the same way the daemon does and open a small pool.
pub async fn connect() -> Result<(ServiceConfig, PgPool)> {
    let cfg = ServiceConfig::load_from_env()?;
    let url = secrets::resolve_database_url(&cfg)?;
    let pool = olc_db::connect(url.expose(), 2).await?;
    Ok((cfg, pool))
}
