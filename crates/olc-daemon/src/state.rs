//! Shared runtime state for olc-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The cache and the
//! ingress are constructed once in `main.rs` and injected here.

use std::sync::Arc;
use std::time::Duration;

use olc_cache::{BoundedCache, OrderStore};
use serde::{Deserialize, Serialize};

use crate::ingress::OrderIngress;

/// The cache as the daemon holds it: type-erased over the store adapter.
pub type SharedCache = Arc<BoundedCache<dyn OrderStore>>;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache,
    pub ingress: OrderIngress,
    pub build: BuildInfo,
    /// Upper bound on the store fetch behind a cache miss.
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(cache: SharedCache, ingress: OrderIngress, query_timeout: Duration) -> Self {
        Self {
            cache,
            ingress,
            build: BuildInfo {
                service: "olc-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            query_timeout,
        }
    }
}
