//! olc-daemon entry point.
//!
//! Thin wiring: tracing, config, Postgres pool and migrations, cache
//! restore, then the HTTP server. Route handlers live in `routes.rs`; shared
//! state types live in `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use olc_cache::{BoundedCache, OrderSink, OrderStore};
use olc_config::{secrets, ServiceConfig};
use olc_daemon::{ingress::OrderIngress, routes, state};
use olc_db::PgOrderStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = ServiceConfig::load_from_env()?;
    info!(
        cache_size = cfg.cache_size,
        bind_addr = %cfg.bind_addr,
        query_timeout_ms = cfg.query_timeout.as_millis() as u64,
        "service config resolved"
    );

    let db_url = secrets::resolve_database_url(&cfg)?;
    let pool = olc_db::connect(db_url.expose(), cfg.db_max_connections).await?;
    olc_db::migrate(&pool).await?;
    let store = Arc::new(PgOrderStore::new(pool));

    let cache: state::SharedCache = Arc::new(
        BoundedCache::restore(Arc::clone(&store) as Arc<dyn OrderStore>, cfg.cache_size).await,
    );
    let ingress = OrderIngress::new(store as Arc<dyn OrderSink>, Arc::clone(&cache));
    let shared = Arc::new(state::AppState::new(
        Arc::clone(&cache),
        ingress,
        cfg.query_timeout,
    ));

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    info!("olc-daemon listening on http://{}", cfg.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    cache.shutdown().await;
    info!("olc-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
    info!("shutdown signal received");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
