//! Axum router and all HTTP handlers for olc-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  Tests in `tests/` compose the bare router directly.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use olc_cache::StoreError;
use olc_schemas::{OrderId, OrderView};
use tracing::{info, warn};

use crate::{
    api_types::{CacheStatusResponse, ErrorResponse, HealthResponse, IngestResponse},
    ingress::IngressOutcome,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/cache", get(cache_status))
        .route("/v1/orders", post(ingest_order))
        .route("/v1/orders/:id", get(get_order))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn store_error_response(e: &StoreError) -> Response {
    match e {
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Unavailable(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/cache
// ---------------------------------------------------------------------------

pub(crate) async fn cache_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = st.cache.stats();
    (
        StatusCode::OK,
        Json(CacheStatusResponse {
            state: st.cache.state().as_str().to_string(),
            capacity: st.cache.capacity(),
            len: st.cache.len(),
            next_pos: st.cache.next_pos(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let id: OrderId = match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid order id: {raw}"));
        }
    };

    match st.cache.get_or_fetch(id, st.query_timeout).await {
        Ok(order) => (StatusCode::OK, Json(OrderView::from(order.as_ref()))).into_response(),
        Err(e) => {
            if !e.is_not_found() {
                warn!(order_id = %id, error = %e, "order lookup failed");
            }
            store_error_response(&e)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

/// Ingest one order payload.
///
/// 201 on success, 422 for an undecodable payload (the caller must not
/// resend it), 503 when the store write failed (the caller should resend).
pub(crate) async fn ingest_order(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    match st.ingress.handle_payload(&body).await {
        IngressOutcome::Accepted(order_id) => {
            info!(%order_id, "orders/ingest");
            (StatusCode::CREATED, Json(IngestResponse { order_id })).into_response()
        }
        IngressOutcome::Rejected(reason) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, format!("invalid order payload: {reason}"))
        }
        IngressOutcome::Deferred(reason) => error_response(StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}
