//! HTTP API for Muster.
//!
//! Three plain-text endpoints: a health check, `POST /:group` to
//! register the calling node, and `GET /:group` to fetch the rendered
//! mesh configuration. Authentication and source extraction happen here,
//! before any registry access.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use muster_registry::{GroupId, RegisterOutcome, Registry};
use muster_topology::synthesize;

use crate::auth::{source_address, token_matches};
use crate::render::render_config;

/// Shared state behind every handler.
///
/// The registry owns its own locking, so no outer lock is needed here.
pub struct AppState {
    pub registry: Registry,
    pub token: String,
}

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/:group", post(register))
        .route("/:group", get(fetch_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Register the calling node into a group.
async fn register(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(group): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    if !token_matches(&headers, &state.token) {
        return (StatusCode::UNAUTHORIZED, "Not authenticated");
    }

    let group = GroupId::new(group);
    let node = source_address(&headers, peer);
    match state.registry.register(&group, &node).await {
        RegisterOutcome::Created => {
            info!(group = %group, node = %node, "node registered");
            (StatusCode::CREATED, "Registered")
        }
        RegisterOutcome::AlreadyExists => (StatusCode::CONFLICT, "Exists"),
    }
}

/// Fetch the mesh configuration for the calling node.
async fn fetch_config(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(group): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    if !token_matches(&headers, &state.token) {
        return (StatusCode::UNAUTHORIZED, "Not authenticated".to_string());
    }

    let group = GroupId::new(group);
    let node = source_address(&headers, peer);
    let Some(snapshot) = state.registry.lookup(&group, &node).await else {
        return (
            StatusCode::NOT_FOUND,
            "Not registered or expired".to_string(),
        );
    };

    match synthesize(&snapshot, &node) {
        Ok(plan) => (StatusCode::OK, render_config(&plan)),
        Err(e) => {
            // lookup() confirmed membership, so this is a bug in the
            // registry/synthesizer contract, not bad input.
            error!(group = %group, node = %node, "topology synthesis failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    }
}
