//! Gateway service surface: health checks, the control route, and the
//! catch-all interception fallback.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::cache::AssetCache;
use crate::error::GatewayError;
use crate::interceptor::Interceptor;
use crate::lifecycle;
use crate::middleware;

/// State shared across gateway handlers. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// The per-request interception state machine.
    pub interceptor: Interceptor,
    /// Response cache handle, for readiness checks and activation.
    pub cache: AssetCache,
    /// Name of the active cache generation.
    pub generation: String,
}

/// Build the gateway router.
///
/// Specific `/_gateway/*` routes win; everything else falls through to the
/// interceptor.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/_gateway/health", get(health))
        .route("/_gateway/health/ready", get(readiness))
        .route("/_gateway/control", post(control))
        .fallback(intercept)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the gateway is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies cache storage is reachable before returning OK.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.cache.generations().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Message kinds a page may send to the gateway.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ControlKind {
    /// Activate the current generation now, purging stale ones.
    Activate,
}

/// Body of a control request.
#[derive(Debug, Deserialize)]
struct ControlMessage {
    kind: ControlKind,
}

/// Reply to a successful control request.
#[derive(Debug, Serialize)]
struct ControlReply {
    activated: String,
    removed_generations: Vec<String>,
}

/// Handle an explicit control message from a page.
async fn control(
    State(state): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> Result<Json<ControlReply>, GatewayError> {
    match message.kind {
        ControlKind::Activate => {
            tracing::info!("activation requested via control message");
            let removed = lifecycle::activate(&state.cache, &state.generation).await?;
            Ok(Json(ControlReply {
                activated: state.generation.clone(),
                removed_generations: removed,
            }))
        }
    }
}

/// Catch-all: hand the request to the interception state machine.
async fn intercept(State(state): State<AppState>, request: Request) -> Response {
    state.interceptor.handle(request).await
}
