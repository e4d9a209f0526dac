use axum::{Extension, Json, Router, routing::get};
use chrono::Utc;
use relaychat_contracts::{HealthResponse, UpstreamHealth};

use crate::state::RelayState;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// The relay itself is up if this answers; `upstream` says whether the
/// assistant endpoint is.
async fn health(Extension(state): Extension<RelayState>) -> Json<HealthResponse> {
    let upstream = state.upstream.health().await;
    let status = match upstream {
        UpstreamHealth::Healthy => "healthy",
        UpstreamHealth::Unhealthy | UpstreamHealth::Unreachable => "degraded",
    };
    Json(HealthResponse {
        status: status.to_string(),
        upstream,
        timestamp: Utc::now().to_rfc3339(),
    })
}
