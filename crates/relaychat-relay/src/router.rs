use axum::http::{HeaderValue, Method, header};
use axum::{Extension, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::config::RelayConfig;
use crate::state::RelayState;

pub fn build_router(state: RelayState, config: &RelayConfig) -> Router {
    api::router()
        .layer(cors_layer(&config.cors_origins))
        .layer(Extension(state))
}

/// Browsers only call `GET`/`POST` with JSON bodies and read an event
/// stream back. `*` (or no configured origin) opens the relay to any page.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        warn!("No valid CORS origin configured, allowing any");
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}
