pub mod chat;
pub mod health;

use axum::Router;

/// Client-facing routes.
pub fn router() -> Router {
    Router::new().merge(chat::router()).merge(health::router())
}
