use axum::{
    Extension, Json, Router,
    extract::Path,
    response::Response,
    routing::{get, post},
};
use relaychat_contracts::upstream;
use relaychat_contracts::{
    CloseChatRequest, CloseChatResponse, InitializeResponse, SendMessageRequest, SessionStatus,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::proxy;
use crate::state::RelayState;

pub fn router() -> Router {
    Router::new()
        .route("/initialize/{user_id}", post(initialize))
        .route("/send-message", post(send_message))
        .route("/close-chat", post(close_chat))
        .route("/session-status/{session_id}", get(session_status))
}

async fn initialize(
    Extension(state): Extension<RelayState>,
    Path(user_id): Path<String>,
) -> Result<Json<InitializeResponse>, ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user id must not be empty"));
    }

    let data = state.data.load(&user_id).await?;
    let request = upstream::InitializeChatRequest {
        user_id: user_id.clone(),
        applications_data: data.applications,
        questions_data: data.questions,
    };
    let reply = state.upstream.initialize_chat(&request).await?;
    info!(user_id = %user_id, session_id = %reply.session_id, "Chat session initialized");

    Ok(Json(InitializeResponse {
        session_id: reply.session_id,
    }))
}

async fn send_message(
    Extension(state): Extension<RelayState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    if req.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("sessionId must not be empty"));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    debug!(session_id = %req.session_id, "Relaying turn");
    let request = upstream::SendMessageRequest {
        session_id: req.session_id,
        message: req.message,
    };
    Ok(proxy::forward_turn(state.upstream.send_message(&request).await).await)
}

async fn close_chat(
    Extension(state): Extension<RelayState>,
    Json(req): Json<CloseChatRequest>,
) -> Result<Json<CloseChatResponse>, ApiError> {
    let request = upstream::CloseChatRequest {
        session_id: req.session_id,
    };
    let reply = state.upstream.close_chat(&request).await?;
    info!(session_id = %request.session_id, status = %reply.status, "Chat session closed");
    Ok(Json(reply))
}

async fn session_status(
    Extension(state): Extension<RelayState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let status = state.upstream.session_status(&session_id).await?;
    Ok(Json(status))
}
