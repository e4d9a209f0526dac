//! In-process stand-in for the assistant session endpoint.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use parking_lot::Mutex;
use relaychat_contracts::Frame;
use relaychat_relay::{RelayConfig, RelayServer};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const FAILED_DETAIL: &str = "Error processing message: model overloaded";
/// How long the `slow` reply waits between its content and final frames.
pub const SLOW_REPLY_PAUSE: Duration = Duration::from_secs(3);

pub fn disable_system_proxy_for_tests() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        // Safety: set once for the process before any HTTP clients are built.
        unsafe {
            std::env::set_var("RELAYCHAT_DISABLE_SYSTEM_PROXY", "1");
        }
    });
}

#[derive(Clone, Default)]
pub struct Recorded {
    pub initialize: Arc<Mutex<Vec<Value>>>,
    pub messages: Arc<Mutex<Vec<Value>>>,
    pub closes: Arc<Mutex<Vec<Value>>>,
}

pub struct FakeUpstream {
    pub url: String,
    pub recorded: Recorded,
}

/// Replies are chosen by the message text:
/// `acme` streams two content frames, `fail` answers 500 with a `detail`,
/// `cut` drops the connection mid-body, `legacy` answers plain JSON, `slow`
/// holds the final frame back for [`SLOW_REPLY_PAUSE`]. Anything else echoes
/// the message back.
pub async fn spawn_upstream() -> FakeUpstream {
    disable_system_proxy_for_tests();
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/initialize-chat", post(initialize_chat))
        .route("/send-message", post(send_message))
        .route("/close-chat", post(close_chat))
        .route("/session-status/{session_id}", get(session_status))
        .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        url: format!("http://{}", addr),
        recorded,
    }
}

/// Address that refuses connections.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Address that accepts connections and never answers on them.
pub async fn silent_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

pub fn relay_config(upstream_url: &str) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_url: upstream_url.to_string(),
        connect_timeout: Duration::from_secs(2),
        ..RelayConfig::default()
    }
}

/// Serve a relay on an ephemeral port and return its base URL.
pub async fn spawn_relay(config: RelayConfig) -> String {
    let server = RelayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server
            .serve(listener, std::future::pending())
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

async fn initialize_chat(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    let user_id = body["user_id"].as_str().unwrap_or_default().to_string();
    recorded.initialize.lock().push(body);
    if user_id == "404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "User not found" })),
        )
            .into_response();
    }
    Json(json!({
        "session_id": format!("session-{}", user_id),
        "status": "success",
        "message": "Chat session initialized",
        "document_id": format!("doc-{}", user_id),
    }))
    .into_response()
}

async fn send_message(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    recorded.messages.lock().push(body);

    match message.as_str() {
        "fail" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": FAILED_DETAIL })),
        )
            .into_response(),
        "legacy" => Json(json!({
            "response": "You have 3 open applications.",
            "conversation_id": "conv-legacy",
        }))
        .into_response(),
        "cut" => {
            let body = stream! {
                yield Ok::<Bytes, std::io::Error>(Bytes::from(Frame::content("Partial ").to_record()));
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Err(std::io::Error::other("assistant crashed"));
            };
            event_stream(Body::from_stream(body))
        }
        "slow" => {
            let body = stream! {
                yield Ok::<Bytes, Infallible>(Bytes::from(Frame::content("Looking that up").to_record()));
                tokio::time::sleep(SLOW_REPLY_PAUSE).await;
                yield Ok(Bytes::from(Frame::final_metadata().to_record()));
            };
            event_stream(Body::from_stream(body))
        }
        "acme" => {
            let body = stream! {
                yield Ok::<Bytes, Infallible>(Bytes::from(Frame::content("It's ").to_record()));
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Ok(Bytes::from(Frame::content("under review.").to_record()));
                yield Ok(Bytes::from(Frame::final_metadata().to_record()));
            };
            event_stream(Body::from_stream(body))
        }
        other => {
            let body: String = [Frame::content(other), Frame::final_metadata()]
                .iter()
                .map(Frame::to_record)
                .collect();
            event_stream(Body::from(body))
        }
    }
}

async fn close_chat(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    let session_id = body["session_id"].as_str().unwrap_or_default().to_string();
    recorded.closes.lock().push(body);
    if session_id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Session not found" })),
        )
            .into_response();
    }
    Json(json!({ "status": "success", "message": "Chat session closed" })).into_response()
}

async fn session_status(Path(session_id): Path<String>) -> Json<Value> {
    if session_id == "missing" {
        return Json(json!({ "status": "not_found", "message": "Session not found" }));
    }
    Json(json!({
        "status": "active",
        "user_id": 4,
        "created_at": "2026-10-16T09:00:00",
        "last_activity": "2026-10-16T09:05:00",
        "document_id": "doc-4",
        "conversation_id": "conv-4",
    }))
}

fn event_stream(body: Body) -> Response {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}
