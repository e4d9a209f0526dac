//! Error types for the chat client

use thiserror::Error;

/// Failure talking to the relay.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Other(String),
}

/// The session could not be created. No partial session is retained.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("user identifier must not be empty")]
    EmptyUser,

    #[error("a session is already being initialized")]
    InProgress,

    #[error("a session is already active; close it first")]
    SessionActive,

    #[error("failed to initialize chat session: {0}")]
    Transport(#[from] TransportError),
}

/// A message was rejected before any network call was made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("session is not initialized")]
    NotInitialized,

    #[error("session is not the active session of this client")]
    SessionMismatch,

    #[error("a response is still streaming for this session")]
    TurnInFlight,
}
