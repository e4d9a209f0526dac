//! Bodies exchanged between the relay and the assistant session endpoint.

use serde::{Deserialize, Serialize};

/// `POST /initialize-chat` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeChatRequest {
    pub user_id: String,
    pub applications_data: serde_json::Value,
    pub questions_data: serde_json::Value,
}

/// `POST /initialize-chat` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeChatResponse {
    pub session_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// `POST /send-message` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub session_id: String,
    pub message: String,
}

/// Non-streaming `/send-message` reply of older endpoint deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySendMessageResponse {
    pub response: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// `POST /close-chat` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChatRequest {
    pub session_id: String,
}

/// Error body of the endpoint's HTTP framework: `{"detail": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Human readable message, whether `detail` is a string or a
    /// validation error list.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
