//! HTTP client for the assistant session endpoint.

use std::time::Duration;

use relaychat_contracts::upstream::{
    CloseChatRequest, ErrorDetail, InitializeChatRequest, InitializeChatResponse,
    SendMessageRequest,
};
use relaychat_contracts::{CloseChatResponse, SessionStatus, UpstreamHealth};
use reqwest::{Client, Response, Url};
use thiserror::Error;
use tracing::debug;

const MAX_ERROR_BODY: usize = 512;
const DISABLE_SYSTEM_PROXY_ENV: &str = "RELAYCHAT_DISABLE_SYSTEM_PROXY";

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("assistant endpoint unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("assistant endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid assistant endpoint reply: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("invalid assistant endpoint URL: {0}")]
    InvalidUrl(String),
}

#[derive(Clone)]
pub struct UpstreamClient {
    http_client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|err| anyhow::anyhow!("Invalid upstream URL {}: {}", base_url, err))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("Upstream URL {} cannot be used as a base", base_url);
        }

        // No client-wide timeout: streamed turns stay open as long as the
        // assistant keeps producing frames. Other calls set `request_timeout`.
        let builder = Client::builder().connect_timeout(connect_timeout);
        let builder = if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() || cfg!(test) {
            builder.no_proxy()
        } else {
            builder
        };
        let http_client = builder.build()?;
        Ok(Self {
            http_client,
            base_url: parsed,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn initialize_chat(
        &self,
        request: &InitializeChatRequest,
    ) -> Result<InitializeChatResponse, UpstreamError> {
        let url = self.endpoint(&["initialize-chat"])?;
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(UpstreamError::Unreachable)?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(UpstreamError::Decode)
    }

    /// Open the streamed reply. The response is returned as-is so the caller
    /// can forward its body without buffering; the status is not checked.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<Response, UpstreamError> {
        let url = self.endpoint(&["send-message"])?;
        debug!(session_id = %request.session_id, "Opening upstream stream");
        self.http_client
            .post(url)
            .header(
                reqwest::header::ACCEPT,
                relaychat_contracts::EVENT_STREAM_CONTENT_TYPE,
            )
            .json(request)
            .send()
            .await
            .map_err(UpstreamError::Unreachable)
    }

    pub async fn close_chat(
        &self,
        request: &CloseChatRequest,
    ) -> Result<CloseChatResponse, UpstreamError> {
        let url = self.endpoint(&["close-chat"])?;
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(UpstreamError::Unreachable)?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(UpstreamError::Decode)
    }

    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus, UpstreamError> {
        let url = self.endpoint(&["session-status", session_id])?;
        let response = self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(UpstreamError::Unreachable)?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(UpstreamError::Decode)
    }

    pub async fn health(&self) -> UpstreamHealth {
        let Ok(url) = self.endpoint(&["health"]) else {
            return UpstreamHealth::Unreachable;
        };
        match self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => UpstreamHealth::Healthy,
            Ok(_) => UpstreamHealth::Unhealthy,
            Err(_) => UpstreamHealth::Unreachable,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(status_error(response).await)
}

/// Turn a non-success reply into an error, preferring the endpoint's
/// `detail` message over the raw body.
pub async fn status_error(response: Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorDetail>(&body) {
        Ok(detail) => detail.message(),
        Err(_) => truncate(body),
    };
    UpstreamError::Status { status, message }
}

fn truncate(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let cut = (0..=MAX_ERROR_BODY)
        .rev()
        .find(|idx| body.is_char_boundary(*idx))
        .unwrap_or(0);
    format!("{}... [truncated]", &body[..cut])
}
