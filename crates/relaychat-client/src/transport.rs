//! Network seam between the session controller and the relay.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use relaychat_contracts::{
    CloseChatRequest, InitializeResponse, SendMessageRequest, SessionStatus,
};
use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http_client::build_http_client;

/// Raw body of a streamed turn, one item per network read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Create a session for `user_id` and return its identifier.
    async fn initialize(&self, user_id: &str) -> Result<InitializeResponse, TransportError>;

    /// Open the streamed response for one message.
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ByteStream, TransportError>;

    /// Tell the relay the session is over.
    async fn close_chat(&self, request: &CloseChatRequest) -> Result<(), TransportError>;

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, TransportError>;
}

/// `ChatTransport` over the relay's HTTP surface.
#[derive(Clone)]
pub struct RelayTransport {
    http_client: Client,
    relay_url: Url,
    request_timeout: Duration,
}

impl RelayTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let relay_url = Url::parse(config.relay_url.trim_end_matches('/'))
            .map_err(|err| TransportError::InvalidUrl(format!("{}: {}", config.relay_url, err)))?;
        if relay_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(config.relay_url.clone()));
        }

        Ok(Self {
            http_client: build_http_client(config.connect_timeout)?,
            relay_url,
            request_timeout: config.request_timeout,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.relay_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.relay_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ChatTransport for RelayTransport {
    async fn initialize(&self, user_id: &str) -> Result<InitializeResponse, TransportError> {
        let url = self.url(&["initialize", user_id])?;
        debug!(%url, "Initializing session through relay");
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<ByteStream, TransportError> {
        let url = self.url(&["send-message"])?;
        let response = self
            .http_client
            .post(url)
            .header(reqwest::header::ACCEPT, relaychat_contracts::EVENT_STREAM_CONTENT_TYPE)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from)),
        ))
    }

    async fn close_chat(&self, request: &CloseChatRequest) -> Result<(), TransportError> {
        let url = self.url(&["close-chat"])?;
        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, TransportError> {
        let url = self.url(&["session-status", session_id])?;
        let response = self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // Truncate error body to keep large upstream pages out of user messages.
    const MAX_ERROR_BODY: usize = 512;
    let message = if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|idx| body.is_char_boundary(*idx))
            .unwrap_or(0);
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}
