//! Scripted in-memory transport for controller tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use relaychat_contracts::{
    CloseChatRequest, Frame, InitializeResponse, SendMessageRequest, SessionStatus,
};
use tokio::time::{Duration, sleep};

use crate::error::TransportError;
use crate::transport::{ByteStream, ChatTransport};

/// One piece of a scripted response body.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Bytes(Vec<u8>),
    /// Transport failure mid-read.
    Fail(String),
    /// Pause before the next chunk.
    Delay(u64),
}

impl MockChunk {
    pub fn frame(frame: &Frame) -> Self {
        Self::Bytes(frame.to_record().into_bytes())
    }

    pub fn raw(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

/// Scripted reply to one `send_message` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Stream(Vec<MockChunk>),
    /// The relay answered with a non-success status.
    Status(u16),
}

impl MockReply {
    pub fn frames(frames: &[Frame]) -> Self {
        Self::Stream(frames.iter().map(MockChunk::frame).collect())
    }
}

#[derive(Default)]
pub struct MockTransport {
    init_results: Mutex<VecDeque<Result<String, u16>>>,
    replies: Mutex<VecDeque<MockReply>>,
    close_fails: bool,
    init_calls: AtomicUsize,
    send_calls: AtomicUsize,
    close_calls: AtomicUsize,
    sent: Mutex<Vec<SendMessageRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next initialize succeeds with `session_id`.
    pub fn with_session(self, session_id: impl Into<String>) -> Self {
        self.init_results.lock().push_back(Ok(session_id.into()));
        self
    }

    /// Next initialize fails with `status`.
    pub fn with_init_failure(self, status: u16) -> Self {
        self.init_results.lock().push_back(Err(status));
        self
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn sent_requests(&self) -> Vec<SendMessageRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn initialize(&self, _user_id: &str) -> Result<InitializeResponse, TransportError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.init_results.lock().pop_front();
        match next {
            Some(Ok(session_id)) => Ok(InitializeResponse { session_id }),
            Some(Err(status)) => Err(TransportError::Status {
                status,
                message: "initialize failed".to_string(),
            }),
            None => Err(TransportError::Other("no scripted session".to_string())),
        }
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<ByteStream, TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(request.clone());

        let reply = self.replies.lock().pop_front();
        let chunks = match reply {
            Some(MockReply::Stream(chunks)) => chunks,
            Some(MockReply::Status(status)) => {
                return Err(TransportError::Status {
                    status,
                    message: "scripted failure".to_string(),
                });
            }
            None => return Err(TransportError::Other("no scripted reply".to_string())),
        };

        Ok(Box::pin(stream! {
            for chunk in chunks {
                match chunk {
                    MockChunk::Bytes(bytes) => yield Ok(Bytes::from(bytes)),
                    MockChunk::Fail(message) => {
                        yield Err(TransportError::Other(message));
                        return;
                    }
                    MockChunk::Delay(ms) => sleep(Duration::from_millis(ms)).await,
                }
            }
        }))
    }

    async fn close_chat(&self, _request: &CloseChatRequest) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.close_fails {
            return Err(TransportError::Other("relay unreachable".to_string()));
        }
        Ok(())
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, TransportError> {
        Ok(SessionStatus {
            status: "active".to_string(),
            user_id: None,
            created_at: None,
            last_activity: None,
            document_id: None,
            conversation_id: Some(format!("conv-{}", session_id)),
            message: None,
        })
    }
}
