//! Client session controller.
//!
//! Owns the active session and its ordered turn list. State moves along
//! `Uninitialized -> Initializing -> Ready <-> Streaming -> Closed`; all
//! mutation happens in short critical sections that never span an await.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use relaychat_contracts::{
    CloseChatRequest, Frame, FrameDecoder, SendMessageRequest, SessionStatus,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{INCOMPLETE_STREAM_MESSAGE, MessageAssembler, Turn, TurnSnapshot};
use crate::config::ClientConfig;
use crate::error::{InitializationError, SendError, TransportError};
use crate::transport::{ChatTransport, RelayTransport};

const SNAPSHOT_CAPACITY: usize = 256;
const SESSION_CLOSED_MESSAGE: &str = "The chat was closed before the response finished.";
const ABANDONED_MESSAGE: &str = "The response was cancelled before it finished.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Streaming,
    Closed,
}

/// Handle to one continuous conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub owning_user: String,
    /// Cleared by `close`; a closed handle is rejected by `send`.
    pub initialized: bool,
}

struct Inner {
    state: SessionState,
    session: Option<Session>,
    turns: Vec<Turn>,
    /// Cancelled when the active session closes.
    closed: CancellationToken,
}

impl Inner {
    fn is_active(&self, session_id: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.session_id == session_id)
    }
}

pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    config: ClientConfig,
    inner: Mutex<Inner>,
    snapshots: broadcast::Sender<TurnSnapshot>,
}

impl ChatClient {
    pub fn new(transport: Arc<dyn ChatTransport>, config: ClientConfig) -> Self {
        let (snapshots, _receiver) = broadcast::channel(SNAPSHOT_CAPACITY);
        Self {
            transport,
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                session: None,
                turns: Vec::new(),
                closed: CancellationToken::new(),
            }),
            snapshots,
        }
    }

    /// Client talking to the relay at `config.relay_url`.
    pub fn connect(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = RelayTransport::new(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    /// Copy of the current turn list, in request order.
    pub fn turns(&self) -> Vec<Turn> {
        self.inner.lock().turns.clone()
    }

    /// Receive a snapshot every time a turn changes.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn initialize(&self, user_id: &str) -> Result<Session, InitializationError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(InitializationError::EmptyUser);
        }

        let previous = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Initializing => return Err(InitializationError::InProgress),
                SessionState::Ready | SessionState::Streaming => {
                    return Err(InitializationError::SessionActive);
                }
                SessionState::Uninitialized | SessionState::Closed => {}
            }
            std::mem::replace(&mut inner.state, SessionState::Initializing)
        };
        let mut guard = InitializingGuard {
            client: self,
            previous,
            armed: true,
        };

        info!(user_id, "Initializing chat session");
        let response = self.transport.initialize(user_id).await.map_err(|err| {
            warn!(user_id, error = %err, "Chat session initialization failed");
            InitializationError::Transport(err)
        })?;

        let session = Session {
            session_id: response.session_id,
            owning_user: user_id.to_string(),
            initialized: true,
        };
        let welcome = Turn::welcome(self.config.welcome_message.clone());
        {
            let mut inner = self.inner.lock();
            inner.state = SessionState::Ready;
            inner.session = Some(session.clone());
            inner.turns = vec![welcome.clone()];
            inner.closed = CancellationToken::new();
        }
        guard.armed = false;

        info!(session_id = %session.session_id, user_id, "Chat session ready");
        self.publish(TurnSnapshot {
            session_id: session.session_id.clone(),
            index: 0,
            turn: welcome,
        });
        Ok(session)
    }

    /// Send `user_text` and drive its streamed answer to completion.
    ///
    /// Transport and stream failures end the turn with `is_error` set; only
    /// precondition failures are returned as `SendError`.
    pub async fn send(&self, session: &Session, user_text: &str) -> Result<Turn, SendError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if !session.initialized {
            return Err(SendError::NotInitialized);
        }

        let (index, turn, closed) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Ready => {}
                SessionState::Streaming => return Err(SendError::TurnInFlight),
                SessionState::Uninitialized | SessionState::Initializing | SessionState::Closed => {
                    return Err(SendError::NotInitialized);
                }
            }
            if !inner.is_active(&session.session_id) {
                return Err(SendError::SessionMismatch);
            }

            let turn = Turn::user(text);
            inner.state = SessionState::Streaming;
            inner.turns.push(turn.clone());
            (inner.turns.len() - 1, turn, inner.closed.clone())
        };

        let mut flight = InFlightTurn {
            client: self,
            session_id: session.session_id.clone(),
            index,
            assembler: MessageAssembler::new(turn),
            settled: false,
        };
        flight.publish();

        let request = SendMessageRequest {
            session_id: session.session_id.clone(),
            message: text.to_string(),
        };
        debug!(session_id = %request.session_id, turn = index, "Opening response stream");

        let opened = tokio::select! {
            _ = closed.cancelled() => return Ok(flight.abandon(SESSION_CLOSED_MESSAGE)),
            opened = self.transport.send_message(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                warn!(session_id = %request.session_id, error = %err, "Failed to open response stream");
                flight.apply(Frame::error(format!(
                    "Could not reach the assistant: {}",
                    err
                )));
                return Ok(flight.finish());
            }
        };

        let mut decoder = FrameDecoder::default();
        while !flight.assembler.is_complete() {
            let next = tokio::select! {
                biased;
                _ = closed.cancelled() => return Ok(flight.abandon(SESSION_CLOSED_MESSAGE)),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for frame in decoder.feed(&chunk) {
                        flight.apply(frame);
                    }
                }
                Some(Err(err)) => {
                    warn!(session_id = %request.session_id, error = %err, "Response stream failed mid-flight");
                    break;
                }
                None => {
                    for frame in decoder.finish() {
                        flight.apply(frame);
                    }
                    break;
                }
            }
        }

        if decoder.malformed_records() > 0 {
            debug!(
                session_id = %request.session_id,
                malformed = decoder.malformed_records(),
                "Skipped malformed records while streaming"
            );
        }
        Ok(flight.finish())
    }

    /// Close the session. Best effort: a failed close notification is logged,
    /// never returned. Closing an already closed handle does nothing.
    pub async fn close(&self, session: &mut Session) {
        if !session.initialized {
            debug!(session_id = %session.session_id, "Session already closed");
            return;
        }
        session.initialized = false;

        let was_active = {
            let mut inner = self.inner.lock();
            if inner.is_active(&session.session_id) {
                inner.session = None;
                inner.turns.clear();
                inner.state = SessionState::Closed;
                inner.closed.cancel();
                true
            } else {
                false
            }
        };
        if !was_active {
            return;
        }

        let request = CloseChatRequest {
            session_id: session.session_id.clone(),
        };
        match self.transport.close_chat(&request).await {
            Ok(()) => info!(session_id = %session.session_id, "Chat session closed"),
            Err(err) => warn!(
                session_id = %session.session_id,
                error = %err,
                "Close notification failed; session discarded locally"
            ),
        }
    }

    /// Ask the assistant endpoint about the session.
    pub async fn status(&self, session: &Session) -> Result<SessionStatus, TransportError> {
        self.transport.session_status(&session.session_id).await
    }

    fn publish(&self, snapshot: TurnSnapshot) {
        // No subscribers is fine.
        let _ = self.snapshots.send(snapshot);
    }
}

/// Restores the pre-initialize state if `initialize` fails or is dropped.
struct InitializingGuard<'a> {
    client: &'a ChatClient,
    previous: SessionState,
    armed: bool,
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.client.inner.lock();
            if inner.state == SessionState::Initializing {
                inner.state = self.previous;
            }
        }
    }
}

/// The turn currently streaming. Settles the turn and returns the session to
/// `Ready` exactly once, including when the `send` future is dropped.
struct InFlightTurn<'a> {
    client: &'a ChatClient,
    session_id: String,
    index: usize,
    assembler: MessageAssembler,
    settled: bool,
}

impl InFlightTurn<'_> {
    fn apply(&mut self, frame: Frame) {
        if self.assembler.apply(frame).changed_turn() {
            self.publish();
        }
    }

    /// Store the current turn in the session and notify subscribers.
    fn publish(&self) {
        let turn = self.assembler.turn().clone();
        {
            let mut inner = self.client.inner.lock();
            if inner.is_active(&self.session_id) {
                if let Some(slot) = inner.turns.get_mut(self.index) {
                    *slot = turn.clone();
                }
            }
        }
        self.client.publish(TurnSnapshot {
            session_id: self.session_id.clone(),
            index: self.index,
            turn,
        });
    }

    fn finish(mut self) -> Turn {
        self.settle(INCOMPLETE_STREAM_MESSAGE)
    }

    fn abandon(mut self, reason: &str) -> Turn {
        info!(session_id = %self.session_id, turn = self.index, "Abandoning in-flight response");
        self.settle(reason)
    }

    fn settle(&mut self, reason: &str) -> Turn {
        if self.assembler.finish_stream(reason).changed_turn() {
            self.publish();
        }
        self.settled = true;

        let mut inner = self.client.inner.lock();
        if inner.is_active(&self.session_id) && inner.state == SessionState::Streaming {
            inner.state = SessionState::Ready;
        }
        self.assembler.turn().clone()
    }
}

impl Drop for InFlightTurn<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(ABANDONED_MESSAGE);
        }
    }
}
