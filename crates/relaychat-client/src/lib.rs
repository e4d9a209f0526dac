//! RelayChat Client - drives a chat session against the relay.
//!
//! - `ChatClient`: the session controller (initialize / send / close)
//! - `MessageAssembler`: folds a turn's frames into a growing `Turn`
//! - `ChatTransport`: the network seam, with `RelayTransport` over HTTP

pub mod assembler;
pub mod config;
pub mod error;
mod http_client;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod session;
pub mod transport;

pub use assembler::{FrameEffect, MessageAssembler, Turn, TurnAuthor, TurnSnapshot};
pub use config::ClientConfig;
pub use error::{InitializationError, SendError, TransportError};
pub use session::{ChatClient, Session, SessionState};
pub use transport::{ByteStream, ChatTransport, RelayTransport};
