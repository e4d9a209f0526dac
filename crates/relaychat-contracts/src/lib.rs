//! RelayChat Contracts - the streamed turn wire protocol and HTTP payloads.
//!
//! This crate is shared by the client and the relay:
//! - `Frame`, the typed unit of a streamed turn, and its record encoding
//! - `FrameDecoder`, an incremental decoder that survives arbitrary chunking
//! - Request/response bodies for the relay surface and the assistant endpoint

pub mod decoder;
pub mod error;
pub mod frame;
pub mod messages;
pub mod upstream;

pub use decoder::{DEFAULT_MAX_RECORD_BYTES, FrameDecoder};
pub use error::ProtocolError;
pub use frame::{EVENT_STREAM_CONTENT_TYPE, Frame, RECORD_PREFIX};
pub use messages::{
    CloseChatRequest, CloseChatResponse, HealthResponse, InitializeResponse, SendMessageRequest,
    SessionStatus, UpstreamHealth,
};
