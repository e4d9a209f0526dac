//! Streaming relay between chat clients and the assistant session endpoint.
//!
//! Each client request maps onto one upstream request. Streamed replies are
//! piped through unparsed; failures are reported in-band as error frames.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod proxy;
pub mod router;
pub mod server;
pub mod state;
pub mod upstream;

pub use config::RelayConfig;
pub use data::{DirectoryDataSource, DomainData, DomainDataSource, EmptyDataSource};
pub use error::ApiError;
pub use router::build_router;
pub use server::{RelayServer, build_state, shutdown_signal};
pub use state::RelayState;
pub use upstream::{UpstreamClient, UpstreamError};
