//! Error types for the frame protocol

use thiserror::Error;

/// A single record could not be turned into a frame.
///
/// These are never fatal to a stream: the decoder logs and skips the record.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed record payload `{preview}`: {source}")]
    MalformedRecord {
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("record exceeded {limit} bytes without a delimiter")]
    RecordTooLarge { limit: usize },
}
