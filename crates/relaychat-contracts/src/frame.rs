//! Frame: one typed unit of a streamed turn.

use serde::{Deserialize, Serialize};

/// Literal prefix that marks a significant record on the wire.
pub const RECORD_PREFIX: &str = "data:";

/// Content type of every streamed turn response.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// One streamed event of a turn.
///
/// A turn is zero or more `Content` frames followed by exactly one
/// terminator: `Metadata { is_final: true }` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Text delta to append to the answer.
    Content { data: String },
    /// Turn metadata. `is_final = true` terminates the turn.
    Metadata {
        #[serde(default)]
        is_final: bool,
    },
    /// Terminal error message.
    Error { data: String },
}

impl Frame {
    pub fn content(data: impl Into<String>) -> Self {
        Self::Content { data: data.into() }
    }

    pub fn final_metadata() -> Self {
        Self::Metadata { is_final: true }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Self::Error { data: data.into() }
    }

    /// Whether no further frames may follow this one within the same turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Metadata { is_final: true } | Self::Error { .. })
    }

    /// Encode as a complete wire record: `data: <json>\n\n`.
    pub fn to_record(&self) -> String {
        let payload = serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to encode frame");
            r#"{"type":"error","data":"frame encoding failed"}"#.to_string()
        });
        format!("{} {}\n\n", RECORD_PREFIX, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_record_matches_wire_shape() {
        let record = Frame::content("It's ").to_record();
        assert_eq!(record, "data: {\"type\":\"content\",\"data\":\"It's \"}\n\n");
    }

    #[test]
    fn metadata_parses_is_final() {
        let frame: Frame = serde_json::from_str(r#"{"type":"metadata","is_final":true}"#).unwrap();
        assert_eq!(frame, Frame::final_metadata());
        assert!(frame.is_terminal());
    }

    #[test]
    fn metadata_without_is_final_is_not_terminal() {
        let frame: Frame = serde_json::from_str(r#"{"type":"metadata"}"#).unwrap();
        assert_eq!(frame, Frame::Metadata { is_final: false });
        assert!(!frame.is_terminal());
    }

    #[test]
    fn error_frame_is_terminal() {
        assert!(Frame::error("boom").is_terminal());
        assert!(!Frame::content("x").is_terminal());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<Frame>(r#"{"type":"ping"}"#);
        assert!(result.is_err());
    }
}
