//! Message assembly for one streamed turn.
//!
//! The assembler is the only place a turn's response fields change. Each
//! applied frame leaves a consistent `Turn` behind that callers publish as
//! an immutable snapshot.

use relaychat_contracts::Frame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Shown when the stream ends before a terminating frame arrived.
pub const INCOMPLETE_STREAM_MESSAGE: &str =
    "The response was interrupted before it finished. Please try again.";

const EMPTY_ERROR_MESSAGE: &str = "The assistant reported an error.";

/// Who authored the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnAuthor {
    User,
    System,
}

/// One user message plus the assistant's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub author: TurnAuthor,
    pub user_text: String,
    pub response_text: String,
    pub is_complete: bool,
    pub is_error: bool,
    pub created_at: i64,
}

impl Turn {
    /// A user turn awaiting its streamed answer.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: TurnAuthor::User,
            user_text: text.into(),
            response_text: String::new(),
            is_complete: false,
            is_error: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// A system-authored greeting, complete from the start.
    pub fn welcome(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: TurnAuthor::System,
            user_text: String::new(),
            response_text: message.into(),
            is_complete: true,
            is_error: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Immutable view of a turn after a change, for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSnapshot {
    pub session_id: String,
    /// Position of the turn in the session's turn list.
    pub index: usize,
    pub turn: Turn,
}

/// What applying a frame did to the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    Appended,
    Completed,
    Failed,
    /// Non-terminal metadata; nothing to apply.
    Ignored,
    /// The turn was already complete.
    Dropped,
}

impl FrameEffect {
    /// Whether the turn changed and a new snapshot is due.
    pub fn changed_turn(self) -> bool {
        matches!(self, Self::Appended | Self::Completed | Self::Failed)
    }
}

#[derive(Debug)]
pub struct MessageAssembler {
    turn: Turn,
    dropped: usize,
}

impl MessageAssembler {
    pub fn new(turn: Turn) -> Self {
        Self { turn, dropped: 0 }
    }

    pub fn apply(&mut self, frame: Frame) -> FrameEffect {
        if self.turn.is_complete {
            self.dropped += 1;
            warn!(
                turn_id = %self.turn.id,
                frame = ?frame,
                "Dropping frame received after the turn completed"
            );
            return FrameEffect::Dropped;
        }

        match frame {
            Frame::Content { data } => {
                self.turn.response_text.push_str(&data);
                FrameEffect::Appended
            }
            Frame::Metadata { is_final: true } => {
                self.turn.is_complete = true;
                debug!(turn_id = %self.turn.id, "Turn completed");
                FrameEffect::Completed
            }
            Frame::Metadata { is_final: false } => FrameEffect::Ignored,
            Frame::Error { data } => {
                self.turn.response_text = if data.trim().is_empty() {
                    EMPTY_ERROR_MESSAGE.to_string()
                } else {
                    data
                };
                self.turn.is_complete = true;
                self.turn.is_error = true;
                warn!(turn_id = %self.turn.id, message = %self.turn.response_text, "Turn failed");
                FrameEffect::Failed
            }
        }
    }

    /// The transport is done. Synthesizes a terminal error if no
    /// terminating frame was seen.
    pub fn finish_stream(&mut self, reason: &str) -> FrameEffect {
        if self.turn.is_complete {
            return FrameEffect::Ignored;
        }
        warn!(turn_id = %self.turn.id, "Stream ended without a terminating frame");
        self.apply(Frame::error(reason))
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn is_complete(&self) -> bool {
        self.turn.is_complete
    }

    /// Frames discarded because they arrived after completion.
    pub fn dropped_frames(&self) -> usize {
        self.dropped
    }

    pub fn into_turn(self) -> Turn {
        self.turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(frames: Vec<Frame>) -> MessageAssembler {
        let mut assembler = MessageAssembler::new(Turn::user("question"));
        for frame in frames {
            assembler.apply(frame);
        }
        assembler
    }

    #[test]
    fn content_deltas_concatenate_in_arrival_order() {
        let assembler = assemble(vec![
            Frame::content("It's "),
            Frame::content("under "),
            Frame::content("review."),
            Frame::final_metadata(),
        ]);
        let turn = assembler.turn();
        assert_eq!(turn.response_text, "It's under review.");
        assert!(turn.is_complete);
        assert!(!turn.is_error);
    }

    #[test]
    fn error_frame_replaces_partial_content() {
        let assembler = assemble(vec![Frame::content("partial"), Frame::error("Upstream down")]);
        let turn = assembler.turn();
        assert_eq!(turn.response_text, "Upstream down");
        assert!(turn.is_complete);
        assert!(turn.is_error);
    }

    #[test]
    fn empty_error_message_gets_fallback_text() {
        let assembler = assemble(vec![Frame::error("  ")]);
        assert_eq!(assembler.turn().response_text, EMPTY_ERROR_MESSAGE);
    }

    #[test]
    fn frames_after_terminator_are_dropped() {
        let mut assembler = assemble(vec![Frame::content("done"), Frame::final_metadata()]);
        assert_eq!(assembler.apply(Frame::content(" extra")), FrameEffect::Dropped);
        assert_eq!(assembler.apply(Frame::error("late")), FrameEffect::Dropped);
        assert_eq!(assembler.turn().response_text, "done");
        assert!(!assembler.turn().is_error);
        assert_eq!(assembler.dropped_frames(), 2);
    }

    #[test]
    fn non_final_metadata_is_ignored() {
        let mut assembler = MessageAssembler::new(Turn::user("q"));
        assert_eq!(
            assembler.apply(Frame::Metadata { is_final: false }),
            FrameEffect::Ignored
        );
        assert!(!assembler.is_complete());
    }

    #[test]
    fn unterminated_stream_synthesizes_error() {
        let mut assembler = assemble(vec![Frame::content("half an ans")]);
        assert_eq!(
            assembler.finish_stream(INCOMPLETE_STREAM_MESSAGE),
            FrameEffect::Failed
        );
        let turn = assembler.into_turn();
        assert!(turn.is_complete);
        assert!(turn.is_error);
        assert_eq!(turn.response_text, INCOMPLETE_STREAM_MESSAGE);
    }

    #[test]
    fn finish_after_terminator_is_a_no_op() {
        let mut assembler = assemble(vec![Frame::final_metadata()]);
        assert_eq!(
            assembler.finish_stream(INCOMPLETE_STREAM_MESSAGE),
            FrameEffect::Ignored
        );
        assert!(!assembler.turn().is_error);
    }

    #[test]
    fn welcome_turn_is_complete_system_turn() {
        let turn = Turn::welcome("hello");
        assert_eq!(turn.author, TurnAuthor::System);
        assert!(turn.is_complete);
        assert_eq!(turn.response_text, "hello");
    }
}
