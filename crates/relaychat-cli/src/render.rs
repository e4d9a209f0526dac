//! Turns snapshot updates into terminal output.

use std::io::{self, Write};

use colored::Colorize;
use relaychat_client::TurnSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// A new answer begins.
    Started,
    /// Text not yet printed for the current answer.
    Delta(String),
    /// Ends a partially printed line before an error.
    Break,
    Failed(String),
    Finished,
}

/// Tracks how much of the current turn has been printed so each snapshot
/// only emits the new suffix.
#[derive(Debug, Default)]
pub struct TurnRenderer {
    index: Option<usize>,
    printed: usize,
    finished: bool,
}

impl TurnRenderer {
    pub fn apply(&mut self, snapshot: &TurnSnapshot) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        if self.index != Some(snapshot.index) {
            self.index = Some(snapshot.index);
            self.printed = 0;
            self.finished = false;
            events.push(RenderEvent::Started);
        }
        if self.finished {
            return events;
        }

        let turn = &snapshot.turn;
        if turn.is_error {
            if self.printed > 0 {
                events.push(RenderEvent::Break);
            }
            events.push(RenderEvent::Failed(turn.response_text.clone()));
            self.finished = true;
            return events;
        }

        let text = &turn.response_text;
        if text.len() > self.printed && text.is_char_boundary(self.printed) {
            events.push(RenderEvent::Delta(text[self.printed..].to_string()));
            self.printed = text.len();
        }

        if turn.is_complete {
            events.push(RenderEvent::Finished);
            self.finished = true;
        }
        events
    }
}

pub fn write_events<W: Write>(events: &[RenderEvent], out: &mut W) -> io::Result<()> {
    for event in events {
        match event {
            RenderEvent::Started => write!(out, "{} ", "assistant>".cyan().bold())?,
            RenderEvent::Delta(text) => write!(out, "{}", text)?,
            RenderEvent::Break => writeln!(out)?,
            RenderEvent::Failed(message) => writeln!(out, "{}", message.red())?,
            RenderEvent::Finished => writeln!(out)?,
        }
    }
    out.flush()
}
