//! Chat session: owns the history and the Idle / AwaitingResponse state of one window.
//!
//! The session does no I/O. Callers take the [`PendingQuestion`] returned by
//! [`ChatSession::begin`], run the bridge, and hand the outcome back to
//! [`ChatSession::finish`].

use chrono::NaiveTime;

use crate::bridge::{BridgeError, ProcessResult};
use crate::history::{ChatEntry, EntryStatus, History};
use crate::render::{render_history, RenderStyle};

/// Prefix separating the timestamp from the question text.
pub const QUESTION_SEPARATOR: &str = " >>> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse { entry: usize },
}

/// Ticket for an in-flight question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    /// History index of the entry waiting for its answer.
    pub entry: usize,
    /// Raw user input, as typed.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a reply is still pending")]
    Busy,
    #[error("entry {0} is no longer awaiting a reply")]
    Stale(usize),
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    history: History,
    state: SessionState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            history: History::new(),
            state: SessionState::Idle,
        }
    }

    /// Start a submission.
    ///
    /// Blank input is ignored (`Ok(None)`). Otherwise a pending entry
    /// `"HH:MM >>> input"` is appended and the session waits for its reply.
    pub fn begin(
        &mut self,
        input: &str,
        at: NaiveTime,
    ) -> Result<Option<PendingQuestion>, SessionError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        if let SessionState::AwaitingResponse { .. } = self.state {
            return Err(SessionError::Busy);
        }
        let entry = self.history.push(format_question(at, input));
        self.state = SessionState::AwaitingResponse { entry };
        Ok(Some(PendingQuestion {
            entry,
            input: input.to_string(),
        }))
    }

    /// Store the bridge outcome in the pending entry and return to Idle.
    pub fn finish(
        &mut self,
        pending: &PendingQuestion,
        outcome: Result<ProcessResult, BridgeError>,
    ) -> Result<&ChatEntry, SessionError> {
        if self.state != (SessionState::AwaitingResponse { entry: pending.entry }) {
            return Err(SessionError::Stale(pending.entry));
        }
        let (answer, status) = match outcome {
            Ok(result) => (result.output, EntryStatus::Answered),
            Err(e) => {
                let reason = e.to_string();
                (e.into_partial_output(), EntryStatus::Failed(reason))
            }
        };
        self.state = SessionState::Idle;
        self.history
            .resolve(pending.entry, answer, status)
            .ok_or(SessionError::Stale(pending.entry))
    }

    /// Give up on the pending reply. Returns the cancelled entry index, if any.
    pub fn cancel(&mut self) -> Option<usize> {
        let SessionState::AwaitingResponse { entry } = self.state else {
            return None;
        };
        self.state = SessionState::Idle;
        self.history
            .resolve(entry, String::new(), EntryStatus::Cancelled)
            .map(|_| entry)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, SessionState::AwaitingResponse { .. })
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn render(&self, style: &RenderStyle) -> String {
        render_history(&self.history, style)
    }
}

/// `"HH:MM >>> input"`.
pub fn format_question(at: NaiveTime, input: &str) -> String {
    format!("{}{}{}", at.format("%H:%M"), QUESTION_SEPARATOR, input)
}
