//! Session events: what the scheduler reports to the console and to sync.
//! Lightweight: an in-memory ring buffer plus an optional listener callback.

use std::sync::Arc;

use autodial_core::{AnnotationTicket, DialError, Outcome};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ring buffer capacity.
const HISTORY_LIMIT: usize = 100;

/// Something that happened in a dial session.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { run: u64, cursor: usize },
    CallPlaced { index: usize, number: String, ticket: AnnotationTicket },
    DialFailed { index: usize, number: String, error: String },
    AnnotationRecorded { index: usize, outcome: Outcome },
    MilestoneReached { cursor: usize },
    Paused { cursor: usize },
    Resumed { cursor: usize },
    DelaySkipped { cursor: usize },
    Completed { dialed: usize },
    Stopped { cursor: usize },
    PersistenceFailed { error: String },
    SyncFailed { error: String },
}

impl SessionEvent {
    pub(crate) fn dial_failed(index: usize, number: &str, error: &DialError) -> Self {
        SessionEvent::DialFailed {
            index,
            number: number.to_string(),
            error: error.to_string(),
        }
    }

    /// Failures are shown to the operator but never stop the session.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEvent::DialFailed { .. }
                | SessionEvent::PersistenceFailed { .. }
                | SessionEvent::SyncFailed { .. }
        )
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Started { cursor, .. } => write!(f, "▶️ Session started at #{}", cursor + 1),
            SessionEvent::CallPlaced { index, number, .. } => {
                write!(f, "📞 Calling #{}: {}", index + 1, number)
            }
            SessionEvent::DialFailed { number, error, .. } => {
                write!(f, "⚠️ Call to {number} failed: {error}")
            }
            SessionEvent::AnnotationRecorded { index, outcome } => {
                write!(f, "📝 #{} marked {}", index + 1, outcome)
            }
            SessionEvent::MilestoneReached { cursor } => {
                write!(f, "🏁 {cursor} calls done, confirm to continue (y/n)")
            }
            SessionEvent::Paused { .. } => write!(f, "⏸️ Paused"),
            SessionEvent::Resumed { .. } => write!(f, "▶️ Resumed"),
            SessionEvent::DelaySkipped { .. } => write!(f, "⏭️ Delay skipped"),
            SessionEvent::Completed { dialed } => write!(f, "✅ Done: {dialed} entries dialed"),
            SessionEvent::Stopped { cursor } => write!(f, "⏹️ Stopped at #{}", cursor + 1),
            SessionEvent::PersistenceFailed { error } => write!(f, "⚠️ Save failed: {error}"),
            SessionEvent::SyncFailed { error } => write!(f, "⚠️ Sync failed: {error}"),
        }
    }
}

/// An event with the time it was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub event: SessionEvent,
    pub timestamp: DateTime<Utc>,
}

pub type EventListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Event history plus the listener that forwards events out of the scheduler.
#[derive(Default)]
pub struct EventLog {
    history: Vec<LoggedEvent>,
    listener: Option<EventListener>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&mut self, listener: EventListener) {
        self.listener = Some(listener);
    }

    /// Record an event and hand it to the listener.
    pub fn record(&mut self, event: SessionEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
        self.history.push(LoggedEvent {
            event,
            timestamp: Utc::now(),
        });
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }

    pub fn history(&self) -> &[LoggedEvent] {
        &self.history
    }

    pub fn last(&self) -> Option<&SessionEvent> {
        self.history.last().map(|l| &l.event)
    }
}
