//! Call-list data model shared by the scheduler and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored disposition of a dialed entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Unset,
    Customer,
    Useless,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Unset => write!(f, "unset"),
            Outcome::Customer => write!(f, "customer"),
            Outcome::Useless => write!(f, "useless"),
        }
    }
}

/// Operator decision submitted for the call currently awaiting annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// Interested party. The remark is stored verbatim.
    Customer(Option<String>),
    Useless,
    /// Dismissed without a decision; still counts as dialed.
    Unset,
}

impl Annotation {
    pub fn outcome(&self) -> Outcome {
        match self {
            Annotation::Customer(_) => Outcome::Customer,
            Annotation::Useless => Outcome::Useless,
            Annotation::Unset => Outcome::Unset,
        }
    }

    /// Consume into the remark to store on the entry.
    pub fn into_remark(self) -> Option<String> {
        match self {
            Annotation::Customer(remark) => remark,
            _ => None,
        }
    }
}

/// One phone number in a call list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallEntry {
    /// Raw dialable string, kept exactly as imported.
    pub number: String,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub outcome: Outcome,
    /// Import that produced this entry.
    pub batch_id: String,
    /// When the outcome was last recorded. None until first dialed.
    #[serde(default)]
    pub dialed_at: Option<DateTime<Utc>>,
}

impl CallEntry {
    pub fn new(number: &str, batch_id: &str) -> Self {
        Self {
            number: number.to_string(),
            remark: None,
            outcome: Outcome::Unset,
            batch_id: batch_id.to_string(),
            dialed_at: None,
        }
    }
}

/// One import operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: String,
    pub total_imported: u64,
    pub imported_at: DateTime<Utc>,
}

/// Output of an import: a batch id plus its ordered entries.
#[derive(Debug, Clone)]
pub struct ImportedBatch {
    pub batch: Batch,
    pub entries: Vec<CallEntry>,
}

/// Scheduler phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Dialing,
    AwaitingAnnotation,
    Paused,
    AwaitingMilestoneConfirm,
    Completed,
}

impl Phase {
    /// Whether a run is in progress (not idle, not finished).
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Completed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Dialing => write!(f, "dialing"),
            Phase::AwaitingAnnotation => write!(f, "awaiting annotation"),
            Phase::Paused => write!(f, "paused"),
            Phase::AwaitingMilestoneConfirm => write!(f, "awaiting milestone confirmation"),
            Phase::Completed => write!(f, "completed"),
        }
    }
}

/// Identifies the call an annotation is meant for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotationTicket {
    /// Run counter, bumped on every start from idle.
    pub run: u64,
    /// Entry index the call was placed for.
    pub index: usize,
}

/// Read-only view of a session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub cursor: usize,
    pub total_entries: usize,
    pub current_number: Option<String>,
    pub dial_interval_ms: u64,
    pub milestone_size: u64,
    pub total_calls: u64,
    pub daily_calls: u64,
    pub delay_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_outcome_and_remark() {
        let a = Annotation::Customer(Some("call back friday".into()));
        assert_eq!(a.outcome(), Outcome::Customer);
        assert_eq!(a.into_remark().as_deref(), Some("call back friday"));
        assert_eq!(Annotation::Useless.into_remark(), None);
        assert_eq!(Annotation::Unset.outcome(), Outcome::Unset);
    }

    #[test]
    fn test_entry_defaults_when_deserialized() {
        let entry: CallEntry =
            serde_json::from_str(r#"{"number":"0123","batch_id":"b1"}"#).unwrap();
        assert_eq!(entry.outcome, Outcome::Unset);
        assert!(entry.remark.is_none());
        assert!(entry.dialed_at.is_none());
    }

    #[test]
    fn test_phase_activity() {
        assert!(!Phase::Idle.is_active());
        assert!(!Phase::Completed.is_active());
        assert!(Phase::Paused.is_active());
        assert!(Phase::AwaitingMilestoneConfirm.is_active());
    }
}
