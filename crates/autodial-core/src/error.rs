//! Error types for autodial.

use thiserror::Error;

use crate::types::Phase;

/// Crate-level error for configuration, IO, and collaborator failures.
#[derive(Debug, Error)]
pub enum AutodialError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type Result<T> = std::result::Result<T, AutodialError>;

/// Errors returned by the dial session scheduler.
///
/// `NoPendingAnnotation`, `StaleAnnotation`, `SessionAlreadyFinished` and
/// `InvalidTransition` are caller errors: the scheduler returns them before
/// touching any session state.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("call list is empty")]
    EmptyList,

    #[error("session already finished; create a new session to dial again")]
    SessionAlreadyFinished,

    #[error("no call is waiting for an annotation")]
    NoPendingAnnotation,

    #[error("annotation does not match the current call")]
    StaleAnnotation,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("cannot {command} while {phase}")]
    InvalidTransition { command: &'static str, phase: Phase },

    #[error(transparent)]
    Dial(#[from] DialError),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("session has shut down")]
    SessionClosed,
}

/// Call placement failure reported by a [`crate::traits::Dialer`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DialError {
    /// No telephony capability is available on this host.
    #[error("dialer unavailable: {0}")]
    Unavailable(String),

    #[error("call failed: {0}")]
    Failed(String),
}

/// Key-value / file persistence failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store open failed: {0}")]
    Open(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),

    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Failure converting a raw source into call-list entries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ImportError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("import produced no entries")]
    EmptyImport,

    #[error("read failed: {0}")]
    Read(String),
}
