//! # Autodial Core
//!
//! Shared data model, error taxonomy, configuration, and the capability
//! traits (dialer, timer, key-value store, cloud sync, importer) that the
//! scheduler crate drives.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AutodialConfig;
pub use error::{AutodialError, DialError, ImportError, Result, SchedulerError, StoreError};
pub use traits::{CloudSync, DelayTimer, Dialer, EntryImporter, KvStore, RawSource};
pub use types::{
    Annotation, AnnotationTicket, Batch, CallEntry, ImportedBatch, Outcome, Phase, SessionSnapshot,
};
