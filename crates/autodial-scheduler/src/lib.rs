//! # Autodial Scheduler
//!
//! Dial session scheduling, call-list storage, outcome stats and the
//! collaborators around them. Built for one operator at one console.
//!
//! ## Design Principles
//! - One owner of session state: every command and timer expiry is
//!   applied in order by a single task
//! - Write-through persistence: stats survive a crash after every call
//! - Side effects behind traits: dialing, delays, sync, storage
//!
//! ## Architecture
//! ```text
//! FileImporter (.txt / .csv)
//!   └── EntryStore ─── EntryFile (entries.json)
//!         └── DialScheduler (state machine)
//!               ├── Dialer           → place_call(number)
//!               ├── TokioTimer       → delay between calls
//!               ├── StatsAggregator  → SqliteKv (stats.db)
//!               ├── CloudSync        → WebhookSync (HTTP POST)
//!               └── EventLog         → SessionEvent broadcast
//!                                         └── AnnotationCollector
//! SessionHandle (async) ──mpsc──▶ session task ──owns──▶ DialScheduler
//! ```

pub mod annotation;
pub mod dispatch;
pub mod engine;
pub mod entries;
pub mod import;
pub mod notify;
pub mod persistence;
pub mod session;
pub mod stats;
pub mod store;
pub mod timer;

#[cfg(test)]
mod test_support;

pub use annotation::{AnnotationCollector, Decision};
pub use dispatch::{NoopSync, WebhookSync, WebhookTarget};
pub use engine::{DialScheduler, SchedulerParts};
pub use entries::EntryStore;
pub use import::FileImporter;
pub use notify::{EventListener, EventLog, LoggedEvent, SessionEvent};
pub use persistence::{MemoryKv, SqliteKv};
pub use session::{SessionHandle, spawn_session};
pub use stats::{BatchStats, CallCounters, StatsAggregator};
pub use store::EntryFile;
pub use timer::TokioTimer;
