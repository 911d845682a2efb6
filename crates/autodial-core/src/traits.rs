//! Capabilities the scheduler consumes from its surroundings.
//!
//! The scheduler never places calls, sleeps, or talks to the network itself.
//! Each of those side effects sits behind one of these traits so the core
//! state machine can be driven by tokio in production and by hand in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{DialError, ImportError, StoreError};
use crate::types::{Batch, CallEntry, ImportedBatch};

/// Place-call capability.
///
/// Called once per placed call. A call is instantaneous from the
/// scheduler's point of view: implementations hand the number to the
/// telephony layer and return without waiting for the call to end.
pub trait Dialer: Send + Sync {
    fn place_call(&self, number: &str) -> Result<(), DialError>;
}

/// Cancellable one-shot delay timer.
///
/// When a timer armed with `ticket` expires, the owner must feed the ticket
/// back into the scheduler. Arming again replaces any pending timer.
pub trait DelayTimer: Send {
    fn arm(&mut self, ticket: u64, delay: Duration);
    fn cancel(&mut self);
}

/// Key-value persistence with per-key atomic writes.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + Sync + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

/// Best-effort remote mirror. Fire-and-forget: no result reaches the caller.
pub trait CloudSync: Send + Sync {
    fn sync_batch(&self, batch: &Batch);
    fn sync_call_event(&self, entry: &CallEntry, at: DateTime<Utc>);
}

/// Raw import input: a source name (used to pick the format) and its text.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub name: String,
    pub contents: String,
}

/// Import Normalizer capability.
pub trait EntryImporter {
    fn import_entries(&self, source: &RawSource) -> Result<ImportedBatch, ImportError>;
}
