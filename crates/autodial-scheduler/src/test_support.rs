//! Test doubles shared across module tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autodial_core::config::SchedulerConfig;
use autodial_core::{
    Batch, CallEntry, CloudSync, DelayTimer, DialError, Dialer, ImportedBatch, KvStore,
    StoreError,
};
use chrono::{DateTime, Utc};

use crate::engine::{DialScheduler, SchedulerParts};
use crate::entries::EntryStore;
use crate::persistence::MemoryKv;
use crate::stats::StatsAggregator;

pub fn batch(id: &str, total: u64) -> Batch {
    Batch {
        id: id.to_string(),
        total_imported: total,
        imported_at: Utc::now(),
    }
}

pub fn imported(id: &str, numbers: &[&str]) -> ImportedBatch {
    ImportedBatch {
        batch: batch(id, numbers.len() as u64),
        entries: numbers.iter().map(|n| CallEntry::new(n, id)).collect(),
    }
}

/// In-memory key-value store whose writes can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyKv {
    map: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl FlakyKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KvStore for FlakyKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Write("disk full".into()));
        }
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Dialer that remembers every number it was asked to call.
#[derive(Clone, Default)]
pub struct RecordingDialer {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingDialer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Make calls to `number` fail from now on.
    pub fn fail_on(&self, number: &str) {
        self.failing.lock().unwrap().insert(number.to_string());
    }
}

impl Dialer for RecordingDialer {
    fn place_call(&self, number: &str) -> Result<(), DialError> {
        self.calls.lock().unwrap().push(number.to_string());
        if self.failing.lock().unwrap().contains(number) {
            return Err(DialError::Unavailable("no line".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct TimerState {
    armed: Option<u64>,
    last_delay: Option<Duration>,
    cancels: usize,
}

/// Timer that never fires on its own; tests fire the armed ticket by hand.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<TimerState>>,
}

impl ManualTimer {
    pub fn armed(&self) -> Option<u64> {
        self.state.lock().unwrap().armed
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.state.lock().unwrap().last_delay
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }
}

impl DelayTimer for ManualTimer {
    fn arm(&mut self, ticket: u64, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        state.armed = Some(ticket);
        state.last_delay = Some(delay);
    }

    fn cancel(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.armed = None;
        state.cancels += 1;
    }
}

/// Cloud sync that keeps the call events it was sent.
#[derive(Clone, Default)]
pub struct RecordingSync {
    events: Arc<Mutex<Vec<CallEntry>>>,
}

impl RecordingSync {
    pub fn events(&self) -> Vec<CallEntry> {
        self.events.lock().unwrap().clone()
    }
}

impl CloudSync for RecordingSync {
    fn sync_batch(&self, _batch: &Batch) {}

    fn sync_call_event(&self, entry: &CallEntry, _at: DateTime<Utc>) {
        self.events.lock().unwrap().push(entry.clone());
    }
}

/// A scheduler wired to recording doubles.
pub struct Harness {
    pub scheduler: DialScheduler,
    pub dialer: RecordingDialer,
    pub timer: ManualTimer,
    pub sync: RecordingSync,
}

pub fn parts(
    numbers: &[&str],
    kv: Box<dyn KvStore>,
    milestone_size: i64,
    dial_interval_ms: i64,
) -> (SchedulerParts, RecordingDialer, RecordingSync) {
    let mut entries = EntryStore::new();
    entries.append(imported("b1", numbers));
    let dialer = RecordingDialer::default();
    let sync = RecordingSync::default();
    let parts = SchedulerParts {
        entries,
        stats: StatsAggregator::load(kv).unwrap(),
        dialer: Arc::new(dialer.clone()),
        sync: Arc::new(sync.clone()),
        entry_file: None,
        config: SchedulerConfig {
            dial_interval_ms,
            milestone_size,
        },
    };
    (parts, dialer, sync)
}

pub fn harness(numbers: &[&str], milestone_size: i64, dial_interval_ms: i64) -> Harness {
    build(numbers, Box::new(MemoryKv::new()), milestone_size, dial_interval_ms)
}

pub fn harness_with_kv(numbers: &[&str], kv: FlakyKv) -> Harness {
    build(numbers, Box::new(kv), 30, 100)
}

fn build(
    numbers: &[&str],
    kv: Box<dyn KvStore>,
    milestone_size: i64,
    dial_interval_ms: i64,
) -> Harness {
    let (parts, dialer, sync) = parts(numbers, kv, milestone_size, dial_interval_ms);
    let timer = ManualTimer::default();
    let scheduler = DialScheduler::new(parts, Box::new(timer.clone())).unwrap();
    Harness {
        scheduler,
        dialer,
        timer,
        sync,
    }
}
