//! Stats Aggregator: per-batch outcome counts plus lifetime/daily call
//! counters, written through to a [`KvStore`] after every change.
//!
//! Key layout:
//! ```text
//! batch:<id>        → {"total":..,"dialed":..,"customer":..,"useless":..}
//! batch_index       → ["<id>", ...]
//! counters          → {"total_calls":..,"daily_calls":..,"last_update":"YYYY-MM-DD"}
//! dial_interval_ms  → "5000"
//! ```
//! A failed write leaves its key dirty; the next mutation (or `flush`)
//! retries it, so no completed call is lost once storage recovers.

use std::collections::{BTreeMap, BTreeSet};

use autodial_core::{Batch, KvStore, Outcome, StoreError};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

const BATCH_PREFIX: &str = "batch:";
const BATCH_INDEX_KEY: &str = "batch_index";
const COUNTERS_KEY: &str = "counters";
const DIAL_INTERVAL_KEY: &str = "dial_interval_ms";

/// Outcome counts for one batch.
///
/// Invariants: `dialed <= total`, `customer + useless <= dialed`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchStats {
    pub total: u64,
    pub dialed: u64,
    pub customer: u64,
    pub useless: u64,
}

impl BatchStats {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Dialed entries left without a decision.
    pub fn unset(&self) -> u64 {
        self.dialed.saturating_sub(self.customer + self.useless)
    }

    fn apply(&mut self, previous: Option<Outcome>, outcome: Outcome) {
        match previous {
            Some(Outcome::Customer) => self.customer = self.customer.saturating_sub(1),
            Some(Outcome::Useless) => self.useless = self.useless.saturating_sub(1),
            Some(Outcome::Unset) => {}
            None => self.dialed += 1,
        }
        match outcome {
            Outcome::Customer => self.customer += 1,
            Outcome::Useless => self.useless += 1,
            Outcome::Unset => {}
        }
        self.total = self.total.max(self.dialed);
    }
}

/// Lifetime and per-day call counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallCounters {
    pub total_calls: u64,
    pub daily_calls: u64,
    pub last_update: NaiveDate,
}

/// Running stats with write-through persistence.
pub struct StatsAggregator {
    kv: Box<dyn KvStore>,
    batches: BTreeMap<String, BatchStats>,
    counters: CallCounters,
    dial_interval_ms: Option<u64>,
    dirty: BTreeSet<String>,
}

impl StatsAggregator {
    /// Load stats, resetting the daily counter if the last update was not today.
    pub fn load(kv: Box<dyn KvStore>) -> Result<Self, StoreError> {
        Self::load_on(kv, Local::now().date_naive())
    }

    /// Load stats as of `today`.
    pub fn load_on(kv: Box<dyn KvStore>, today: NaiveDate) -> Result<Self, StoreError> {
        let ids: Vec<String> = match kv.get(BATCH_INDEX_KEY)? {
            Some(json) => decode(&json)?,
            None => Vec::new(),
        };
        let mut batches = BTreeMap::new();
        for id in ids {
            if let Some(json) = kv.get(&format!("{BATCH_PREFIX}{id}"))? {
                batches.insert(id, decode::<BatchStats>(&json)?);
            }
        }

        let mut dirty = BTreeSet::new();
        let counters = match kv.get(COUNTERS_KEY)? {
            Some(json) => {
                let mut counters: CallCounters = decode(&json)?;
                if counters.last_update != today {
                    tracing::info!(
                        "📆 New day ({} → {}), daily calls reset from {}",
                        counters.last_update,
                        today,
                        counters.daily_calls
                    );
                    counters.daily_calls = 0;
                    counters.last_update = today;
                    dirty.insert(COUNTERS_KEY.to_string());
                }
                counters
            }
            None => CallCounters {
                total_calls: 0,
                daily_calls: 0,
                last_update: today,
            },
        };

        let dial_interval_ms = match kv.get(DIAL_INTERVAL_KEY)? {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|ms| *ms > 0),
            None => None,
        };

        let mut stats = Self {
            kv,
            batches,
            counters,
            dial_interval_ms,
            dirty,
        };
        if let Err(e) = stats.flush() {
            tracing::warn!("⚠️ Failed to persist daily reset: {e}");
        }
        Ok(stats)
    }

    /// Start tracking a batch. Existing stats for the id are kept.
    pub fn register_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        if !self.batches.contains_key(&batch.id) {
            self.batches
                .insert(batch.id.clone(), BatchStats::new(batch.total_imported));
            self.dirty.insert(batch_key(&batch.id));
            self.dirty.insert(BATCH_INDEX_KEY.to_string());
        }
        self.flush()
    }

    /// Count one completed call.
    ///
    /// `previous` is the outcome the entry held if it was dialed in an
    /// earlier run; it is replaced instead of counted twice.
    pub fn record_call(
        &mut self,
        batch_id: &str,
        previous: Option<Outcome>,
        outcome: Outcome,
    ) -> Result<(), StoreError> {
        if !self.batches.contains_key(batch_id) {
            self.dirty.insert(BATCH_INDEX_KEY.to_string());
        }
        self.batches
            .entry(batch_id.to_string())
            .or_default()
            .apply(previous, outcome);
        self.counters.total_calls += 1;
        self.counters.daily_calls += 1;
        self.dirty.insert(batch_key(batch_id));
        self.dirty.insert(COUNTERS_KEY.to_string());
        self.flush()
    }

    /// Remember the configured dial interval.
    pub fn save_dial_interval_ms(&mut self, ms: u64) -> Result<(), StoreError> {
        self.dial_interval_ms = Some(ms);
        self.dirty.insert(DIAL_INTERVAL_KEY.to_string());
        self.flush()
    }

    /// Write every dirty key. Stops at the first failure; the failed key and
    /// any not yet attempted stay dirty.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let keys: Vec<String> = self.dirty.iter().cloned().collect();
        for key in keys {
            let value = self.encode_key(&key)?;
            self.kv.put(&key, &value)?;
            self.dirty.remove(&key);
            tracing::debug!("💾 Stats key '{}' written", key);
        }
        Ok(())
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn batch(&self, id: &str) -> Option<BatchStats> {
        self.batches.get(id).copied()
    }

    pub fn batches(&self) -> impl Iterator<Item = (&str, &BatchStats)> {
        self.batches.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn counters(&self) -> CallCounters {
        self.counters
    }

    pub fn total_calls(&self) -> u64 {
        self.counters.total_calls
    }

    pub fn daily_calls(&self) -> u64 {
        self.counters.daily_calls
    }

    pub fn dial_interval_ms(&self) -> Option<u64> {
        self.dial_interval_ms
    }

    fn encode_key(&self, key: &str) -> Result<String, StoreError> {
        if let Some(id) = key.strip_prefix(BATCH_PREFIX) {
            return encode(&self.batches.get(id).copied().unwrap_or_default());
        }
        match key {
            BATCH_INDEX_KEY => encode(&self.batches.keys().collect::<Vec<_>>()),
            COUNTERS_KEY => encode(&self.counters),
            DIAL_INTERVAL_KEY => Ok(self.dial_interval_ms.unwrap_or_default().to_string()),
            other => Err(StoreError::Serialize(format!("unknown stats key '{other}'"))),
        }
    }
}

fn batch_key(id: &str) -> String {
    format!("{BATCH_PREFIX}{id}")
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialize(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Serialize(e.to_string()))
}
