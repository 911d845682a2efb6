//! Entry Store: the ordered call list a session walks.
//! Append-only per batch; outcomes are written by the scheduler only.

use autodial_core::{Annotation, Batch, CallEntry, ImportedBatch, Outcome};
use chrono::{DateTime, Utc};

/// In-memory ordered collection of call entries and the batches they came from.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    batches: Vec<Batch>,
    entries: Vec<CallEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(batches: Vec<Batch>, entries: Vec<CallEntry>) -> Self {
        Self { batches, entries }
    }

    /// Append an imported batch. The batch id is made unique within the store
    /// by suffixing `-2`, `-3`, ... Returns the id actually used.
    pub fn append(&mut self, imported: ImportedBatch) -> String {
        let ImportedBatch { mut batch, entries } = imported;
        let base = batch.id.clone();
        let mut n = 1;
        while self.batch(&batch.id).is_some() {
            n += 1;
            batch.id = format!("{base}-{n}");
        }
        let id = batch.id.clone();
        self.entries.extend(entries.into_iter().map(|mut e| {
            e.batch_id = id.clone();
            e
        }));
        tracing::info!("📥 Batch '{}' appended ({} entries)", id, batch.total_imported);
        self.batches.push(batch);
        id
    }

    /// A new store holding only the given batch, in import order.
    pub fn select_batch(&self, batch_id: &str) -> Option<Self> {
        let batch = self.batch(batch_id)?.clone();
        let entries = self
            .entries
            .iter()
            .filter(|e| e.batch_id == batch_id)
            .cloned()
            .collect();
        Some(Self {
            batches: vec![batch],
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CallEntry> {
        self.entries.get(index)
    }

    pub fn number_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.number.as_str())
    }

    pub fn entries(&self) -> &[CallEntry] {
        &self.entries
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == id)
    }

    /// Most recently imported batch.
    pub fn latest_batch(&self) -> Option<&Batch> {
        self.batches.iter().max_by_key(|b| b.imported_at)
    }

    /// Write an annotation onto the entry at `index`.
    ///
    /// Returns the outcome the entry held before if it had already been
    /// dialed in an earlier run, so stats can replace rather than add it.
    pub(crate) fn record(
        &mut self,
        index: usize,
        annotation: Annotation,
        at: DateTime<Utc>,
    ) -> Option<Option<Outcome>> {
        let entry = self.entries.get_mut(index)?;
        let previous = entry.dialed_at.map(|_| entry.outcome);
        entry.outcome = annotation.outcome();
        entry.remark = annotation.into_remark();
        entry.dialed_at = Some(at);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::imported;
    use chrono::Duration;

    #[test]
    fn test_append_keeps_order() {
        let mut store = EntryStore::new();
        store.append(imported("b1", &["111", "222"]));
        store.append(imported("b2", &["333"]));
        assert_eq!(store.len(), 3);
        assert_eq!(store.number_at(2), Some("333"));
        assert_eq!(store.get(2).unwrap().batch_id, "b2");
    }

    #[test]
    fn test_duplicate_batch_id_is_suffixed() {
        let mut store = EntryStore::new();
        assert_eq!(store.append(imported("b1", &["1"])), "b1");
        assert_eq!(store.append(imported("b1", &["2"])), "b1-2");
        assert_eq!(store.append(imported("b1", &["3"])), "b1-3");
        assert_eq!(store.get(1).unwrap().batch_id, "b1-2");
        assert_eq!(store.batches().len(), 3);
    }

    #[test]
    fn test_select_batch_and_latest() {
        let mut store = EntryStore::new();
        let mut older = imported("old", &["1", "2"]);
        older.batch.imported_at = Utc::now() - Duration::hours(1);
        store.append(older);
        store.append(imported("new", &["3"]));

        assert_eq!(store.latest_batch().unwrap().id, "new");
        let only_old = store.select_batch("old").unwrap();
        assert_eq!(only_old.len(), 2);
        assert_eq!(only_old.batches().len(), 1);
        assert!(store.select_batch("missing").is_none());
    }

    #[test]
    fn test_record_writes_outcome_and_remark() {
        let mut store = EntryStore::new();
        store.append(imported("b1", &["111", "222"]));
        let now = Utc::now();
        assert_eq!(
            store.record(0, Annotation::Customer(Some("wants demo".into())), now),
            Some(None)
        );
        store.record(1, Annotation::Useless, now);
        assert_eq!(store.get(0).unwrap().outcome, Outcome::Customer);
        assert_eq!(store.get(0).unwrap().remark.as_deref(), Some("wants demo"));
        assert_eq!(store.get(0).unwrap().dialed_at, Some(now));
        assert_eq!(store.get(1).unwrap().outcome, Outcome::Useless);
        assert!(store.record(5, Annotation::Unset, now).is_none());
    }

    #[test]
    fn test_record_reports_previous_outcome_on_redial() {
        let mut store = EntryStore::new();
        store.append(imported("b1", &["111"]));
        store.record(0, Annotation::Useless, Utc::now());
        let previous = store.record(0, Annotation::Customer(None), Utc::now());
        assert_eq!(previous, Some(Some(Outcome::Useless)));
        assert_eq!(store.get(0).unwrap().outcome, Outcome::Customer);
    }
}
