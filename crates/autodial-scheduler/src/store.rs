//! File-based entry store: call lists and their outcomes survive restarts.
//! Saved as one JSON file: human-readable, easy to back up.
//! Only written on import and after each annotation.

use std::path::{Path, PathBuf};

use autodial_core::{AutodialConfig, Batch, CallEntry, StoreError};
use serde::{Deserialize, Serialize};

use crate::entries::EntryStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct EntryFileContents {
    #[serde(default)]
    batches: Vec<Batch>,
    #[serde(default)]
    entries: Vec<CallEntry>,
}

/// JSON file holding every imported batch.
#[derive(Debug, Clone)]
pub struct EntryFile {
    path: PathBuf,
}

impl EntryFile {
    /// Create an entry file handle inside the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.join("entries.json"),
        }
    }

    /// Default store directory (~/.autodial).
    pub fn default_path() -> PathBuf {
        AutodialConfig::home_dir()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every batch. A missing file is an empty store.
    pub fn load(&self) -> Result<EntryStore, StoreError> {
        if !self.path.exists() {
            return Ok(EntryStore::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Read(format!("{}: {e}", self.path.display())))?;
        let contents: EntryFileContents = serde_json::from_str(&json)
            .map_err(|e| StoreError::Serialize(format!("{}: {e}", self.path.display())))?;
        Ok(EntryStore::from_parts(contents.batches, contents.entries))
    }

    /// Overwrite the file with the whole store.
    pub fn save(&self, store: &EntryStore) -> Result<(), StoreError> {
        let contents = EntryFileContents {
            batches: store.batches().to_vec(),
            entries: store.entries().to_vec(),
        };
        let json = serde_json::to_string_pretty(&contents)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| StoreError::Write(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write(e.to_string()))?;
        tracing::debug!(
            "💾 Saved {} entries to {}",
            store.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Write back the batches held by a session store, leaving other batches
    /// untouched. Entries are matched by position within their batch.
    pub fn merge(&self, session: &EntryStore) -> Result<(), StoreError> {
        let full = self.load()?;
        let mut batches = full.batches().to_vec();
        let mut entries = full.entries().to_vec();

        for batch in session.batches() {
            let mut updates = session
                .entries()
                .iter()
                .filter(|e| e.batch_id == batch.id);
            if batches.iter().any(|b| b.id == batch.id) {
                for slot in entries.iter_mut().filter(|e| e.batch_id == batch.id) {
                    match updates.next() {
                        Some(updated) => *slot = updated.clone(),
                        None => break,
                    }
                }
            } else {
                batches.push(batch.clone());
                entries.extend(updates.cloned());
            }
        }

        self.save(&EntryStore::from_parts(batches, entries))
    }
}
