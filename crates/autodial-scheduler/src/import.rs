//! Import Normalizer: plain text and CSV call lists.
//!
//! `.txt`: one number per line. `.csv`: first column; rows whose first
//! field has no digit (headers) are skipped. Numbers are trimmed but
//! otherwise kept exactly as written.

use std::path::Path;

use autodial_core::{Batch, CallEntry, EntryImporter, ImportError, ImportedBatch, RawSource};
use chrono::{DateTime, Utc};

/// File-format importer for `.txt` and `.csv` sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImporter;

impl FileImporter {
    pub fn new() -> Self {
        Self
    }

    /// Read a file into a raw source named after it.
    pub fn read(path: &Path) -> Result<RawSource, ImportError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ImportError::Read(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(RawSource { name, contents })
    }

    /// Import with an explicit timestamp for the batch id.
    pub fn import_at(
        &self,
        source: &RawSource,
        at: DateTime<Utc>,
    ) -> Result<ImportedBatch, ImportError> {
        let extension = Path::new(&source.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let numbers = match extension.as_str() {
            "txt" => parse_lines(&source.contents),
            "csv" => parse_csv(&source.contents)?,
            _ => return Err(ImportError::UnsupportedFormat(source.name.clone())),
        };
        if numbers.is_empty() {
            return Err(ImportError::EmptyImport);
        }

        let id = batch_id(at);
        let entries: Vec<CallEntry> = numbers.iter().map(|n| CallEntry::new(n, &id)).collect();
        tracing::info!("📥 Imported {} numbers from '{}'", entries.len(), source.name);
        Ok(ImportedBatch {
            batch: Batch {
                id,
                total_imported: entries.len() as u64,
                imported_at: at,
            },
            entries,
        })
    }
}

impl EntryImporter for FileImporter {
    fn import_entries(&self, source: &RawSource) -> Result<ImportedBatch, ImportError> {
        self.import_at(source, Utc::now())
    }
}

/// `batch-<UTC timestamp to the millisecond>`.
pub fn batch_id(at: DateTime<Utc>) -> String {
    format!("batch-{}", at.format("%Y%m%dT%H%M%S%3fZ"))
}

fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn parse_csv(contents: &str) -> Result<Vec<String>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut numbers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Read(format!("CSV: {e}")))?;
        let Some(first) = record.get(0) else {
            continue;
        };
        if first.is_empty() {
            continue;
        }
        if !first.chars().any(|c| c.is_ascii_digit()) {
            tracing::debug!("Skipping CSV row without a number: '{first}'");
            continue;
        }
        numbers.push(first.to_string());
    }
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source(name: &str, contents: &str) -> RawSource {
        RawSource {
            name: name.into(),
            contents: contents.into(),
        }
    }

    #[test]
    fn test_txt_keeps_order_and_drops_blanks() {
        let imported = FileImporter::new()
            .import_entries(&source("list.txt", "111\n\n  +84 222 \r\n333\n"))
            .unwrap();
        let numbers: Vec<&str> = imported.entries.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["111", "+84 222", "333"]);
        assert_eq!(imported.batch.total_imported, 3);
        assert!(imported.entries.iter().all(|e| e.batch_id == imported.batch.id));
    }

    #[test]
    fn test_csv_first_column_skips_header() {
        let csv = "phone,name\n0901,Alice\n\"0902\",\"Bob, Jr\"\n,empty\n0903\n";
        let imported = FileImporter::new()
            .import_entries(&source("Leads.CSV", csv))
            .unwrap();
        let numbers: Vec<&str> = imported.entries.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["0901", "0902", "0903"]);
    }

    #[test]
    fn test_unsupported_and_empty() {
        let importer = FileImporter::new();
        assert!(matches!(
            importer.import_entries(&source("list.xlsx", "111")),
            Err(ImportError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            importer.import_entries(&source("list.txt", "\n  \n")),
            Err(ImportError::EmptyImport)
        ));
        assert!(matches!(
            importer.import_entries(&source("list.csv", "phone\nname\n")),
            Err(ImportError::EmptyImport)
        ));
    }

    #[test]
    fn test_batch_id_from_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(batch_id(at), "batch-20260301T093005042Z");
        let imported = FileImporter::new().import_at(&source("a.txt", "1"), at).unwrap();
        assert_eq!(imported.batch.id, "batch-20260301T093005042Z");
        assert_eq!(imported.batch.imported_at, at);
    }

    #[test]
    fn test_read_file() {
        let dir = std::env::temp_dir().join("autodial-test-import-read");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("numbers.txt");
        std::fs::write(&path, "555\n").unwrap();
        let raw = FileImporter::read(&path).unwrap();
        assert_eq!(raw.name, "numbers.txt");
        assert!(matches!(
            FileImporter::read(&dir.join("missing.txt")),
            Err(ImportError::Read(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
