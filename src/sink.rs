//! Advisory persistence. The pipeline only sees [`AdvisorySink`]; [`JsonlStore`]
//! keeps one JSON object per line on disk.

use crate::error::SinkError;
use crate::record::AdvisoryRecord;
use crate::vendor::Vendor;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub type StoredId = u64;

const FULLTEXT_OPEN: &str = "<pre><font face=\"Courier\">";
const FULLTEXT_CLOSE: &str = "</font></pre>";

pub trait AdvisorySink {
    /// Stores a record. A title that is already present yields `SinkError::Duplicate`.
    fn insert(&mut self, record: &AdvisoryRecord) -> Result<StoredId, SinkError>;
}

/// One stored advisory, in the shape the publishing side expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAdvisory {
    pub id: StoredId,
    pub title: String,
    pub alias: String,
    pub introtext: String,
    pub fulltext: String,
    pub vendor: Vendor,
    pub category_id: u32,
    pub created: String,
    pub raw_date: String,
}

impl StoredAdvisory {
    fn from_record(id: StoredId, record: &AdvisoryRecord) -> Self {
        Self {
            id,
            title: record.title.clone(),
            alias: record.alias.clone(),
            introtext: record.short_description.clone(),
            fulltext: wrap_fulltext(&record.full_text),
            vendor: record.vendor,
            category_id: record.vendor.category_id(),
            created: record.published_at.clone(),
            raw_date: record.raw_date.clone(),
        }
    }
}

pub fn wrap_fulltext(text: &str) -> String {
    format!("{FULLTEXT_OPEN}{text}{FULLTEXT_CLOSE}")
}

#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored advisories in file order. A missing store is empty.
    pub fn load(&self) -> Result<Vec<StoredAdvisory>, SinkError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SinkError::from))
            .collect()
    }

    pub fn find_by_title(&self, title: &str) -> Result<Option<StoredAdvisory>, SinkError> {
        Ok(self.load()?.into_iter().find(|a| a.title == title))
    }

    pub fn update_introtext(&mut self, id: StoredId, introtext: &str) -> Result<(), SinkError> {
        let mut records = self.load()?;
        let record = records
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(SinkError::UnknownRecord(id))?;
        record.introtext = introtext.to_string();
        self.rewrite(&records)?;
        log::info!("Updated introtext of advisory {}", id);
        Ok(())
    }

    fn rewrite(&self, records: &[StoredAdvisory]) -> Result<(), SinkError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        let mut out = String::new();
        for record in records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        fs::write(&tmp, out)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AdvisorySink for JsonlStore {
    fn insert(&mut self, record: &AdvisoryRecord) -> Result<StoredId, SinkError> {
        let existing = self.load()?;
        if let Some(found) = existing.iter().find(|a| a.title == record.title) {
            return Err(SinkError::Duplicate {
                title: record.title.clone(),
                id: found.id,
            });
        }

        let id = existing.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let stored = StoredAdvisory::from_record(id, record);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&stored)?)?;

        log::info!("Stored advisory {} as id {}", record.title, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> AdvisoryRecord {
        AdvisoryRecord {
            title: title.to_string(),
            short_description: "A flaw was fixed.".to_string(),
            full_text: "Full advisory text\n".to_string(),
            vendor: Vendor::Debian,
            published_at: "2025-11-20 18:14:55".to_string(),
            raw_date: "Thu, 20 Nov 2025 18:14:55 +0000".to_string(),
            alias: "debian-dsa-6059-1-thunderbird-abc".to_string(),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(dir.path().join("nested/advisories.jsonl"));
        assert_eq!(store.insert(&record("Debian: DSA-1-1: a")).unwrap(), 1);
        assert_eq!(store.insert(&record("Debian: DSA-2-1: b")).unwrap(), 2);

        let stored = store.load().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].category_id, 87);
        assert_eq!(
            stored[0].fulltext,
            "<pre><font face=\"Courier\">Full advisory text\n</font></pre>"
        );
        assert_eq!(stored[1].introtext, "A flaw was fixed.");
    }

    #[test]
    fn test_duplicate_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(dir.path().join("advisories.jsonl"));
        store.insert(&record("Debian: DSA-1-1: a")).unwrap();

        match store.insert(&record("Debian: DSA-1-1: a")) {
            Err(SinkError::Duplicate { title, id }) => {
                assert_eq!(title, "Debian: DSA-1-1: a");
                assert_eq!(id, 1);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_update_introtext() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(dir.path().join("advisories.jsonl"));
        store.insert(&record("Debian: DSA-1-1: a")).unwrap();
        store.insert(&record("Debian: DSA-2-1: b")).unwrap();

        store.update_introtext(2, "Rebuilt summary").unwrap();
        let found = store.find_by_title("Debian: DSA-2-1: b").unwrap().unwrap();
        assert_eq!(found.introtext, "Rebuilt summary");
        assert!(matches!(
            store.update_introtext(9, "x"),
            Err(SinkError::UnknownRecord(9))
        ));
    }

    #[test]
    fn test_missing_store_is_empty() {
        let store = JsonlStore::open("/nonexistent/dir/advisories.jsonl");
        assert!(store.load().unwrap().is_empty());
    }
}
