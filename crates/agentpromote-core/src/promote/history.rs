//! Promotion history
//!
//! JSON-persisted, append-only log of successful promotions. Each record
//! keeps the promoted bundle and, for forward promotions, a snapshot of
//! the destination's pre-import export, which is what a rollback re-imports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One successful promotion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// Run identifier of the promotion
    pub run_id: Uuid,
    /// Source environment name
    pub from: String,
    /// Destination environment name
    pub to: String,
    /// Bundle that was imported into the destination
    pub archive: PathBuf,
    /// Destination's exported state from just before the import, kept so a
    /// rollback can restore it; `None` for rollback records themselves
    pub snapshot: Option<PathBuf>,
    /// When the promotion finished
    pub timestamp: DateTime<Utc>,
    /// Whether this record is itself a rollback
    pub rollback: bool,
}

/// Persistent promotion history log
#[derive(Debug)]
pub struct PromotionHistory {
    path: PathBuf,
    records: Vec<PromotionRecord>,
}

impl PromotionHistory {
    /// Load the history at `path`, starting empty if the file is absent
    pub fn load_or_new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    /// Append a record and persist the log
    pub fn append(&mut self, record: PromotionRecord) -> io::Result<()> {
        self.records.push(record);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.records)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, content)
    }

    /// All records, oldest first
    pub fn records(&self) -> &[PromotionRecord] {
        &self.records
    }

    /// Newest forward promotion into `destination` that carries a snapshot
    pub fn last_restorable(&self, destination: &str) -> Option<&PromotionRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.to == destination && !r.rollback && r.snapshot.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(to: &str, snapshot: Option<&str>, rollback: bool) -> PromotionRecord {
        PromotionRecord {
            run_id: Uuid::new_v4(),
            from: "devAgent".to_string(),
            to: to.to_string(),
            archive: PathBuf::from("bundle.zip"),
            snapshot: snapshot.map(PathBuf::from),
            timestamp: Utc::now(),
            rollback,
        }
    }

    #[test]
    fn append_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history/history.json");

        let mut history = PromotionHistory::load_or_new(&path).unwrap();
        assert!(history.records().is_empty());
        history.append(record("testAgent", Some("snap.zip"), false)).unwrap();

        let reloaded = PromotionHistory::load_or_new(&path).unwrap();
        assert_eq!(reloaded.records().len(), 1);
        assert_eq!(reloaded.records()[0].to, "testAgent");
    }

    #[test]
    fn last_restorable_skips_rollbacks_and_other_destinations() {
        let dir = TempDir::new().unwrap();
        let mut history =
            PromotionHistory::load_or_new(dir.path().join("history.json")).unwrap();

        history.append(record("prodAgent", Some("first.zip"), false)).unwrap();
        history.append(record("testAgent", Some("other.zip"), false)).unwrap();
        history.append(record("prodAgent", Some("second.zip"), false)).unwrap();
        history.append(record("prodAgent", None, true)).unwrap();

        let found = history.last_restorable("prodAgent").unwrap();
        assert_eq!(found.snapshot.as_deref(), Some(Path::new("second.zip")));
    }

    #[test]
    fn empty_history_has_nothing_restorable() {
        let dir = TempDir::new().unwrap();
        let history =
            PromotionHistory::load_or_new(dir.path().join("history.json")).unwrap();
        assert!(history.last_restorable("prodAgent").is_none());
    }
}
