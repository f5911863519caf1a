//! Decision Journal
//!
//! Append-only audit trail of every cycle's decision. Records are kept
//! in memory for the reporting surface and optionally mirrored to a JSONL
//! sink. Records are totally ordered by cycle start time; the journal never
//! reorders or drops entries.

use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::utils::types::{AppResult, DecisionRecord};

pub struct DecisionJournal {
    records: RwLock<Vec<DecisionRecord>>,
    sink: Option<Mutex<File>>,
}

impl DecisionJournal {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            sink: None,
        }
    }

    /// Journal mirrored to an append-only JSONL file.
    pub fn with_sink(path: &Path) -> AppResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            records: RwLock::new(Vec::new()),
            sink: Some(Mutex::new(file)),
        })
    }

    /// Append one decision record. A sink write failure never loses the
    /// in-memory record or fails the cycle.
    pub fn append(&self, record: DecisionRecord) {
        info!(
            action = %record.action,
            reason = %record.reason,
            regime = ?record.regime,
            "Decision recorded"
        );
        if let Some(sink) = &self.sink {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    let mut file = sink.lock();
                    if let Err(e) = writeln!(file, "{}", line) {
                        warn!(error = %e, "Journal sink write failed");
                    }
                }
                Err(e) => warn!(error = %e, "Journal record serialization failed"),
            }
        }
        self.records.write().push(record);
    }

    pub fn snapshot(&self) -> Vec<DecisionRecord> {
        self.records.read().clone()
    }

    pub fn last(&self) -> Option<DecisionRecord> {
        self.records.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for DecisionJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::DecisionAction;
    use chrono::Utc;

    #[test]
    fn test_append_preserves_order() {
        let journal = DecisionJournal::new();
        for i in 0..5 {
            journal.append(DecisionRecord::hold(Utc::now(), format!("cycle {}", i), None));
        }
        let records = journal.snapshot();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.reason, format!("cycle {}", i));
        }
        for pair in records.windows(2) {
            assert!(pair[0].at <= pair[1].at);
        }
    }

    #[test]
    fn test_last_reflects_latest_append() {
        let journal = DecisionJournal::new();
        assert!(journal.last().is_none());

        journal.append(DecisionRecord::hold(Utc::now(), "first".into(), None));
        journal.append(DecisionRecord::hold(Utc::now(), "second".into(), None));
        let last = journal.last().unwrap();
        assert_eq!(last.reason, "second");
        assert_eq!(last.action, DecisionAction::Hold);
    }

    #[test]
    fn test_sink_writes_jsonl() {
        let dir = std::env::temp_dir().join(format!("journal-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("decisions.jsonl");

        let journal = DecisionJournal::with_sink(&path).unwrap();
        journal.append(DecisionRecord::hold(Utc::now(), "halted".into(), None));
        journal.append(DecisionRecord::hold(Utc::now(), "again".into(), None));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DecisionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.reason, "halted");

        std::fs::remove_dir_all(&dir).ok();
    }
}
