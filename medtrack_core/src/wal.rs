//! Write-ahead journal for dose-log mutations.
//!
//! Every mark, undo and cascade delete is appended to a JSONL (JSON Lines)
//! file under an exclusive lock. Replaying the journal over the compacted
//! CSV table reproduces the current event log.

use crate::dose_log::DoseLog;
use crate::types::{DoseEvent, DoseKey};
use crate::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One dose-log mutation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DoseOp {
    /// Upsert a taken/missed outcome
    Record { event: DoseEvent },
    /// Delete the event for a dose, returning it to unmarked
    Unmark { key: DoseKey },
    /// Delete every event of a medication
    Purge { medication_id: Uuid },
}

impl DoseOp {
    pub fn apply(&self, log: &mut DoseLog) {
        match self {
            DoseOp::Record { event } => {
                log.record_dose(event.key(), event.taken);
            }
            DoseOp::Unmark { key } => {
                log.unmark_dose(*key);
            }
            DoseOp::Purge { medication_id } => {
                log.delete_all_for(*medication_id);
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseLogEntry {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub op: DoseOp,
}

impl DoseLogEntry {
    pub fn now(op: DoseOp) -> Self {
        Self {
            recorded_at: Utc::now(),
            op,
        }
    }
}

/// Journal sink trait for persisting dose-log mutations
pub trait DoseJournal {
    fn append(&mut self, entry: &DoseLogEntry) -> Result<()>;
}

/// JSONL-based journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseJournal for JsonlJournal {
    fn append(&mut self, entry: &DoseLogEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended {:?} to journal", entry.op);
        Ok(())
    }
}

/// Read all entries from a journal file, skipping unparseable lines
pub fn read_entries(path: &Path) -> Result<Vec<DoseLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse journal entry at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} entries from journal", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DoseStatus, DoseTime};
    use chrono::NaiveDate;

    fn event(medication_id: Uuid, taken: bool) -> DoseEvent {
        DoseEvent {
            medication_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            scheduled_time: DoseTime::new(7, 0).unwrap(),
            taken,
        }
    }

    #[test]
    fn test_append_and_read_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("wal/dose_events.wal");

        let med = Uuid::new_v4();
        let mut journal = JsonlJournal::new(&wal_path);
        journal
            .append(&DoseLogEntry::now(DoseOp::Record { event: event(med, true) }))
            .unwrap();
        journal
            .append(&DoseLogEntry::now(DoseOp::Unmark { key: event(med, true).key() }))
            .unwrap();
        journal
            .append(&DoseLogEntry::now(DoseOp::Purge { medication_id: med }))
            .unwrap();

        let entries = read_entries(&wal_path).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0].op, DoseOp::Record { .. }));
        assert!(matches!(entries[2].op, DoseOp::Purge { medication_id } if medication_id == med));
    }

    #[test]
    fn test_entry_wire_format() {
        let med = Uuid::nil();
        let entry = DoseLogEntry::now(DoseOp::Record { event: event(med, false) });
        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["op"], "record");
        assert_eq!(value["event"]["scheduled_time"], "07:00");
        assert_eq!(value["event"]["date"], "2024-05-06");
        assert_eq!(value["event"]["taken"], false);
    }

    #[test]
    fn test_apply_replays_in_order() {
        let med = Uuid::new_v4();
        let mut log = DoseLog::new();
        let ops = [
            DoseOp::Record { event: event(med, true) },
            DoseOp::Record { event: event(med, false) },
        ];
        for op in &ops {
            op.apply(&mut log);
        }
        assert_eq!(log.status(&event(med, true).key()), DoseStatus::Missed);

        DoseOp::Unmark { key: event(med, true).key() }.apply(&mut log);
        assert!(log.is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("dose_events.wal");

        let mut journal = JsonlJournal::new(&wal_path);
        journal
            .append(&DoseLogEntry::now(DoseOp::Purge { medication_id: Uuid::new_v4() }))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        writeln!(file, "{{ invalid json }}").unwrap();
        write!(file, r#"{{"recorded_at":"2024-05-06T07:00:00Z","op":"rec"#).unwrap();

        assert_eq!(read_entries(&wal_path).unwrap().len(), 1);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(read_entries(&temp_dir.path().join("nope.wal")).unwrap().is_empty());
    }
}
