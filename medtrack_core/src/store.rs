//! Persisted tracker: applies each mutation in memory and on disk.
//!
//! Layout of the data directory:
//! - `state.json`: medications and the undo slot
//! - `wal/dose_events.wal`: dose-log journal
//! - `dose_events.csv`: compacted dose event table
//! - `medtrack.lock`: held exclusively for the duration of every mutation
//!
//! Several processes may share a data directory. Each mutation takes the
//! lock, reloads state and history from disk, applies the change and writes
//! it through before releasing.

use crate::catalog::{MedicationCatalog, MedicationDraft};
use crate::state::TrackerState;
use crate::tracker::Tracker;
use crate::types::{DoseEvent, DoseKey, DoseStatus, DoseTime, LastAction, Medication};
use crate::wal::{DoseJournal, DoseLogEntry, DoseOp, JsonlJournal};
use crate::Result;
use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File locations inside a data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub wal_dir: PathBuf,
    pub state_path: PathBuf,
    pub wal_path: PathBuf,
    pub csv_path: PathBuf,
    pub lock_path: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let wal_dir = data_dir.join("wal");
        Self {
            state_path: data_dir.join("state.json"),
            wal_path: wal_dir.join("dose_events.wal"),
            csv_path: data_dir.join("dose_events.csv"),
            lock_path: data_dir.join("medtrack.lock"),
            wal_dir,
            data_dir,
        }
    }
}

/// Exclusive hold on a data directory; released on drop
struct DirLock(File);

impl DirLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self(file))
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

pub struct Store {
    paths: DataPaths,
    tracker: Tracker,
    journal: JsonlJournal,
}

impl Store {
    /// Load the catalog snapshot and event history from `paths`
    pub fn open(paths: DataPaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.wal_dir)?;
        let mut store = Self {
            journal: JsonlJournal::new(&paths.wal_path),
            paths,
            tracker: Tracker::new(),
        };
        {
            let _lock = DirLock::acquire(&store.paths.lock_path)?;
            store.reload()?;
        }

        tracing::info!(
            "Opened data directory {:?} ({} medications)",
            store.paths.data_dir,
            store.tracker.medications().len()
        );
        Ok(store)
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Read access for derived views
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Mutable access for subscribing observers
    pub fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    /// Re-read state and history written by any process. Caller holds the lock.
    fn reload(&mut self) -> Result<()> {
        let state = TrackerState::load(&self.paths.state_path)?;
        let log = crate::history::load_dose_log(&self.paths.csv_path, &self.paths.wal_path)?;
        self.tracker.replace_parts(
            MedicationCatalog::from_medications(state.medications),
            log,
            state.last_action,
        );
        Ok(())
    }

    /// Take the directory lock and bring the tracker up to date with disk
    fn begin(&mut self) -> Result<DirLock> {
        let lock = DirLock::acquire(&self.paths.lock_path)?;
        self.reload()?;
        Ok(lock)
    }

    fn save_state(&self) -> Result<()> {
        TrackerState {
            medications: self.tracker.medications(),
            last_action: self.tracker.last_action(),
        }
        .save(&self.paths.state_path)
    }

    fn journal(&mut self, op: DoseOp) -> Result<()> {
        self.journal.append(&DoseLogEntry::now(op))
    }

    pub fn add_medication(&mut self, draft: &MedicationDraft) -> Result<Medication> {
        let _lock = self.begin()?;
        let medication = self.tracker.add_medication(draft)?;
        self.save_state()?;
        Ok(medication)
    }

    pub fn update_medication(&mut self, id: Uuid, draft: &MedicationDraft) -> Result<Medication> {
        let _lock = self.begin()?;
        let medication = self.tracker.update_medication(id, draft)?;
        self.save_state()?;
        Ok(medication)
    }

    /// Delete a medication and its events.
    ///
    /// The catalog is saved before the purge is journaled; events left
    /// behind by a crash in between are dropped as orphans on next open.
    pub fn delete_medication(&mut self, id: Uuid) -> Result<Medication> {
        let _lock = self.begin()?;
        let medication = self.tracker.delete_medication(id)?;
        self.save_state()?;
        self.journal(DoseOp::Purge { medication_id: id })?;
        Ok(medication)
    }

    pub fn mark_dose(
        &mut self,
        medication_id: Uuid,
        date: NaiveDate,
        time: DoseTime,
        taken: bool,
    ) -> Result<DoseStatus> {
        let _lock = self.begin()?;
        let previous = self.tracker.mark_dose(medication_id, date, time, taken)?;
        self.journal(DoseOp::Record {
            event: DoseEvent {
                medication_id,
                date,
                scheduled_time: time,
                taken,
            },
        })?;
        self.save_state()?;
        Ok(previous)
    }

    pub fn undo(&mut self) -> Result<Option<LastAction>> {
        let _lock = self.begin()?;
        let Some(action) = self.tracker.undo() else {
            return Ok(None);
        };
        self.journal(restore_op(action.key, action.previous))?;
        self.save_state()?;
        Ok(Some(action))
    }

    /// Fold the journal into the CSV table
    pub fn compact(&mut self) -> Result<usize> {
        let _lock = DirLock::acquire(&self.paths.lock_path)?;
        crate::csv_rollup::compact_journal(&self.paths.wal_path, &self.paths.csv_path)
    }
}

fn restore_op(key: DoseKey, status: DoseStatus) -> DoseOp {
    match status.taken() {
        Some(taken) => DoseOp::Record {
            event: DoseEvent {
                medication_id: key.medication_id,
                date: key.date,
                scheduled_time: key.time,
                taken,
            },
        },
        None => DoseOp::Unmark { key },
    }
}

/// Open the store rooted at `data_dir`
pub fn open_data_dir(data_dir: &Path) -> Result<Store> {
    Store::open(DataPaths::new(data_dir))
}
