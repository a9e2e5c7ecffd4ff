//! Medication catalog snapshot persistence with file locking.
//!
//! The snapshot holds every medication plus the undo slot, so an undo can be
//! issued by a later process than the one that marked the dose.

use crate::types::{LastAction, Medication};
use crate::{Error, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persisted catalog and undo slot
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TrackerState {
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub last_action: Option<LastAction>,
}

impl TrackerState {
    /// Load state from a file with shared locking
    ///
    /// Returns default state if file doesn't exist.
    /// If file is corrupted, logs a warning and returns default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No state file found, starting with an empty catalog");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open state file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock state file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read state file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<TrackerState>(&contents) {
            Ok(state) => {
                tracing::debug!(
                    "Loaded {} medications from {:?}",
                    state.medications.len(),
                    path
                );
                Ok(state)
            }
            Err(e) => {
                let backup = quarantine(path)?;
                tracing::warn!(
                    "Failed to parse state file {:?}: {}. Moved it to {:?}, using defaults.",
                    path,
                    e,
                    backup
                );
                Ok(Self::default())
            }
        }
    }

    /// Save state to a file with exclusive locking
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames
    /// it over the original.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("State path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} medications to {:?}", self.medications.len(), path);
        Ok(())
    }
}

/// Move an unreadable state file aside so the next save cannot overwrite it
fn quarantine(path: &Path) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| Error::State(format!("State path {:?} has no file name", path)))?
        .to_os_string();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%3f")));

    let backup = path.with_file_name(name);
    std::fs::rename(path, &backup)?;
    Ok(backup)
}
