//! Journal compaction into the CSV dose event table.
//!
//! Compaction folds the journal into a freshly written table and archives
//! the journal, so later loads only replay entries written since.

use crate::history::DoseEventRow;
use crate::{Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// Fold the journal into the CSV table and archive the journal
///
/// This function:
/// 1. Loads the current table and replays the journal over it
/// 2. Writes the resulting events to a temp file next to the table
/// 3. Syncs it and renames it over the table
/// 4. Renames the journal to `.wal.processed`
/// 5. Returns the number of journal entries folded in
///
/// The table is on disk before the journal is moved; replaying an archived
/// journal over the new table again gives the same events.
pub fn compact_journal(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let entries = crate::wal::read_entries(wal_path)?;

    if entries.is_empty() {
        tracing::info!("No journal entries to compact");
        return Ok(0);
    }

    let log = crate::history::load_dose_log(csv_path, wal_path)?;

    let parent = csv_path
        .parent()
        .ok_or_else(|| Error::State(format!("Table path {:?} has no parent", csv_path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(temp.as_file());

        for (index, event) in log.all_events().iter().enumerate() {
            writer.serialize(DoseEventRow::new(index as u64 + 1, event))?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Wrote {} dose events to {:?}", log.len(), csv_path);

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived journal to {:?}", processed_path);

    Ok(entries.len())
}

/// Clean up archived journals
///
/// This removes all .wal.processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed journal: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journal files", count);
    }

    Ok(count)
}
