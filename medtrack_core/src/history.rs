//! Dose event history loading from the CSV table and the journal.
//!
//! The compacted table is read first, then journal entries are replayed on
//! top of it in the order they were written.

use crate::dose_log::DoseLog;
use crate::types::{DoseEvent, DoseTime};
use crate::{Error, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// CSV row format of the dose event table
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DoseEventRow {
    pub id: u64,
    pub medication_id: String,
    pub date: String,
    pub scheduled_time: String,
    pub taken: bool,
}

impl DoseEventRow {
    pub(crate) fn new(id: u64, event: &DoseEvent) -> Self {
        Self {
            id,
            medication_id: event.medication_id.to_string(),
            date: event.date.format("%Y-%m-%d").to_string(),
            scheduled_time: event.scheduled_time.to_string(),
            taken: event.taken,
        }
    }
}

impl TryFrom<DoseEventRow> for DoseEvent {
    type Error = Error;

    fn try_from(row: DoseEventRow) -> Result<Self> {
        let medication_id = Uuid::parse_str(&row.medication_id)
            .map_err(|e| Error::Parse(format!("Invalid UUID: {}", e)))?;

        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|e| Error::Parse(format!("Invalid date '{}': {}", row.date, e)))?;

        let scheduled_time: DoseTime = row.scheduled_time.parse()?;

        Ok(DoseEvent {
            medication_id,
            date,
            scheduled_time,
            taken: row.taken,
        })
    }
}

/// Load the current event log: CSV table plus journal replay
pub fn load_dose_log(csv_path: &Path, wal_path: &Path) -> Result<DoseLog> {
    let mut log = DoseLog::from_events(load_events_from_csv(csv_path)?);
    let table_count = log.len();

    let entries = crate::wal::read_entries(wal_path)?;
    for entry in &entries {
        entry.op.apply(&mut log);
    }

    tracing::debug!(
        "Loaded {} dose events ({} from table, {} journal entries replayed)",
        log.len(),
        table_count,
        entries.len()
    );
    Ok(log)
}

/// Load all events from the CSV table; malformed rows are skipped
pub fn load_events_from_csv(path: &Path) -> Result<Vec<DoseEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut events = Vec::new();
    for result in reader.deserialize::<DoseEventRow>() {
        match result {
            Ok(row) => match DoseEvent::try_from(row) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(events)
}
