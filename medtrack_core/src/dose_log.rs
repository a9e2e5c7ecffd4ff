//! Dose event log: at most one taken/missed record per scheduled dose.

use crate::types::{DoseEvent, DoseKey, DoseStatus};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use uuid::Uuid;

/// In-memory dose event table keyed by (date, time, medication)
#[derive(Clone, Debug, Default)]
pub struct DoseLog {
    events: BTreeMap<DoseKey, bool>,
}

impl DoseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: impl IntoIterator<Item = DoseEvent>) -> Self {
        let mut log = Self::new();
        for event in events {
            log.events.insert(event.key(), event.taken);
        }
        log
    }

    /// Upsert a taken/missed outcome, returning the status it replaced
    pub fn record_dose(&mut self, key: DoseKey, taken: bool) -> DoseStatus {
        DoseStatus::from_taken(self.events.insert(key, taken))
    }

    /// Remove the event for `key` if present; returns the status it had
    pub fn unmark_dose(&mut self, key: DoseKey) -> DoseStatus {
        DoseStatus::from_taken(self.events.remove(&key))
    }

    /// Put `key` back into `status`, recording or removing as needed
    pub fn restore(&mut self, key: DoseKey, status: DoseStatus) {
        match status.taken() {
            Some(taken) => {
                self.events.insert(key, taken);
            }
            None => {
                self.events.remove(&key);
            }
        }
    }

    pub fn status(&self, key: &DoseKey) -> DoseStatus {
        DoseStatus::from_taken(self.events.get(key).copied())
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<DoseEvent> {
        self.events_in_range(date, date)
    }

    /// Events with `start <= date <= end`, ordered by date then time
    pub fn events_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DoseEvent> {
        if start > end {
            return Vec::new();
        }
        self.events
            .iter()
            .skip_while(|(key, _)| key.date < start)
            .take_while(|(key, _)| key.date <= end)
            .map(|(key, &taken)| to_event(key, taken))
            .collect()
    }

    pub fn all_events(&self) -> Vec<DoseEvent> {
        self.events
            .iter()
            .map(|(key, &taken)| to_event(key, taken))
            .collect()
    }

    /// Drop every event of a medication; returns how many were removed
    pub fn delete_all_for(&mut self, medication_id: Uuid) -> usize {
        let before = self.events.len();
        self.events.retain(|key, _| key.medication_id != medication_id);
        before - self.events.len()
    }

    /// Keep only events whose medication satisfies `keep`
    pub fn retain_medications<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(Uuid) -> bool,
    {
        let before = self.events.len();
        self.events.retain(|key, _| keep(key.medication_id));
        before - self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn to_event(key: &DoseKey, taken: bool) -> DoseEvent {
    DoseEvent {
        medication_id: key.medication_id,
        date: key.date,
        scheduled_time: key.time,
        taken,
    }
}
