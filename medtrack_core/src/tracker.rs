//! The tracker context: catalog, dose log and undo slot behind one owner.
//!
//! A `Tracker` is built once and handed to whatever needs it. Every mutation
//! takes `&mut self` and completes (cascades included) before returning, so
//! derived views never see a half-applied change.

use crate::catalog::{MedicationCatalog, MedicationDraft};
use crate::dose_log::DoseLog;
use crate::engine::{self, Dashboard, DayAdherence, DoseSource, NextDose, ScheduledDose, StatsReport};
use crate::types::{DoseEvent, DoseKey, DoseStatus, DoseTime, LastAction, Medication};
use crate::undo::UndoBuffer;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// Change notifications delivered after a mutation is fully applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerEvent {
    MedicationAdded(Uuid),
    MedicationUpdated(Uuid),
    MedicationDeleted { id: Uuid, events_removed: usize },
    DoseMarked {
        key: DoseKey,
        status: DoseStatus,
        previous: DoseStatus,
    },
    /// An undo put `key` back into `status`
    DoseRestored { key: DoseKey, status: DoseStatus },
}

pub trait TrackerObserver {
    fn on_event(&mut self, event: &TrackerEvent);
}

#[derive(Default)]
pub struct Tracker {
    catalog: MedicationCatalog,
    log: DoseLog,
    undo: UndoBuffer,
    observers: Vec<Box<dyn TrackerObserver>>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("medications", &self.catalog.len())
            .field("events", &self.log.len())
            .field("last_action", &self.undo.last_action())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a tracker from loaded parts.
    ///
    /// Events for medications missing from the catalog are dropped, as is an
    /// undo capture that points at one.
    pub fn from_parts(
        catalog: MedicationCatalog,
        log: DoseLog,
        last_action: Option<LastAction>,
    ) -> Self {
        let mut tracker = Self::new();
        tracker.replace_parts(catalog, log, last_action);
        tracker
    }

    /// Swap in freshly loaded parts, keeping subscribed observers.
    ///
    /// Applies the same orphan filtering as [`Tracker::from_parts`].
    pub fn replace_parts(
        &mut self,
        catalog: MedicationCatalog,
        mut log: DoseLog,
        last_action: Option<LastAction>,
    ) {
        let orphans = log.retain_medications(|id| catalog.contains(id));
        if orphans > 0 {
            tracing::warn!("Dropped {} dose events with no matching medication", orphans);
        }
        let last_action = last_action.filter(|a| catalog.contains(a.key.medication_id));

        self.catalog = catalog;
        self.log = log;
        self.undo = UndoBuffer::from_last_action(last_action);
    }

    pub fn subscribe(&mut self, observer: Box<dyn TrackerObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, event: TrackerEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Validate a draft and register it under a fresh id
    pub fn add_medication(&mut self, draft: &MedicationDraft) -> Result<Medication> {
        let medication = draft.validate(Uuid::new_v4())?;
        self.catalog.add(medication.clone())?;
        tracing::info!("Added medication {} ({})", medication.name, medication.id);
        self.notify(TrackerEvent::MedicationAdded(medication.id));
        Ok(medication)
    }

    /// Validate a draft and replace medication `id` in place
    pub fn update_medication(&mut self, id: Uuid, draft: &MedicationDraft) -> Result<Medication> {
        if !self.catalog.contains(id) {
            return Err(Error::MedicationNotFound(id));
        }
        let medication = draft.validate(id)?;
        self.catalog.update(medication.clone())?;
        tracing::info!("Updated medication {} ({})", medication.name, id);
        self.notify(TrackerEvent::MedicationUpdated(id));
        Ok(medication)
    }

    /// Remove a medication and every one of its dose events
    pub fn delete_medication(&mut self, id: Uuid) -> Result<Medication> {
        let medication = self
            .catalog
            .delete(id)
            .ok_or(Error::MedicationNotFound(id))?;
        let events_removed = self.log.delete_all_for(id);
        self.undo.forget_medication(id);

        tracing::info!(
            "Deleted medication {} ({}) and {} dose events",
            medication.name,
            id,
            events_removed
        );
        self.notify(TrackerEvent::MedicationDeleted { id, events_removed });
        Ok(medication)
    }

    pub fn medication(&self, id: Uuid) -> Option<&Medication> {
        self.catalog.get(id)
    }

    /// All medications ordered by name
    pub fn medications(&self) -> Vec<Medication> {
        self.catalog.list_all()
    }

    // ------------------------------------------------------------------
    // Dose marks
    // ------------------------------------------------------------------

    /// Mark one scheduled dose taken or missed, capturing its prior state for undo.
    ///
    /// Returns the status the dose had before.
    pub fn mark_dose(
        &mut self,
        medication_id: Uuid,
        date: NaiveDate,
        time: DoseTime,
        taken: bool,
    ) -> Result<DoseStatus> {
        let medication = self
            .catalog
            .get(medication_id)
            .ok_or(Error::MedicationNotFound(medication_id))?;
        if !medication.is_due_on(date) {
            return Err(Error::NotDueOn {
                medication_id,
                date,
            });
        }
        if !medication.is_scheduled_at(time) {
            return Err(Error::UnscheduledDose {
                medication_id,
                time,
            });
        }

        let key = DoseKey::new(medication_id, date, time);
        self.undo.capture_before_mark(&self.log, key);
        let previous = self.log.record_dose(key, taken);
        let status = DoseStatus::from_taken(Some(taken));

        tracing::debug!("Marked {:?} as {} (was {})", key, status, previous);
        self.notify(TrackerEvent::DoseMarked {
            key,
            status,
            previous,
        });
        Ok(previous)
    }

    /// Revert the most recent mark. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<LastAction> {
        let action = self.undo.undo(&mut self.log)?;
        tracing::debug!("Restored {:?} to {}", action.key, action.previous);
        self.notify(TrackerEvent::DoseRestored {
            key: action.key,
            status: action.previous,
        });
        Some(action)
    }

    pub fn last_action(&self) -> Option<LastAction> {
        self.undo.last_action()
    }

    pub fn dose_status(&self, key: &DoseKey) -> DoseStatus {
        self.log.status(key)
    }

    pub fn all_events(&self) -> Vec<DoseEvent> {
        self.log.all_events()
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Doses due on `date` with their current status
    pub fn today(&self, date: NaiveDate) -> Vec<ScheduledDose> {
        engine::today_doses(&self.catalog.list_all(), &self.log.events_on(date), date)
    }

    pub fn next_dose(&self, now: NaiveDateTime, window: Duration) -> Option<NextDose> {
        engine::next_dose(&self.today(now.date()), now.time(), window)
    }

    pub fn dashboard(&self, now: NaiveDateTime, window: Duration) -> Dashboard {
        engine::dashboard(self, now, window)
    }

    pub fn stats(&self, today: NaiveDate) -> StatsReport {
        engine::stats_report(self, today)
    }

    pub fn weekly_adherence(&self, today: NaiveDate) -> u8 {
        let (start, end) = engine::adherence_window(today);
        engine::weekly_adherence(&self.log.events_in_range(start, end), today)
    }

    pub fn daily_adherence(&self, today: NaiveDate) -> Vec<DayAdherence> {
        let (start, end) = engine::adherence_window(today);
        engine::daily_adherence(&self.log.events_in_range(start, end), today)
    }

    pub fn streak(&self, today: NaiveDate) -> u32 {
        engine::streak_with(today, |date| self.log.events_on(date))
    }
}

impl DoseSource for Tracker {
    fn list_all(&self) -> Vec<Medication> {
        self.catalog.list_all()
    }

    fn events_on(&self, date: NaiveDate) -> Vec<DoseEvent> {
        self.log.events_on(date)
    }

    fn events_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DoseEvent> {
        self.log.events_in_range(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn draft(name: &str, times: &[&str]) -> MedicationDraft {
        MedicationDraft {
            name: name.into(),
            dosage: "50 mg".into(),
            times: times.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn at(s: &str) -> DoseTime {
        s.parse().unwrap()
    }

    struct Recorder(Rc<RefCell<Vec<TrackerEvent>>>);

    impl TrackerObserver for Recorder {
        fn on_event(&mut self, event: &TrackerEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_mark_and_undo_roundtrip() {
        crate::logging::init_test();
        let mut tracker = Tracker::new();
        let med = tracker.add_medication(&draft("Metoprolol", &["19:00"])).unwrap();
        let key = DoseKey::new(med.id, today(), at("19:00"));

        // unmarked -> taken -> undo -> unmarked
        tracker.mark_dose(med.id, today(), at("19:00"), true).unwrap();
        assert_eq!(tracker.dose_status(&key), DoseStatus::Taken);
        tracker.undo().unwrap();
        assert_eq!(tracker.dose_status(&key), DoseStatus::Unmarked);

        // taken -> missed -> undo -> taken
        tracker.mark_dose(med.id, today(), at("19:00"), true).unwrap();
        let previous = tracker.mark_dose(med.id, today(), at("19:00"), false).unwrap();
        assert_eq!(previous, DoseStatus::Taken);
        tracker.undo().unwrap();
        assert_eq!(tracker.dose_status(&key), DoseStatus::Taken);

        // Slot is single-use
        assert!(tracker.undo().is_none());
        assert_eq!(tracker.dose_status(&key), DoseStatus::Taken);
    }

    #[test]
    fn test_mark_rejects_unknown_medication_and_time() {
        let mut tracker = Tracker::new();
        let med = tracker.add_medication(&draft("Aspirin", &["21:00"])).unwrap();

        assert!(matches!(
            tracker.mark_dose(Uuid::new_v4(), today(), at("21:00"), true),
            Err(Error::MedicationNotFound(_))
        ));
        assert!(matches!(
            tracker.mark_dose(med.id, today(), at("08:00"), true),
            Err(Error::UnscheduledDose { .. })
        ));
        assert!(tracker.last_action().is_none());
    }

    #[test]
    fn test_mark_rejects_day_not_due() {
        let mut tracker = Tracker::new();
        let mwf = tracker
            .add_medication(&MedicationDraft {
                frequency: crate::types::Frequency::SpecificWeekdays,
                specific_weekdays: vec![1, 3, 5],
                ..draft("Methotrexate", &["08:00"])
            })
            .unwrap();
        let tuesday = today() + Duration::days(1);

        assert!(matches!(
            tracker.mark_dose(mwf.id, tuesday, at("08:00"), false),
            Err(Error::NotDueOn { date, .. }) if date == tuesday
        ));
        assert!(tracker.log.events_on(tuesday).is_empty());
        assert!(tracker.last_action().is_none());

        // Monday is due
        tracker.mark_dose(mwf.id, today(), at("08:00"), true).unwrap();
    }

    #[test]
    fn test_delete_cascades_and_clears_undo() {
        let mut tracker = Tracker::new();
        let keep = tracker.add_medication(&draft("Amlodipine", &["07:00"])).unwrap();
        let gone = tracker.add_medication(&draft("Azathioprine", &["22:00"])).unwrap();

        for back in 0..5 {
            let day = today() - Duration::days(back);
            tracker.mark_dose(keep.id, day, at("07:00"), true).unwrap();
            tracker.mark_dose(gone.id, day, at("22:00"), false).unwrap();
        }

        tracker.delete_medication(gone.id).unwrap();

        let start = today() - Duration::days(30);
        let events = tracker.events_in_range(start, today());
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.medication_id == keep.id));
        // Last mark referenced the deleted medication
        assert!(tracker.last_action().is_none());
        assert!(tracker.undo().is_none());
        assert!(tracker.medication(gone.id).is_none());
    }

    #[test]
    fn test_update_keeps_id() {
        let mut tracker = Tracker::new();
        let med = tracker.add_medication(&draft("Mesalamine", &["08:00"])).unwrap();

        let mut edit = MedicationDraft::from_medication(&med);
        edit.dosage = "1200 mg".into();
        let updated = tracker.update_medication(med.id, &edit).unwrap();

        assert_eq!(updated.id, med.id);
        assert_eq!(tracker.medications().len(), 1);
        assert_eq!(tracker.medication(med.id).unwrap().dosage, "1200 mg");
        assert!(matches!(
            tracker.update_medication(Uuid::new_v4(), &edit),
            Err(Error::MedicationNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_draft_leaves_catalog_untouched() {
        let mut tracker = Tracker::new();
        let med = tracker.add_medication(&draft("Aspirin", &["21:00"])).unwrap();

        let bad = MedicationDraft::default();
        assert!(matches!(tracker.add_medication(&bad), Err(Error::Validation(_))));
        assert!(matches!(
            tracker.update_medication(med.id, &bad),
            Err(Error::Validation(_))
        ));
        assert_eq!(tracker.medications(), vec![med]);
    }

    #[test]
    fn test_today_and_next_dose_views() {
        let mut tracker = Tracker::new();
        let med = tracker.add_medication(&draft("Metoprolol", &["20:00", "08:00"])).unwrap();
        tracker.mark_dose(med.id, today(), at("08:00"), false).unwrap();

        let doses = tracker.today(today());
        let statuses: Vec<_> = doses.iter().map(|d| (d.time, d.status)).collect();
        assert_eq!(
            statuses,
            vec![(at("08:00"), DoseStatus::Missed), (at("20:00"), DoseStatus::Unmarked)]
        );

        let now = today().and_hms_opt(7, 0, 0).unwrap();
        let next = tracker.next_dose(now, Duration::minutes(30)).unwrap();
        // A missed dose still counts as upcoming
        assert_eq!(next.dose.time, at("08:00"));
        assert_eq!(next.countdown, "1:00");

        let late = today().and_hms_opt(20, 1, 0).unwrap();
        assert!(tracker.next_dose(late, Duration::minutes(30)).is_none());
    }

    #[test]
    fn test_dashboard_after_delete_omits_medication() {
        let mut tracker = Tracker::new();
        let a = tracker.add_medication(&draft("Amlodipine", &["13:00"])).unwrap();
        let b = tracker.add_medication(&draft("Metoprolol", &["12:45"])).unwrap();
        let now = today().and_hms_opt(12, 30, 0).unwrap();
        let window = Duration::minutes(30);

        let before = tracker.dashboard(now, window);
        assert_eq!(before.next.as_ref().unwrap().dose.medication.id, b.id);

        tracker.delete_medication(b.id).unwrap();
        let after = tracker.dashboard(now, window);
        assert_eq!(after.doses.len(), 1);
        let next = after.next.unwrap();
        assert_eq!(next.dose.medication.id, a.id);
        assert_eq!(next.countdown, "0:30");
        assert!(next.in_dose_window);
    }

    #[test]
    fn test_observers_see_mutations() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut tracker = Tracker::new();
        tracker.subscribe(Box::new(Recorder(seen.clone())));

        let med = tracker.add_medication(&draft("Aspirin", &["21:00"])).unwrap();
        tracker.mark_dose(med.id, today(), at("21:00"), false).unwrap();
        tracker.undo();
        tracker.delete_medication(med.id).unwrap();

        let key = DoseKey::new(med.id, today(), at("21:00"));
        assert_eq!(
            *seen.borrow(),
            vec![
                TrackerEvent::MedicationAdded(med.id),
                TrackerEvent::DoseMarked {
                    key,
                    status: DoseStatus::Missed,
                    previous: DoseStatus::Unmarked,
                },
                TrackerEvent::DoseRestored {
                    key,
                    status: DoseStatus::Unmarked,
                },
                TrackerEvent::MedicationDeleted {
                    id: med.id,
                    events_removed: 0,
                },
            ]
        );
    }

    #[test]
    fn test_from_parts_drops_orphans() {
        let med = draft("Aspirin", &["21:00"]).validate(Uuid::new_v4()).unwrap();
        let orphan_id = Uuid::new_v4();
        let log = DoseLog::from_events(vec![
            DoseEvent {
                medication_id: med.id,
                date: today(),
                scheduled_time: at("21:00"),
                taken: true,
            },
            DoseEvent {
                medication_id: orphan_id,
                date: today(),
                scheduled_time: at("21:00"),
                taken: false,
            },
        ]);
        let stale = LastAction {
            key: DoseKey::new(orphan_id, today(), at("21:00")),
            previous: DoseStatus::Unmarked,
        };

        let tracker = Tracker::from_parts(MedicationCatalog::from_medications(vec![med]), log, Some(stale));
        assert_eq!(tracker.all_events().len(), 1);
        assert!(tracker.last_action().is_none());
        assert_eq!(tracker.weekly_adherence(today()), 100);
        assert_eq!(tracker.streak(today()), 1);
    }
}
