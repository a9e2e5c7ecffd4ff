//! Medication catalog and the add/edit form validation.
//!
//! The catalog holds medication definitions keyed by id. Medications are
//! only created from a [`MedicationDraft`] that passed validation, so every
//! stored entry has a name, a dosage and at least one scheduled time.

use crate::error::{Field, ValidationErrors};
use crate::types::{DoseTime, Frequency, Medication};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Unvalidated medication fields as entered by the user
#[derive(Clone, Debug, Default)]
pub struct MedicationDraft {
    pub name: String,
    pub dosage: String,
    /// Times as typed (`HH:MM`); duplicates collapse
    pub times: Vec<String>,
    pub notes: Option<String>,
    pub frequency: Frequency,
    pub specific_weekdays: Vec<u8>,
}

impl MedicationDraft {
    /// Prefill a draft from an existing medication (edit form)
    pub fn from_medication(medication: &Medication) -> Self {
        Self {
            name: medication.name.clone(),
            dosage: medication.dosage.clone(),
            times: medication
                .scheduled_times
                .iter()
                .map(|t| t.to_string())
                .collect(),
            notes: medication.notes.clone(),
            frequency: medication.frequency,
            specific_weekdays: medication.specific_weekdays.iter().copied().collect(),
        }
    }

    /// Validate every field and build the medication under `id`.
    ///
    /// All field errors are collected before returning; nothing is built
    /// unless every field is valid.
    pub fn validate(&self, id: Uuid) -> Result<Medication> {
        let mut errors = ValidationErrors::default();

        if self.name.trim().is_empty() {
            errors.push(Field::Name, "Name is required");
        }
        if self.dosage.trim().is_empty() {
            errors.push(Field::Dosage, "Dosage is required");
        }

        let mut scheduled_times = BTreeSet::new();
        for raw in &self.times {
            match raw.parse::<DoseTime>() {
                Ok(time) => {
                    scheduled_times.insert(time);
                }
                Err(_) => errors.push(
                    Field::ScheduledTimes,
                    format!("'{}' is not a valid HH:MM time", raw),
                ),
            }
        }
        if self.times.is_empty() {
            errors.push(Field::ScheduledTimes, "At least one time is required");
        }

        let mut specific_weekdays = BTreeSet::new();
        for &day in &self.specific_weekdays {
            if (1..=7).contains(&day) {
                specific_weekdays.insert(day);
            } else {
                errors.push(
                    Field::SpecificWeekdays,
                    format!("Weekday {} is outside 1 (Monday) to 7 (Sunday)", day),
                );
            }
        }

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        let notes = self
            .notes
            .as_ref()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(String::from);

        Ok(Medication {
            id,
            name: self.name.trim().to_string(),
            dosage: self.dosage.trim().to_string(),
            scheduled_times,
            notes,
            frequency: self.frequency,
            specific_weekdays,
        })
    }
}

/// The set of registered medications
#[derive(Clone, Debug, Default)]
pub struct MedicationCatalog {
    medications: HashMap<Uuid, Medication>,
}

impl MedicationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from persisted medications; later duplicates of an id win
    pub fn from_medications(medications: impl IntoIterator<Item = Medication>) -> Self {
        let medications = medications.into_iter().map(|m| (m.id, m)).collect();
        Self { medications }
    }

    pub fn add(&mut self, medication: Medication) -> Result<()> {
        if self.medications.contains_key(&medication.id) {
            return Err(Error::DuplicateMedication(medication.id));
        }
        tracing::debug!("Added medication {} ({})", medication.id, medication.name);
        self.medications.insert(medication.id, medication);
        Ok(())
    }

    /// Replace the medication with the same id
    pub fn update(&mut self, medication: Medication) -> Result<()> {
        match self.medications.get_mut(&medication.id) {
            Some(existing) => {
                *existing = medication;
                Ok(())
            }
            None => Err(Error::MedicationNotFound(medication.id)),
        }
    }

    /// Remove a medication. Dose events are cascaded by the caller.
    pub fn delete(&mut self, id: Uuid) -> Option<Medication> {
        self.medications.remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Medication> {
        self.medications.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.medications.contains_key(&id)
    }

    /// All medications ordered by name (byte-wise, case-sensitive), then id
    pub fn list_all(&self) -> Vec<Medication> {
        let mut all: Vec<Medication> = self.medications.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.medications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, times: &[&str]) -> MedicationDraft {
        MedicationDraft {
            name: name.into(),
            dosage: "5 mg".into(),
            times: times.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_draft_builds_medication() {
        let id = Uuid::new_v4();
        let mut d = draft("  Amlodipine ", &["19:00", "07:00", "07:00"]);
        d.notes = Some("   ".into());

        let med = d.validate(id).unwrap();
        assert_eq!(med.id, id);
        assert_eq!(med.name, "Amlodipine");
        // Duplicates collapse, times sorted
        let times: Vec<String> = med.scheduled_times.iter().map(|t| t.to_string()).collect();
        assert_eq!(times, vec!["07:00", "19:00"]);
        // Blank notes are dropped
        assert_eq!(med.notes, None);
    }

    #[test]
    fn test_validation_collects_every_field() {
        let d = MedicationDraft {
            specific_weekdays: vec![0, 8],
            ..Default::default()
        };

        let errors = match d.validate(Uuid::new_v4()) {
            Err(Error::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        };
        assert_eq!(errors.for_field(Field::Name), Some("Name is required"));
        assert_eq!(errors.for_field(Field::Dosage), Some("Dosage is required"));
        assert_eq!(
            errors.for_field(Field::ScheduledTimes),
            Some("At least one time is required")
        );
        assert_eq!(
            errors
                .errors
                .iter()
                .filter(|e| e.field == Field::SpecificWeekdays)
                .count(),
            2
        );
    }

    #[test]
    fn test_invalid_time_rejected() {
        let err = draft("Aspirin", &["7am"]).validate(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.for_field(Field::ScheduledTimes).is_some()));
    }

    #[test]
    fn test_list_all_sorted_case_sensitive() {
        let mut catalog = MedicationCatalog::new();
        for name in ["metoprolol", "Aspirin", "Metoprolol", "amlodipine"] {
            let med = draft(name, &["08:00"]).validate(Uuid::new_v4()).unwrap();
            catalog.add(med).unwrap();
        }

        let names: Vec<String> = catalog.list_all().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Aspirin", "Metoprolol", "amlodipine", "metoprolol"]);
    }

    #[test]
    fn test_add_update_delete() {
        let mut catalog = MedicationCatalog::new();
        let id = Uuid::new_v4();
        let med = draft("Aspirin", &["21:00"]).validate(id).unwrap();

        catalog.add(med.clone()).unwrap();
        assert!(matches!(
            catalog.add(med.clone()),
            Err(Error::DuplicateMedication(dup)) if dup == id
        ));

        let mut edited = med.clone();
        edited.dosage = "81 mg".into();
        catalog.update(edited).unwrap();
        assert_eq!(catalog.get(id).unwrap().dosage, "81 mg");

        assert!(catalog.delete(id).is_some());
        assert!(catalog.get(id).is_none());
        assert!(matches!(catalog.update(med), Err(Error::MedicationNotFound(_))));
    }

    #[test]
    fn test_draft_roundtrip_from_medication() {
        let mut d = draft("Mesalamine", &["08:00"]);
        d.frequency = Frequency::SpecificWeekdays;
        d.specific_weekdays = vec![5, 1];
        let med = d.validate(Uuid::new_v4()).unwrap();

        let prefilled = MedicationDraft::from_medication(&med);
        assert_eq!(prefilled.times, vec!["08:00"]);
        assert_eq!(prefilled.specific_weekdays, vec![1, 5]);
        assert_eq!(prefilled.validate(med.id).unwrap(), med);
    }
}
