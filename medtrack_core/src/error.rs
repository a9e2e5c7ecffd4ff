//! Error types for the medtrack_core library.

use chrono::NaiveDate;
use std::fmt;
use std::io;
use uuid::Uuid;

use crate::types::DoseTime;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medtrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Medication form rejected; carries every invalid field
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Medication not found: {0}")]
    MedicationNotFound(Uuid),

    #[error("Medication already exists: {0}")]
    DuplicateMedication(Uuid),

    /// A dose was marked at a time the medication is not scheduled for
    #[error("Medication {medication_id} has no dose scheduled at {time}")]
    UnscheduledDose { medication_id: Uuid, time: DoseTime },

    /// A dose was marked on a date the medication is not due
    #[error("Medication {medication_id} is not due on {date}")]
    NotDueOn { medication_id: Uuid, date: NaiveDate },

    /// Malformed user or file input (times, dates, frequencies)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),
}

/// Form field a validation error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Dosage,
    ScheduledTimes,
    SpecificWeekdays,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Name => "name",
            Field::Dosage => "dosage",
            Field::ScheduledTimes => "times",
            Field::SpecificWeekdays => "weekdays",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// All field errors collected from one validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First message recorded for a field, if any
    pub fn for_field(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}
