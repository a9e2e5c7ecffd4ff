#![forbid(unsafe_code)]

//! Core domain model and business logic for medtrack.
//!
//! This crate provides:
//! - Domain types (medications, schedules, dose events)
//! - Medication catalog, dose event log and single-step undo
//! - Adherence engine (today's doses, next dose, percentages, streak)
//! - Persistence (state snapshot, dose journal, CSV table)

pub mod types;
pub mod error;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod logging;
pub mod dose_log;
pub mod undo;
pub mod engine;
pub mod tracker;
pub mod wal;
pub mod csv_rollup;
pub mod state;
pub mod history;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Field, FieldError, Result, ValidationErrors};
pub use types::*;
pub use catalog::{MedicationCatalog, MedicationDraft};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use dose_log::DoseLog;
pub use undo::UndoBuffer;
pub use engine::{Dashboard, DayAdherence, DoseSource, NextDose, ScheduledDose, StatsReport};
pub use tracker::{Tracker, TrackerEvent, TrackerObserver};
pub use wal::{DoseJournal, DoseLogEntry, DoseOp, JsonlJournal};
pub use state::TrackerState;
pub use store::{open_data_dir, DataPaths, Store};
