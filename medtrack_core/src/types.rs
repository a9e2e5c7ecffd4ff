//! Core domain types for medtrack.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications and their dosing schedules
//! - Dose events and their display status
//! - The single-slot undo record

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

// ============================================================================
// Time of day
// ============================================================================

/// A scheduled time of day with minute precision, written as `HH:MM` (24h)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoseTime(NaiveTime);

impl DoseTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(DoseTime)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for DoseTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(DoseTime)
            .map_err(|_| Error::Parse(format!("Invalid time '{}', expected HH:MM", s)))
    }
}

impl TryFrom<String> for DoseTime {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DoseTime> for String {
    fn from(time: DoseTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

// ============================================================================
// Medication
// ============================================================================

/// How often a medication is taken
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    /// Only on the weekdays listed in `Medication::specific_weekdays`
    SpecificWeekdays,
    EveryNDays,
    Weekly,
    AsNeeded,
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "daily" => Ok(Self::Daily),
            "specific_weekdays" | "weekdays" => Ok(Self::SpecificWeekdays),
            "every_n_days" => Ok(Self::EveryNDays),
            "weekly" => Ok(Self::Weekly),
            "as_needed" => Ok(Self::AsNeeded),
            other => Err(Error::Parse(format!("Unknown frequency: {}", other))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::SpecificWeekdays => write!(f, "specific_weekdays"),
            Self::EveryNDays => write!(f, "every_n_days"),
            Self::Weekly => write!(f, "weekly"),
            Self::AsNeeded => write!(f, "as_needed"),
        }
    }
}

/// A registered medication and its dosing schedule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub dosage: String,
    pub scheduled_times: BTreeSet<DoseTime>,
    pub notes: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
    /// ISO weekday numbers, 1 = Monday .. 7 = Sunday
    #[serde(default)]
    pub specific_weekdays: BTreeSet<u8>,
}

impl Medication {
    /// Whether this medication is scheduled on `date`.
    ///
    /// Only `SpecificWeekdays` restricts the days; `Weekly`, `EveryNDays`
    /// and `AsNeeded` are due every day.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        match self.frequency {
            Frequency::SpecificWeekdays => {
                let weekday = date.weekday().number_from_monday() as u8;
                self.specific_weekdays.contains(&weekday)
            }
            Frequency::Daily | Frequency::Weekly | Frequency::EveryNDays | Frequency::AsNeeded => {
                true
            }
        }
    }

    pub fn is_scheduled_at(&self, time: DoseTime) -> bool {
        self.scheduled_times.contains(&time)
    }
}

// ============================================================================
// Dose events
// ============================================================================

/// Identity of one scheduled dose: (medication, date, time)
///
/// Ordering is by date, then time, then medication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoseKey {
    pub date: NaiveDate,
    pub time: DoseTime,
    pub medication_id: Uuid,
}

impl DoseKey {
    pub fn new(medication_id: Uuid, date: NaiveDate, time: DoseTime) -> Self {
        Self {
            date,
            time,
            medication_id,
        }
    }
}

/// A recorded taken/missed outcome for one dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseEvent {
    pub medication_id: Uuid,
    pub date: NaiveDate,
    pub scheduled_time: DoseTime,
    pub taken: bool,
}

impl DoseEvent {
    pub fn key(&self) -> DoseKey {
        DoseKey::new(self.medication_id, self.date, self.scheduled_time)
    }
}

/// Display status of a dose; `Unmarked` means no event exists
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Taken,
    Missed,
    Unmarked,
}

impl DoseStatus {
    pub fn from_taken(taken: Option<bool>) -> Self {
        match taken {
            Some(true) => DoseStatus::Taken,
            Some(false) => DoseStatus::Missed,
            None => DoseStatus::Unmarked,
        }
    }

    pub fn taken(&self) -> Option<bool> {
        match self {
            DoseStatus::Taken => Some(true),
            DoseStatus::Missed => Some(false),
            DoseStatus::Unmarked => None,
        }
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoseStatus::Taken => write!(f, "taken"),
            DoseStatus::Missed => write!(f, "missed"),
            DoseStatus::Unmarked => write!(f, "unmarked"),
        }
    }
}

/// State of a dose captured just before it was last marked
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastAction {
    pub key: DoseKey,
    pub previous: DoseStatus,
}
