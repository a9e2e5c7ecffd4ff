//! Demo fixtures for tests: two patients' medications with a week of
//! seeded, mostly-taken history.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use medtrack_core::{DoseEvent, DoseTime, Frequency, MedicationDraft, Tracker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(s: &str) -> DoseTime {
    s.parse().unwrap()
}

pub fn draft(name: &str, dosage: &str, times: &[&str], notes: &str) -> MedicationDraft {
    MedicationDraft {
        name: name.into(),
        dosage: dosage.into(),
        times: times.iter().map(|t| t.to_string()).collect(),
        notes: Some(notes.into()),
        frequency: Frequency::Daily,
        specific_weekdays: Vec::new(),
    }
}

pub fn demo_drafts() -> Vec<MedicationDraft> {
    vec![
        draft("Amlodipine", "5 mg", &["07:00"], "Take with water in the morning"),
        draft("Metoprolol", "50 mg", &["19:00"], "Take with dinner"),
        draft("Aspirin", "81 mg", &["21:00"], "Low-dose for heart health"),
        draft("Mesalamine", "800 mg", &["08:00"], "For IBD management"),
        draft("Azathioprine", "50 mg", &["22:00"], "Immunosuppressant - take at bedtime"),
    ]
}

/// Tracker with the demo medications and `days` days of history ending
/// the day before `today`, each dose taken with probability `taken_rate`.
pub fn seeded_tracker(seed: u64, today: NaiveDate, days: i64, taken_rate: f64) -> Tracker {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tracker = Tracker::new();
    let meds: Vec<_> = demo_drafts()
        .iter()
        .map(|d| tracker.add_medication(d).unwrap())
        .collect();

    for back in 1..=days {
        let day = today - Duration::days(back);
        for med in &meds {
            for &at in &med.scheduled_times {
                let taken = rng.gen_bool(taken_rate);
                tracker.mark_dose(med.id, day, at, taken).unwrap();
            }
        }
    }
    tracker
}

/// Plain events for a medication id, one per (day offset, taken) pair
pub fn events_for(
    medication_id: uuid::Uuid,
    today: NaiveDate,
    at: &str,
    days: &[(i64, bool)],
) -> Vec<DoseEvent> {
    days.iter()
        .map(|&(back, taken)| DoseEvent {
            medication_id,
            date: today - Duration::days(back),
            scheduled_time: time(at),
            taken,
        })
        .collect()
}
