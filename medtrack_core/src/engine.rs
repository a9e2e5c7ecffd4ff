//! Adherence engine: derived views over medications and dose events.
//!
//! Everything here is a pure function of its inputs. The reference instant
//! is always passed in; nothing samples the clock. Dates and times are
//! timezone-naive local values.
//!
//! - Today's dose list and the next upcoming dose with its countdown
//! - Weekly and per-day adherence percentages over the last 7 days
//! - The all-taken streak counted backward from today

use crate::types::{DoseEvent, DoseKey, DoseStatus, DoseTime, Medication};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Minutes either side of a scheduled time in which "take now" is offered
pub const DEFAULT_DOSE_WINDOW_MINUTES: i64 = 30;

/// Length of the adherence window, today included
pub const ADHERENCE_WINDOW_DAYS: i64 = 7;

/// Read access the engine needs from the catalog and event log
pub trait DoseSource {
    fn list_all(&self) -> Vec<Medication>;
    fn events_on(&self, date: NaiveDate) -> Vec<DoseEvent>;
    fn events_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DoseEvent>;
}

/// One dose due today with its current status
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledDose {
    pub medication: Medication,
    pub time: DoseTime,
    pub status: DoseStatus,
}

impl ScheduledDose {
    pub fn key(&self, date: NaiveDate) -> DoseKey {
        DoseKey::new(self.medication.id, date, self.time)
    }
}

/// The next dose still to take today
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextDose {
    pub dose: ScheduledDose,
    pub until: Duration,
    /// `H:MM`, seconds dropped
    pub countdown: String,
    pub in_dose_window: bool,
}

/// Adherence for a single day of the window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayAdherence {
    pub date: NaiveDate,
    pub percentage: u8,
}

impl DayAdherence {
    /// Short weekday name, e.g. "Mon"
    pub fn label(&self) -> String {
        self.date.format("%a").to_string()
    }
}

/// Everything the home screen shows
#[derive(Clone, Debug)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub doses: Vec<ScheduledDose>,
    /// `None` when no doses remain today
    pub next: Option<NextDose>,
    pub weekly_percentage: u8,
    pub streak: u32,
}

/// Everything the stats screen shows
#[derive(Clone, Debug)]
pub struct StatsReport {
    pub weekly_percentage: u8,
    pub days: Vec<DayAdherence>,
    pub streak: u32,
    pub feedback: &'static str,
}

// ============================================================================
// Today's doses
// ============================================================================

/// Doses due on `today`, sorted by time then medication name.
///
/// `events` may contain other days; only events dated `today` are used.
pub fn today_doses(
    medications: &[Medication],
    events: &[DoseEvent],
    today: NaiveDate,
) -> Vec<ScheduledDose> {
    let mut doses: Vec<ScheduledDose> = medications
        .iter()
        .filter(|med| med.is_due_on(today))
        .flat_map(|med| {
            med.scheduled_times.iter().map(move |&time| {
                let taken = events
                    .iter()
                    .find(|e| e.date == today && e.medication_id == med.id && e.scheduled_time == time)
                    .map(|e| e.taken);
                ScheduledDose {
                    medication: med.clone(),
                    time,
                    status: DoseStatus::from_taken(taken),
                }
            })
        })
        .collect();

    doses.sort_by(|a, b| {
        a.time
            .cmp(&b.time)
            .then_with(|| a.medication.name.cmp(&b.medication.name))
            .then_with(|| a.medication.id.cmp(&b.medication.id))
    });
    doses
}

// ============================================================================
// Next dose and countdown
// ============================================================================

/// Earliest dose that is not taken and scheduled strictly after `now`.
///
/// Times are compared within the day only; nothing rolls over to tomorrow.
/// Ties go to the medication name, then id.
pub fn next_dose(doses: &[ScheduledDose], now: NaiveTime, window: Duration) -> Option<NextDose> {
    let dose = doses
        .iter()
        .filter(|d| d.status != DoseStatus::Taken && d.time.as_naive() > now)
        .min_by(|a, b| {
            a.time
                .cmp(&b.time)
                .then_with(|| a.medication.name.cmp(&b.medication.name))
                .then_with(|| a.medication.id.cmp(&b.medication.id))
        })?;

    let until = dose.time.as_naive() - now;
    Some(NextDose {
        dose: dose.clone(),
        until,
        countdown: format_countdown(until),
        in_dose_window: in_dose_window(now, dose.time, window),
    })
}

/// Format a remaining duration as `H:MM`; seconds are truncated
pub fn format_countdown(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Whether `now` is within `window` of `scheduled`, in either direction
pub fn in_dose_window(now: NaiveTime, scheduled: DoseTime, window: Duration) -> bool {
    let diff = scheduled.as_naive() - now;
    diff.num_seconds().abs() <= window.num_seconds()
}

// ============================================================================
// Adherence statistics
// ============================================================================

/// Integer percentage of taken doses, truncated; 0 when there are none
pub fn adherence_percentage(taken: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (taken * 100 / total) as u8
}

/// Inclusive bounds of the adherence window ending on `today`
pub fn adherence_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(ADHERENCE_WINDOW_DAYS - 1), today)
}

fn percentage_of<'a>(events: impl Iterator<Item = &'a DoseEvent>) -> u8 {
    let (taken, total) = events.fold((0, 0), |(taken, total), e| {
        (taken + usize::from(e.taken), total + 1)
    });
    adherence_percentage(taken, total)
}

/// Taken percentage over every event in the 7-day window ending `today`
pub fn weekly_adherence(events: &[DoseEvent], today: NaiveDate) -> u8 {
    let (start, end) = adherence_window(today);
    percentage_of(events.iter().filter(|e| e.date >= start && e.date <= end))
}

/// Per-day percentages for the 7-day window, oldest first
pub fn daily_adherence(events: &[DoseEvent], today: NaiveDate) -> Vec<DayAdherence> {
    let (start, _) = adherence_window(today);
    (0..ADHERENCE_WINDOW_DAYS)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DayAdherence {
                date,
                percentage: percentage_of(events.iter().filter(|e| e.date == date)),
            }
        })
        .collect()
}

/// Consecutive all-taken days counted backward from `today`.
///
/// A day counts when it has at least one event and every event is taken.
/// The first day with no events or any missed dose ends the streak.
pub fn streak(events: &[DoseEvent], today: NaiveDate) -> u32 {
    streak_with(today, |date| {
        events.iter().filter(|e| e.date == date).cloned().collect()
    })
}

/// Streak walk starting at `start`, fetching each day's events on demand
pub fn streak_with<F>(start: NaiveDate, mut events_on: F) -> u32
where
    F: FnMut(NaiveDate) -> Vec<DoseEvent>,
{
    let mut count = 0;
    let mut date = start;
    loop {
        let day = events_on(date);
        if day.is_empty() || !day.iter().all(|e| e.taken) {
            return count;
        }
        count += 1;
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => return count,
        }
    }
}

/// Encouragement shown next to the weekly percentage
pub fn feedback_message(weekly_percentage: u8) -> &'static str {
    match weekly_percentage {
        90..=u8::MAX => "Excellent work! You're staying on track with your medications.",
        75..=89 => "Good job! Keep up the consistency.",
        50..=74 => "You're doing okay. Try to improve your consistency.",
        _ => "Let's work on building a better routine together.",
    }
}

// ============================================================================
// Composite views
// ============================================================================

/// Build the home-screen view from `source` at instant `now`
pub fn dashboard<S: DoseSource + ?Sized>(source: &S, now: NaiveDateTime, window: Duration) -> Dashboard {
    let today = now.date();
    let medications = source.list_all();
    let doses = today_doses(&medications, &source.events_on(today), today);
    let next = next_dose(&doses, now.time(), window);

    let (start, end) = adherence_window(today);
    let week = source.events_in_range(start, end);

    tracing::debug!(
        "Dashboard for {}: {} doses due, next {:?}",
        today,
        doses.len(),
        next.as_ref().map(|n| n.dose.time)
    );

    Dashboard {
        today,
        doses,
        next,
        weekly_percentage: weekly_adherence(&week, today),
        streak: streak_with(today, |date| source.events_on(date)),
    }
}

/// Build the stats-screen view for the week ending `today`
pub fn stats_report<S: DoseSource + ?Sized>(source: &S, today: NaiveDate) -> StatsReport {
    let (start, end) = adherence_window(today);
    let week = source.events_in_range(start, end);
    let weekly_percentage = weekly_adherence(&week, today);

    StatsReport {
        weekly_percentage,
        days: daily_adherence(&week, today),
        streak: streak_with(today, |date| source.events_on(date)),
        feedback: feedback_message(weekly_percentage),
    }
}
