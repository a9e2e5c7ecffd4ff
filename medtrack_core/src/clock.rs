//! Source of the reference instant handed to the engine.

use chrono::{Local, NaiveDateTime};

pub trait Clock {
    /// Current local wall-clock time, without a timezone
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system's local time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Parse `YYYY-MM-DDTHH:MM` (seconds optional)
pub fn parse_local_datetime(s: &str) -> crate::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            crate::Error::Parse(format!(
                "Invalid date-time '{}', expected YYYY-MM-DDTHH:MM",
                s
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_fixed_clock() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(FixedClock(at).now(), at);
    }

    #[test]
    fn test_parse_local_datetime() {
        let parsed = parse_local_datetime("2024-05-06T12:34").unwrap();
        assert_eq!(parsed.hour(), 12);
        assert_eq!(parsed.minute(), 34);

        let with_seconds = parse_local_datetime("2024-05-06T12:34:56").unwrap();
        assert_eq!(with_seconds.second(), 56);

        assert!(parse_local_datetime("yesterday").is_err());
    }
}
