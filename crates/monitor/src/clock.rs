//! Wall-clock policies for the sampling loop.

use chrono::{DateTime, Duration, TimeZone, Timelike};

/// Cycles align to wall-clock marks this many minutes apart.
pub const CYCLE_PERIOD_MINUTES: u32 = 5;

/// How long to sleep from `now` until the next cycle boundary.
///
/// Boundaries sit on wall-clock minutes divisible by five. Exactly on a
/// boundary the full period is returned, so back-to-back cycles cannot
/// collapse into one. A non-positive result from clock drift is pushed
/// out by one more period.
#[must_use]
pub fn next_cycle_delay<Tz: TimeZone>(now: DateTime<Tz>) -> std::time::Duration {
    let into_boundary = i64::from(CYCLE_PERIOD_MINUTES - now.minute() % CYCLE_PERIOD_MINUTES);
    let truncated = now
        .clone()
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| now.clone());

    let mut until = truncated + Duration::minutes(into_boundary) - now;
    if until <= Duration::zero() {
        until = until + Duration::minutes(i64::from(CYCLE_PERIOD_MINUTES));
    }

    until.to_std().unwrap_or_default()
}

/// True inside the two-minute window where starting day balances reset.
///
/// The 5-minute cadence lands at least one cycle inside the window, so
/// each account resets exactly once per calendar day.
#[must_use]
pub fn in_reset_window<T: Timelike>(time: &T) -> bool {
    time.hour() == 3 && (time.minute() == 30 || time.minute() == 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, minute, second).unwrap()
    }

    // ==== Cycle boundary ====

    #[test]
    fn delay_reaches_the_next_boundary() {
        assert_eq!(next_cycle_delay(at(12, 2, 30)).as_secs(), 150);
        assert_eq!(next_cycle_delay(at(12, 4, 59)).as_secs(), 1);
        assert_eq!(next_cycle_delay(at(12, 6, 0)).as_secs(), 240);
    }

    #[test]
    fn exactly_on_a_boundary_waits_a_full_period() {
        assert_eq!(next_cycle_delay(at(12, 5, 0)).as_secs(), 300);
        assert_eq!(next_cycle_delay(at(0, 0, 0)).as_secs(), 300);
    }

    #[test]
    fn boundary_crosses_the_hour() {
        assert_eq!(next_cycle_delay(at(12, 57, 10)).as_secs(), 170);
        assert_eq!(next_cycle_delay(at(23, 58, 0)).as_secs(), 120);
    }

    #[test]
    fn subsecond_drift_is_absorbed() {
        let now = at(12, 4, 59)
            .with_nanosecond(900_000_000)
            .unwrap();
        let delay = next_cycle_delay(now);
        assert!(delay.as_millis() > 0);
        assert!(delay.as_millis() <= 1000);
    }

    // ==== Reset window ====

    #[test]
    fn reset_window_covers_two_minutes() {
        assert!(in_reset_window(
            &NaiveTime::from_hms_opt(3, 30, 0).unwrap()
        ));
        assert!(in_reset_window(
            &NaiveTime::from_hms_opt(3, 31, 59).unwrap()
        ));
    }

    #[test]
    fn reset_window_excludes_neighbours() {
        assert!(!in_reset_window(
            &NaiveTime::from_hms_opt(3, 29, 59).unwrap()
        ));
        assert!(!in_reset_window(
            &NaiveTime::from_hms_opt(3, 32, 0).unwrap()
        ));
        assert!(!in_reset_window(
            &NaiveTime::from_hms_opt(15, 30, 0).unwrap()
        ));
        assert!(!in_reset_window(
            &NaiveTime::from_hms_opt(2, 30, 0).unwrap()
        ));
    }
}
