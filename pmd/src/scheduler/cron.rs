//! Cron expressions for the job cadences
//!
//! Expressions use the seconds-first six-field form understood by the
//! `cron` crate: `sec min hour day-of-month month day-of-week`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{debug, warn};

use super::interval::TimeOfDay;

const HOUR_MS: u64 = 60 * 60 * 1000;
const MINUTE_MS: u64 = 60 * 1000;

pub const HOURLY: &str = "0 0 * * * *";

/// Every N hours, N rounded from the interval
pub fn every_hours(interval_ms: u64) -> String {
    let hours = ((interval_ms as f64) / (HOUR_MS as f64)).round() as u64;
    match hours {
        0 => "0 0 */1 * * *".to_string(),
        h if h >= 24 => {
            debug!(hours = h, "every_hours: step of a day or more, firing daily");
            "0 0 0 * * *".to_string()
        }
        h => format!("0 0 */{} * * *", h),
    }
}

/// Every N minutes; an hour or more falls through to `every_hours`
pub fn every_minutes(interval_ms: u64) -> String {
    let minutes = ((interval_ms as f64) / (MINUTE_MS as f64)).round() as u64;
    match minutes {
        0 => "0 */1 * * * *".to_string(),
        m if m >= 60 => every_hours(interval_ms),
        m => format!("0 */{} * * * *", m),
    }
}

pub fn daily_at(time: TimeOfDay) -> String {
    format!("0 {} {} * * *", time.minute, time.hour)
}

pub fn weekdays_at(time: TimeOfDay) -> String {
    format!("0 {} {} * * Mon-Fri", time.minute, time.hour)
}

pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(expression)
}

/// IANA zone name; unknown names log a warning and use UTC
pub fn parse_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %name, "Unknown timezone, using UTC");
            Tz::UTC
        }
    }
}

/// First firing strictly after `after`, evaluated in `tz`
pub fn next_fire(schedule: &Schedule, tz: &Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(tz))
        .next()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::interval::parse_interval;
    use chrono::{Datelike, TimeZone, Weekday};

    #[test]
    fn test_every_hours() {
        assert_eq!(every_hours(parse_interval("4h")), "0 0 */4 * * *");
        assert_eq!(every_hours(parse_interval("90m")), "0 0 */2 * * *");
        assert_eq!(every_hours(parse_interval("10m")), "0 0 */1 * * *");
        assert_eq!(every_hours(parse_interval("24h")), "0 0 0 * * *");
        assert_eq!(every_hours(parse_interval("3d")), "0 0 0 * * *");
    }

    #[test]
    fn test_every_minutes() {
        assert_eq!(every_minutes(parse_interval("5m")), "0 */5 * * * *");
        assert_eq!(every_minutes(0), "0 */1 * * * *");
        assert_eq!(every_minutes(parse_interval("2h")), "0 0 */2 * * *");
    }

    #[test]
    fn test_all_builders_parse() {
        let t = TimeOfDay { hour: 8, minute: 30 };
        for expr in [
            every_hours(DEFAULT_TEST_MS),
            every_minutes(300_000),
            daily_at(t),
            weekdays_at(t),
            HOURLY.to_string(),
        ] {
            assert!(parse_schedule(&expr).is_ok(), "{} should parse", expr);
        }
    }

    const DEFAULT_TEST_MS: u64 = 14_400_000;

    #[test]
    fn test_weekdays_skip_weekend() {
        let schedule = parse_schedule(&weekdays_at(TimeOfDay { hour: 9, minute: 0 })).unwrap();
        // Saturday noon
        let after = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let next = next_fire(&schedule, &Tz::UTC, after).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_honours_timezone() {
        let schedule = parse_schedule(&daily_at(TimeOfDay { hour: 9, minute: 0 })).unwrap();
        let tz = parse_timezone("America/New_York");
        let after = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        // 09:00 EDT
        assert_eq!(
            next_fire(&schedule, &tz, after).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_timezone_is_utc() {
        assert_eq!(parse_timezone("Mars/Olympus"), Tz::UTC);
        assert_eq!(parse_timezone("Europe/Berlin"), Tz::Europe__Berlin);
    }
}
