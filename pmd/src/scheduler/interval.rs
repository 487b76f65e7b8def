//! Operator-facing interval and time-of-day strings

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Fallback when an interval string is not understood: four hours
pub const DEFAULT_INTERVAL_MS: u64 = 4 * 60 * 60 * 1000;

pub const DEFAULT_HOUR: u32 = 9;
pub const DEFAULT_MINUTE: u32 = 0;

static INTERVAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^(\d+)\s*([mhd])$").ok());

/// Parse `<N>m`, `<N>h` or `<N>d` into milliseconds
///
/// Anything else logs a warning and yields four hours, so a typo in the
/// config never stops the scheduler from starting.
pub fn parse_interval(interval: &str) -> u64 {
    debug!(%interval, "parse_interval: called");
    let trimmed = interval.trim().to_lowercase();
    let parsed = INTERVAL_RE
        .as_ref()
        .and_then(|re| re.captures(&trimmed))
        .and_then(|caps| {
            let n: u64 = caps[1].parse().ok()?;
            let unit_ms = match &caps[2] {
                "m" => 60 * 1000,
                "h" => 60 * 60 * 1000,
                "d" => 24 * 60 * 60 * 1000,
                _ => return None,
            };
            n.checked_mul(unit_ms)
        });

    match parsed {
        Some(ms) => ms,
        None => {
            warn!(%interval, default_ms = DEFAULT_INTERVAL_MS, "Unrecognized interval, using default");
            DEFAULT_INTERVAL_MS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self {
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
        }
    }
}

/// Parse `HH:MM`; missing or unparseable components take the 09:00 defaults
pub fn parse_time(time: &str) -> TimeOfDay {
    debug!(%time, "parse_time: called");
    let mut parts = time.trim().splitn(2, ':');
    let hour = parts
        .next()
        .and_then(|h| h.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_HOUR);
    let minute = parts
        .next()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_MINUTE);

    if hour > 23 || minute > 59 {
        warn!(%time, "Time of day out of range, using default");
        return TimeOfDay::default();
    }
    TimeOfDay { hour, minute }
}
