//! Human-readable "how long ago" strings for timestamps.
//!
//! The elapsed time is truncated to whole minutes first, then divided down the
//! unit chain (minutes → hours → days → weeks → months → years), truncating at
//! every step. A unit is used while its value is below the next threshold.

use chrono::{DateTime, Utc};

const MINUTES_PER_HOUR: i64 = 60;
const HOURS_PER_DAY: i64 = 24;
const DAYS_PER_WEEK: i64 = 7;
/// Weeks are shown up to four; from five weeks on the string switches to months.
const WEEKS_SHOWN: i64 = 5;
const DAYS_PER_MONTH: i64 = 30;
const MONTHS_PER_YEAR: i64 = 12;

pub fn relative_recency(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes <= 0 {
        return "Just now".to_string();
    }
    if minutes < MINUTES_PER_HOUR {
        return ago(minutes, "minute");
    }
    let hours = minutes / MINUTES_PER_HOUR;
    if hours < HOURS_PER_DAY {
        return ago(hours, "hour");
    }
    let days = hours / HOURS_PER_DAY;
    if days < DAYS_PER_WEEK {
        return ago(days, "day");
    }
    let weeks = days / DAYS_PER_WEEK;
    if weeks < WEEKS_SHOWN {
        return ago(weeks, "week");
    }
    let months = days / DAYS_PER_MONTH;
    if months < MONTHS_PER_YEAR {
        return ago(months, "month");
    }
    ago(months / MONTHS_PER_YEAR, "year")
}

fn ago(n: i64, unit: &str) -> String {
    let plural = if n != 1 { "s" } else { "" };
    format!("{n} {unit}{plural} ago")
}
