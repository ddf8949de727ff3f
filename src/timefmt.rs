use chrono::{DateTime, Local};

pub const NOT_AVAILABLE: &str = "N/A";
pub const GRADED_BEFORE_SUBMISSION: &str = "Graded before submission";
pub const SAME_INSTANT: &str = "Same instant";
pub const LESS_THAN_A_MINUTE: &str = "Less than a minute";

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Convert a positive epoch timestamp to local time.
/// Moodle reports unset dates as `0`, which maps to `None` here.
fn to_local(ts: Option<i64>) -> Option<DateTime<Local>> {
    let ts = ts.filter(|t| *t > 0)?;
    DateTime::from_timestamp(ts, 0).map(|dt| dt.with_timezone(&Local))
}

/// Format an epoch timestamp as `YYYY-MM-DD HH:MM:SS`, or `N/A`.
pub fn format_timestamp(ts: Option<i64>) -> String {
    to_local(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Format an epoch timestamp as `YYYY-MM-DD`, or `N/A`.
pub fn format_date(ts: Option<i64>) -> String {
    to_local(ts)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Describe the time between submission and grading, e.g. `"2 days, 1 hour"`.
pub fn elapsed_description(start_ts: Option<i64>, end_ts: Option<i64>) -> String {
    let (start, end) = match (start_ts, end_ts) {
        (Some(start), Some(end)) if start > 0 && end > 0 => (start, end),
        _ => return NOT_AVAILABLE.to_string(),
    };

    if end < start {
        return GRADED_BEFORE_SUBMISSION.to_string();
    }

    let seconds = end - start;
    if seconds == 0 {
        return SAME_INSTANT.to_string();
    }
    if seconds < SECONDS_PER_MINUTE {
        return LESS_THAN_A_MINUTE.to_string();
    }

    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, unit)| plural(count, unit))
        .collect();

    parts.join(", ")
}
