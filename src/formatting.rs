//! Shared formatting utilities for table cells
//!
//! Timestamps are rendered in local time. Relative durations ("in 2.5 hrs",
//! "+45.0 mins") always use the single largest applicable unit with one
//! decimal place.

use chrono::{Local, TimeZone};

/// Display limits for free-text columns (in characters)
pub mod layout {
    pub const NAME_MAX_LEN: usize = 50;
    pub const NODE_LIST_MAX_LEN: usize = 25;
}

const TIMESTAMP_FORMAT: &str = "%y-%m-%d %H:%M:%S";

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3600;
const SECS_PER_DAY: i64 = 86_400;

/// Source of "now" for relative time columns.
///
/// Canned data is frozen in the past, so mock mode pins the clock to the
/// newest submit time in the canned dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Wall,
    Pinned(i64),
}

impl Clock {
    #[must_use]
    pub fn now(&self) -> i64 {
        match self {
            Clock::Wall => Local::now().timestamp(),
            Clock::Pinned(ts) => *ts,
        }
    }
}

/// Cut a string to at most `max_len` characters. No ellipsis is added, so
/// every visible character is real data.
///
/// This function is Unicode-safe and counts characters, not bytes.
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

/// Format an epoch timestamp as local `yy-mm-dd HH:MM:SS`.
#[must_use]
pub fn format_timestamp(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0).single() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Humanize a non-negative duration using its largest unit.
///
/// The fractional part is computed from the remainder within the current
/// day, so days are only as precise as one tenth of a day. Zero (and
/// negative input) gives an empty string.
///
/// # Examples
/// ```
/// use slurmtui::formatting::humanize_delta;
/// assert_eq!(humanize_delta(25 * 3600), "1.0 days");
/// assert_eq!(humanize_delta(90 * 60), "1.5 hrs");
/// assert_eq!(humanize_delta(45 * 60), "45.0 mins");
/// assert_eq!(humanize_delta(12), "12 secs");
/// assert_eq!(humanize_delta(0), "");
/// ```
#[must_use]
pub fn humanize_delta(seconds: i64) -> String {
    if seconds <= 0 {
        return String::new();
    }
    let days = seconds / SECS_PER_DAY;
    let rem = seconds % SECS_PER_DAY;

    if days > 0 {
        let value = days as f64 + round1(rem as f64 / SECS_PER_DAY as f64);
        format!("{value:.1} days")
    } else if rem >= SECS_PER_HOUR {
        format!("{:.1} hrs", round1(rem as f64 / SECS_PER_HOUR as f64))
    } else if rem >= SECS_PER_MINUTE {
        format!("{:.1} mins", round1(rem as f64 / SECS_PER_MINUTE as f64))
    } else {
        format!("{rem} secs")
    }
}

/// Timestamps of one job, in epoch seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTimes {
    pub submit: Option<i64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// Start and end cells for the current jobs view.
///
/// - running/finished jobs with an end time get `" (in X)"` on the end cell
///   while that end is still ahead
/// - pending jobs with an estimated start get `" (in X)"` on the start cell
/// - pending jobs without an estimate show their submit time in the start
///   cell, suffixed with `" (sub. X ago)"`
#[must_use]
pub fn current_time_strings(times: JobTimes, pending: bool, now: i64) -> (String, String) {
    let mut start_cell = times.start.map(format_timestamp).unwrap_or_default();
    let mut end_cell = times.end.map(format_timestamp).unwrap_or_default();

    if !pending {
        if let Some(end) = times.end
            && end - now >= 0
        {
            end_cell.push_str(&format!(" (in {})", humanize_delta(end - now)));
        }
        return (start_cell, end_cell);
    }

    if let Some(start) = times.start {
        if start - now >= 0 {
            start_cell.push_str(&format!(" (in {})", humanize_delta(start - now)));
        }
    } else if let Some(submit) = times.submit
        && now - submit >= 0
    {
        start_cell = format!(
            "{} (sub. {} ago)",
            format_timestamp(submit),
            humanize_delta(now - submit)
        );
    }

    (start_cell, end_cell)
}

/// Submit, start and end cells for the history view.
///
/// Start is annotated with the queue wait, end with the run time (or
/// `" (Instant)"` when the job ended no later than it started).
#[must_use]
pub fn historical_time_strings(times: JobTimes) -> (String, String, String) {
    let submit_cell = times.submit.map(format_timestamp).unwrap_or_default();

    let start_cell = match (times.start, times.submit) {
        (Some(start), Some(submit)) => format!(
            "{} +{}",
            format_timestamp(start),
            humanize_delta(start - submit)
        ),
        (Some(start), None) => format_timestamp(start),
        (None, _) => String::new(),
    };

    let end_cell = match times.end {
        Some(end) => {
            let start = times.start.unwrap_or(0);
            if end > start {
                format!("{} +{}", format_timestamp(end), humanize_delta(end - start))
            } else {
                format!("{} (Instant)", format_timestamp(end))
            }
        }
        None => String::new(),
    };

    (submit_cell, start_cell, end_cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello wo");
        assert_eq!(truncate_string("abc", 2), "ab");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn test_truncate_string_unicode() {
        assert_eq!(truncate_string("日本語テキスト", 5), "日本語テキ");
    }

    #[test]
    fn test_humanize_delta_units() {
        assert_eq!(humanize_delta(25 * 3600), "1.0 days");
        assert_eq!(humanize_delta(2 * 86_400 + 43_200), "2.5 days");
        assert_eq!(humanize_delta(90 * 60), "1.5 hrs");
        assert_eq!(humanize_delta(3600), "1.0 hrs");
        assert_eq!(humanize_delta(45 * 60), "45.0 mins");
        assert_eq!(humanize_delta(59), "59 secs");
        assert_eq!(humanize_delta(0), "");
        assert_eq!(humanize_delta(-30), "");
    }

    #[test]
    fn test_current_time_strings_running_job() {
        let now = 1_700_000_000;
        let times = JobTimes {
            submit: Some(now - 600),
            start: Some(now - 300),
            end: Some(now + 2 * 3600),
        };
        let (start, end) = current_time_strings(times, false, now);
        assert_eq!(start, format_timestamp(now - 300));
        assert_eq!(end, format!("{} (in 2.0 hrs)", format_timestamp(now + 7200)));
    }

    #[test]
    fn test_current_time_strings_past_end_has_no_suffix() {
        let now = 1_700_000_000;
        let times = JobTimes {
            end: Some(now - 10),
            ..JobTimes::default()
        };
        let (_, end) = current_time_strings(times, false, now);
        assert_eq!(end, format_timestamp(now - 10));
    }

    #[test]
    fn test_current_time_strings_pending_with_estimate() {
        let now = 1_700_000_000;
        let times = JobTimes {
            submit: Some(now - 60),
            start: Some(now + 45 * 60),
            end: None,
        };
        let (start, end) = current_time_strings(times, true, now);
        assert!(start.ends_with(" (in 45.0 mins)"));
        assert_eq!(end, "");
    }

    #[test]
    fn test_current_time_strings_pending_submit_only() {
        let now = 1_700_000_000;
        let submit = now - 2 * 3600;
        let times = JobTimes {
            submit: Some(submit),
            ..JobTimes::default()
        };
        let (start, end) = current_time_strings(times, true, now);
        assert_eq!(
            start,
            format!("{} (sub. 2.0 hrs ago)", format_timestamp(submit))
        );
        assert_eq!(end, "");
    }

    #[test]
    fn test_historical_time_strings() {
        let times = JobTimes {
            submit: Some(1_000_000),
            start: Some(1_000_060),
            end: Some(1_003_660),
        };
        let (submit, start, end) = historical_time_strings(times);
        assert_eq!(submit, format_timestamp(1_000_000));
        assert_eq!(start, format!("{} +1.0 mins", format_timestamp(1_000_060)));
        assert_eq!(end, format!("{} +1.0 hrs", format_timestamp(1_003_660)));
    }

    #[test]
    fn test_historical_time_strings_instant_and_missing() {
        let times = JobTimes {
            submit: Some(500),
            start: Some(1000),
            end: Some(1000),
        };
        let (_, _, end) = historical_time_strings(times);
        assert!(end.ends_with(" (Instant)"));

        let (submit, start, end) = historical_time_strings(JobTimes {
            submit: Some(500),
            ..JobTimes::default()
        });
        assert!(!submit.is_empty());
        assert_eq!(start, "");
        assert_eq!(end, "");
    }

    #[test]
    fn test_pinned_clock() {
        assert_eq!(Clock::Pinned(42).now(), 42);
        assert!(Clock::Wall.now() > 1_600_000_000);
    }
}
