//! Reminder time suggestions.
//!
//! Pure helper: proposes candidate reminder times for a task, for the
//! application to offer as quick choices. No side effects.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Propose candidate reminder times for a task.
///
/// With a due date: one day before at `default_hour`, and one hour before
/// the due moment (the due date at `default_hour`). Without one: tomorrow
/// at `default_hour`, and one week from now. Candidates already in the
/// past are dropped.
#[must_use]
pub fn suggest_reminder_times(
    due_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    default_hour: u32,
) -> Vec<DateTime<Utc>> {
    let candidates = match due_date {
        Some(due) => {
            let due_moment = due
                .and_hms_opt(default_hour, 0, 0)
                .map(|t| t.and_utc());
            let day_before = (due - Duration::days(1))
                .and_hms_opt(default_hour, 0, 0)
                .map(|t| t.and_utc());
            let hour_before = due_moment.map(|t| t - Duration::hours(1));
            vec![day_before, hour_before]
        }
        None => {
            let tomorrow = (now.date_naive() + Duration::days(1))
                .and_hms_opt(default_hour, 0, 0)
                .map(|t| t.and_utc());
            vec![tomorrow, Some(now + Duration::days(7))]
        }
    };

    candidates
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate > now)
        .collect()
}
