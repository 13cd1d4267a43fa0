//! Spoken-phrase interpretation: skip/yes-no detection and the small
//! grammars that resolve date and time phrases.
//!
//! All inputs are normalized (lower-cased, trimmed) transcripts. The
//! grammars are deliberately small: unresolvable phrases return `None`
//! and the dialogue engine decides whether to re-prompt or leave the
//! field unset.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

const SKIP_PHRASES: &[&str] = &[
    "no",
    "none",
    "nope",
    "nah",
    "nothing",
    "no thanks",
    "no thank you",
    "pass",
];

const YES_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "okay", "ok", "please"];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Whether a normalized answer signals skip/negative/empty.
#[must_use]
pub fn is_skip(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    if SKIP_PHRASES.contains(&text) {
        return true;
    }
    text.split_whitespace().any(|word| word == "skip")
}

/// Whether a normalized answer is an affirmative ("yes" and friends).
#[must_use]
pub fn is_affirmative(text: &str) -> bool {
    text.split_whitespace()
        .any(|word| YES_WORDS.contains(&word))
}

/// Resolve a spoken date phrase to a calendar date.
///
/// Recognizes "today", "tomorrow", "next week", and weekday names (a
/// weekday resolves to its next occurrence strictly after `today`).
/// Returns `None` for anything else.
#[must_use]
pub fn resolve_date_phrase(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if text.contains("today") || text.contains("tonight") {
        return Some(today);
    }
    if text.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }
    if text.contains("next week") {
        return Some(today + Duration::days(7));
    }
    for (name, weekday) in WEEKDAYS {
        if text.contains(name) {
            return Some(next_occurrence(today, *weekday));
        }
    }
    None
}

/// Resolve a spoken reminder-time phrase to an absolute time.
///
/// The grammar covers:
/// - relative offsets: "in 10 minutes", "in 2 hours", "in an hour"
/// - clock times: "at 5", "at 5:30 pm", "at 17:00", optionally combined
///   with a date phrase ("tomorrow at 9")
/// - day parts: "tonight" (20:00), "morning" (09:00), "afternoon"
///   (15:00), "evening" (18:00), "noon", "midnight"
/// - bare date phrases ("tomorrow", "on friday") at `default_hour`
///
/// A time of day with no date resolves to today, rolling to tomorrow if
/// that moment has already passed.
#[must_use]
pub fn resolve_time_phrase(
    text: &str,
    now: DateTime<Utc>,
    default_hour: u32,
) -> Option<DateTime<Utc>> {
    if let Some(offset) = parse_relative_offset(text) {
        return Some(now + offset);
    }

    let date = resolve_date_phrase(text, now.date_naive());
    let time = parse_clock_time(text).or_else(|| day_part_time(text));

    match (date, time) {
        (Some(date), Some((hour, minute))) => date.and_hms_opt(hour, minute, 0).map(|t| t.and_utc()),
        (Some(date), None) => date.and_hms_opt(default_hour, 0, 0).map(|t| t.and_utc()),
        (None, Some((hour, minute))) => {
            let candidate = now.date_naive().and_hms_opt(hour, minute, 0)?.and_utc();
            if candidate <= now {
                Some(candidate + Duration::days(1))
            } else {
                Some(candidate)
            }
        }
        (None, None) => None,
    }
}

fn next_occurrence(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { u64::from(ahead) };
    today + Duration::days(ahead as i64)
}

/// Parse "in N minutes/hours" (also "in a minute", "in an hour").
fn parse_relative_offset(text: &str) -> Option<Duration> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let at = words.iter().position(|w| *w == "in")?;
    let amount_word = words.get(at + 1)?;
    let amount: i64 = match *amount_word {
        "a" | "an" | "one" => 1,
        other => other.parse().ok()?,
    };
    let unit = words.get(at + 2)?;
    if unit.starts_with("minute") || unit.starts_with("min") {
        Some(Duration::minutes(amount))
    } else if unit.starts_with("hour") {
        Some(Duration::hours(amount))
    } else {
        None
    }
}

/// Parse "at H", "at H:MM", "at Hpm", "at H:MM am" into (hour, minute).
fn parse_clock_time(text: &str) -> Option<(u32, u32)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let at = words.iter().position(|w| *w == "at")?;
    let token = words.get(at + 1)?;

    let (digits, mut meridiem) = split_meridiem(token);
    if meridiem.is_none() {
        meridiem = words.get(at + 2).and_then(|w| match *w {
            "am" | "a.m." => Some(Meridiem::Am),
            "pm" | "p.m." => Some(Meridiem::Pm),
            _ => None,
        });
    }

    let (hour_str, minute_str) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None => (digits, "0"),
    };
    let mut hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }

    match meridiem {
        Some(Meridiem::Pm) if hour < 12 => hour += 12,
        Some(Meridiem::Am) if hour == 12 => hour = 0,
        _ => {}
    }
    Some((hour, minute))
}

#[derive(Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

fn split_meridiem(token: &str) -> (&str, Option<Meridiem>) {
    if let Some(rest) = token.strip_suffix("pm") {
        (rest, Some(Meridiem::Pm))
    } else if let Some(rest) = token.strip_suffix("am") {
        (rest, Some(Meridiem::Am))
    } else {
        (token, None)
    }
}

fn day_part_time(text: &str) -> Option<(u32, u32)> {
    if text.contains("midnight") {
        Some((0, 0))
    } else if text.contains("noon") {
        Some((12, 0))
    } else if text.contains("morning") {
        Some((9, 0))
    } else if text.contains("afternoon") {
        Some((15, 0))
    } else if text.contains("evening") {
        Some((18, 0))
    } else if text.contains("tonight") || text.contains("night") {
        Some((20, 0))
    } else {
        None
    }
}
