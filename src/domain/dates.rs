//! Calendar helpers: weekday labels, human-written dates, request dates
//!
//! All dates handed out from here are calendar dates in the canonical
//! timezone. Callers never compare naive local timestamps.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Formats carrying their own year
const DATED_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d %B %Y", "%B %d %Y"];

/// Formats that need a year supplied from the reference date
const YEARLESS_FORMATS: [&str; 3] = ["%d/%m", "%d %B", "%B %d"];

/// Caller-supplied date that could not be understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDateInput {
    #[error("missing date parameter")]
    Missing,
    #[error("unrecognised date {0:?}")]
    Unparseable(String),
}

/// Match a single token against the full English weekday names.
/// Case-insensitive; surrounding punctuation (`Monday,` / `Monday:`) is ignored.
pub fn weekday_from_token(token: &str) -> Option<Weekday> {
    let word = token.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase();
    WEEKDAYS.iter().find(|(name, _)| *name == word).map(|(_, day)| *day)
}

/// Whether the first whitespace-separated token of `line` is a weekday name
pub fn starts_with_weekday(line: &str) -> bool {
    line.split_whitespace().next().and_then(weekday_from_token).is_some()
}

/// Split a day header into its weekday label and the remaining date text
pub fn split_day_header(header: &str) -> Option<(Weekday, &str)> {
    let header = header.trim();
    let (label, rest) = match header.split_once(char::is_whitespace) {
        Some((label, rest)) => (label, rest.trim()),
        None => (header, ""),
    };
    weekday_from_token(label).map(|day| (day, rest))
}

/// Parse a human-written date such as `4th March`, `March 4, 2024`,
/// `4/3/2024` or `2024-03-04`.
///
/// Year-less dates take whichever year puts them closest to `reference`,
/// so a late-December post listing `2 January` resolves to the next year.
pub fn parse_human_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let cleaned = normalize_date_text(text);
    if cleaned.is_empty() {
        return None;
    }

    for format in DATED_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }

    let year = reference.year();
    YEARLESS_FORMATS
        .iter()
        .find_map(|format| {
            let with_year = format!("{format} %Y");
            let candidates: Vec<NaiveDate> = [year - 1, year, year + 1]
                .iter()
                .filter_map(|y| NaiveDate::parse_from_str(&format!("{cleaned} {y}"), &with_year).ok())
                .collect();
            candidates
                .into_iter()
                .min_by_key(|date| (*date - reference).num_days().abs())
        })
}

/// Drop commas, ordinal suffixes and filler words, collapse whitespace
fn normalize_date_text(text: &str) -> String {
    text.replace(',', " ")
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("of"))
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(token: &str) -> &str {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(digits) = token.strip_suffix(suffix) {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits;
            }
        }
    }
    token
}

/// Parse a `date` request parameter into a calendar date in `tz`.
///
/// Accepts `YYYY-MM-DD`, naive `YYYY-MM-DDTHH:MM:SS[.f]` and RFC 3339
/// timestamps; timestamps with an offset are converted into `tz` before
/// flooring to the day.
pub fn parse_date_param(input: Option<&str>, tz: Tz) -> Result<NaiveDate, InvalidDateInput> {
    let raw = input.map(str::trim).filter(|s| !s.is_empty()).ok_or(InvalidDateInput::Missing)?;

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(stamp.with_timezone(&tz).date_naive());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.date());
    }

    Err(InvalidDateInput::Unparseable(raw.to_string()))
}

/// Today's calendar date in the canonical zone
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}
