//! Regular expressions shared by extraction, form filling and input validation.
//!
//! The marker `[ID:<n>]` is the only identity a Unit4 row carries across runs,
//! so everything that recognises or produces it lives here.

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix used to locate markers in attributes before the full pattern is applied.
pub const MARKER_PREFIX: &str = "[ID:";

/// Maximum number of description characters appended after the marker.
pub const DESCRIPTION_LIMIT: usize = 60;

/// Sentinel used when a marked row carries no recognisable ticket key.
pub const UNKNOWN_TICKET: &str = "UNKNOWN";

/// Sentinel used when a marked row carries no recognisable cost-code.
pub const ZERO_COST_CODE: &str = "0000-00000-000";

/// Worklog marker: `[ID:12345]`
pub static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[ID:(\d+)\]").unwrap());

/// Issue key: `ABC-123`
pub static TICKET_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]{3,10}-\d+)").unwrap());

/// Unit4 cost-code (work order): `1234-56789-001`
pub static COST_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{5}-\d{3})").unwrap());

static COST_CODE_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{5}-\d{3}$").unwrap());

/// Day row label in the time-details section, German and English:
/// `Mo 3/02`, `Di 27.01`, `Fri 14/11`
pub static DAY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Mo|Di|Mi|Do|Fr|Sa|So|Mon|Tue|Wed|Thu|Fri|Sat|Sun)\s+(\d{1,2})[/.](\d{1,2})")
        .unwrap()
});

/// Period: `YYYYWW`
pub static PERIOD_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").unwrap());

/// Date: `YYYY-MM-DD`
pub static DATE_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Numeric cell value (hours): `0.00`, `8:00`, `7,5`
pub static NUMERIC_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d:,.]+$").unwrap());

/// JavaScript-compatible source of [`MARKER`], for in-page text matching.
pub const MARKER_JS: &str = r"\[ID:\d+\]";

/// JavaScript-compatible source matching the start of a day row label.
pub const DAY_LABEL_JS: &str = r"^(Mo|Di|Mi|Do|Fr|Sa|So|Mon|Tue|Wed|Thu|Fri|Sat|Sun)\s+\d+[/.]\d+";

/// Build the marker for a worklog id.
pub fn marker_for(worklog_id: u64) -> String {
    format!("[ID:{worklog_id}]")
}

/// Build the description written into Unit4: marker followed by the first
/// [`DESCRIPTION_LIMIT`] characters of the free text.
pub fn marked_description(worklog_id: u64, text: &str) -> String {
    let truncated: String = text.trim().chars().take(DESCRIPTION_LIMIT).collect();
    format!("{} {}", marker_for(worklog_id), truncated)
}

/// Extract the worklog id from the first marker in `text`.
pub fn parse_marker(text: &str) -> Option<u64> {
    MARKER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn find_ticket_key(text: &str) -> Option<&str> {
    TICKET_KEY.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub fn find_cost_code(text: &str) -> Option<&str> {
    COST_CODE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Whether the whole string is a well-formed cost-code.
pub fn is_valid_cost_code(text: &str) -> bool {
    COST_CODE_EXACT.is_match(text.trim())
}

pub fn is_numeric_cell(text: &str) -> bool {
    NUMERIC_CELL.is_match(text.trim())
}

/// A parsed time-details row label: weekday abbreviation plus two numerals
/// whose order (day/month or month/day) is not yet known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLabel {
    pub weekday: Weekday,
    pub first: u32,
    pub second: u32,
}

pub fn parse_day_label(label: &str) -> Option<DayLabel> {
    let caps = DAY_DATE.captures(label.trim())?;
    let weekday = weekday_from_abbreviation(caps.get(1)?.as_str())?;
    let first = caps.get(2)?.as_str().parse().ok()?;
    let second = caps.get(3)?.as_str().parse().ok()?;
    Some(DayLabel {
        weekday,
        first,
        second,
    })
}

fn weekday_from_abbreviation(abbr: &str) -> Option<Weekday> {
    Some(match abbr {
        "Mo" | "Mon" => Weekday::Mon,
        "Di" | "Tue" => Weekday::Tue,
        "Mi" | "Wed" => Weekday::Wed,
        "Do" | "Thu" => Weekday::Thu,
        "Fr" | "Fri" => Weekday::Fri,
        "Sa" | "Sat" => Weekday::Sat,
        "So" | "Sun" => Weekday::Sun,
        _ => return None,
    })
}

impl DayLabel {
    /// Resolve the label to a calendar date.
    ///
    /// Both numeral orders are tried; the one whose weekday agrees with the
    /// label's abbreviation wins, day-first on a tie. The year is taken from
    /// `reference`, shifted by one across the December/January boundary.
    pub fn resolve(&self, reference: NaiveDate) -> Option<NaiveDate> {
        let day_first = resolve_with_year(self.first, self.second, reference);
        let month_first = resolve_with_year(self.second, self.first, reference);

        match (day_first, month_first) {
            (Some(d), _) if d.weekday() == self.weekday => Some(d),
            (_, Some(d)) if d.weekday() == self.weekday => Some(d),
            (Some(d), _) => Some(d),
            (None, other) => other,
        }
    }
}

fn resolve_with_year(day: u32, month: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let year = match (month, reference.month()) {
        (12, 1) => reference.year() - 1,
        (1, 12) => reference.year() + 1,
        _ => reference.year(),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
