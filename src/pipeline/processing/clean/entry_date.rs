use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::MISSING_DATE_TOKENS;

/// Reading order for all-numeric `a/b/yyyy` dates in the primary parse.
///
/// The preferred order is tried first and the other only when the first does
/// not form a valid date, so `13/04/2025` still parses under `MonthFirst`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashDateOrder {
    #[default]
    MonthFirst,
    DayFirst,
}

/// Two-digit years below this map to 20xx, the rest to 19xx.
pub const TWO_DIGIT_YEAR_PIVOT: u32 = 69;

static FOUR_DIGIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)\d{4}(?:\D|$)").expect("valid year regex"));

static NUMERIC_DATE_FOUR_DIGIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("valid numeric date regex"));

static US_SHORT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").expect("valid short date regex"));

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DateParsePolicy {
    /// Lower-cased tokens meaning "no date supplied".
    pub missing_tokens: Vec<String>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub slash_order: SlashDateOrder,
}

impl DateParsePolicy {
    pub fn new(min_date: NaiveDate, max_date: NaiveDate) -> Self {
        Self {
            missing_tokens: MISSING_DATE_TOKENS.iter().map(|s| s.to_string()).collect(),
            min_date,
            max_date,
            slash_order: SlashDateOrder::default(),
        }
    }

    fn is_missing_token(&self, text: &str) -> bool {
        let key = text.trim().to_lowercase();
        self.missing_tokens.iter().any(|t| *t == key)
    }
}

/// How one raw entry date was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateResolution {
    Valid(NaiveDate),
    MissingToken,
    Unparseable,
    OutOfRange(NaiveDate),
}

impl DateResolution {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateResolution::Valid(d) => Some(*d),
            _ => None,
        }
    }
}

/// Per-run tallies of date resolutions. The categories are disjoint and sum to
/// `total_rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateAudit {
    pub total_rows: usize,
    pub explicit_missing: usize,
    pub unparseable: usize,
    pub out_of_range: usize,
    pub valid: usize,
}

impl DateAudit {
    pub fn record(&mut self, resolution: &DateResolution) {
        self.total_rows += 1;
        match resolution {
            DateResolution::Valid(_) => self.valid += 1,
            DateResolution::MissingToken => self.explicit_missing += 1,
            DateResolution::Unparseable => self.unparseable += 1,
            DateResolution::OutOfRange(_) => self.out_of_range += 1,
        }
    }

    /// Rows whose cleaned date is null.
    pub fn nulls(&self) -> usize {
        self.total_rows - self.valid
    }
}

/// Resolve a single raw entry date. Rows are independent of each other.
pub fn normalize_entry_date(raw: &str, policy: &DateParsePolicy) -> DateResolution {
    if policy.is_missing_token(raw) {
        return DateResolution::MissingToken;
    }

    let text = raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
    if policy.is_missing_token(text) {
        return DateResolution::MissingToken;
    }

    let parsed = parse_flexible(text, policy.slash_order).or_else(|| {
        if text.contains('/') {
            parse_us_short(text)
        } else {
            None
        }
    });

    match parsed {
        None => DateResolution::Unparseable,
        Some(date) if date < policy.min_date || date > policy.max_date => DateResolution::OutOfRange(date),
        Some(date) => DateResolution::Valid(date),
    }
}

/// Primary parse: ISO dates and datetimes, named-month notations and
/// four-digit-year numeric dates. Time of day is dropped.
///
/// Inputs without a four-digit year are left to the fallback, otherwise
/// chrono would happily read `04/12/25` as the year 4.
pub fn parse_flexible(text: &str, order: SlashDateOrder) -> Option<NaiveDate> {
    if !FOUR_DIGIT_YEAR.is_match(text) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            if year_written_in_full(text, dt.date()) {
                return Some(dt.date());
            }
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            if year_written_in_full(text, d) {
                return Some(d);
            }
        }
    }

    let caps = NUMERIC_DATE_FOUR_DIGIT_YEAR.captures(text)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let (month_first, day_first) = (
        NaiveDate::from_ymd_opt(year, first, second),
        NaiveDate::from_ymd_opt(year, second, first),
    );
    match order {
        SlashDateOrder::MonthFirst => month_first.or(day_first),
        SlashDateOrder::DayFirst => day_first.or(month_first),
    }
}

/// chrono's `%d` can borrow digits from the year (`April 2025` reads as
/// day 20 of year 25), so a format match only counts when the parsed year is
/// the four-digit year in the text.
fn year_written_in_full(text: &str, date: NaiveDate) -> bool {
    date.year() >= 1000 && text.contains(&date.year().to_string())
}

/// Fallback parse: strict US `MM/DD/YY`.
pub fn parse_us_short(text: &str) -> Option<NaiveDate> {
    let caps = US_SHORT_DATE.captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let yy: u32 = caps[3].parse().ok()?;
    let year = if yy < TWO_DIGIT_YEAR_PIVOT { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year as i32, month, day)
}
