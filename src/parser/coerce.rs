//! Text → value coercions for scraped fields.
//!
//! Numeric coercions never fail: empty or malformed text becomes `None`, since
//! many source fields are optional. Only timestamp assembly reports errors.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*hr").unwrap());
static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*min").unwrap());
static SECONDS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*sec").unwrap());

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unknown month name: {0:?}")]
    UnknownMonth(String),
    #[error("invalid date: day={day:?} month={month:?} year={year:?}")]
    InvalidDate {
        day: String,
        month: String,
        year: String,
    },
}

pub fn parse_int(text: &str) -> Option<i64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    // "150.0" comes back from serialized floats
    t.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i64)
}

pub fn parse_float(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Map an English month name (full or three-letter, any case) to 1..=12.
pub fn month_name_to_number(text: &str) -> Result<u32, DateError> {
    let lower = text.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.len() >= 3 && (*m == lower || (lower.len() == 3 && m.starts_with(&lower))))
        .map(|i| i as u32 + 1)
        .ok_or_else(|| DateError::UnknownMonth(text.trim().to_string()))
}

/// Combine scraped day / month name / year into `YYYY-MM-DD HH:MM:SS` (midnight).
pub fn assemble_timestamp(day: &str, month_name: &str, year: &str) -> Result<String, DateError> {
    let month = month_name_to_number(month_name)?;
    let invalid = || DateError::InvalidDate {
        day: day.trim().to_string(),
        month: month_name.trim().to_string(),
        year: year.trim().to_string(),
    };

    let d = day.trim().parse::<u32>().map_err(|_| invalid())?;
    let y = year.trim().parse::<i32>().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(y, month, d).ok_or_else(invalid)?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    Ok(midnight.format(TIMESTAMP_FORMAT).to_string())
}

/// "Rest Between Sets 2min 30sec" → 150. Any subset of hr/min/sec is accepted.
pub fn parse_rest_time(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let grab = |re: &Regex| -> Option<u32> {
        re.captures(&lower).and_then(|c| c[1].parse::<u32>().ok())
    };

    let (h, m, s) = (grab(&HOURS_RE), grab(&MINUTES_RE), grab(&SECONDS_RE));
    if h.is_none() && m.is_none() && s.is_none() {
        return None;
    }
    hms(h.unwrap_or(0), m.unwrap_or(0), s.unwrap_or(0))
}

/// Summary timer text `hh:mm` (or `hh:mm:ss`) → seconds.
pub fn parse_hh_mm(text: &str) -> Option<u32> {
    let parts: Vec<u32> = text
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h, m] => hms(*h, *m, 0),
        [h, m, s] => hms(*h, *m, *s),
        _ => None,
    }
}

/// Timed set value `0hr:1min:30sec` → seconds. Unit suffixes are decoration.
pub fn parse_clock(text: &str) -> Option<u32> {
    let parts: Vec<u32> = text
        .trim()
        .split(':')
        .map(|p| digits(p).parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h, m, s] => hms(*h, *m, *s),
        [m, s] => hms(0, *m, *s),
        [s] => Some(*s),
        _ => None,
    }
}

/// `None` when the total does not fit in `u32`.
fn hms(h: u32, m: u32, s: u32) -> Option<u32> {
    let total = u64::from(h) * 3600 + u64::from(m) * 60 + u64::from(s);
    u32::try_from(total).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Lbs,
    Kg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightReps {
    pub unit: WeightUnit,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
}

/// Weight text had neither `lbs` nor `kg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedUnit;

/// "135lbs x 10reps" → (lbs, 135, 10). Missing separator leaves reps empty.
pub fn parse_weight_reps(text: &str) -> Result<WeightReps, UnrecognizedUnit> {
    let lower = text.replace('\n', "").to_lowercase();
    let (weight, reps) = match lower.split_once('x') {
        Some((w, r)) => (w, Some(r)),
        None => (lower.as_str(), None),
    };

    let unit = if weight.contains("lbs") {
        WeightUnit::Lbs
    } else if weight.contains("kg") {
        WeightUnit::Kg
    } else {
        return Err(UnrecognizedUnit);
    };

    Ok(WeightReps {
        unit,
        weight: parse_float(&decimal(weight)),
        reps: reps.and_then(|r| parse_int(&digits(r))).and_then(|n| u32::try_from(n).ok()),
    })
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn decimal(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}
