//! Date filters for listings
//!
//! Filter bounds are given as relative expressions (`3d`, `2w`, `1mo`,
//! `1y`) or absolute dates (`2026-01-15`). Record timestamps come from the
//! backend in a handful of ISO-8601 variants.

use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFilterError {
    #[error("invalid time expression {0:?} (use e.g. 3d, 2w, 1mo, 1y, or 2026-01-15)")]
    InvalidExpression(String),

    #[error("empty timestamp")]
    EmptyTimestamp,

    #[error("unrecognized timestamp format: {0:?}")]
    UnrecognizedTimestamp(String),
}

static RE_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(d|w|mo|y)$").expect("valid relative time pattern"));

/// Parses a relative or absolute time expression against the current time
pub fn parse_relative(expr: &str) -> Result<DateTime<Utc>, DateFilterError> {
    parse_relative_at(expr, Utc::now())
}

/// Parses a relative or absolute time expression against `now`.
///
/// Relative units are calendar-aware: months and years land on the same
/// day of the month, clamped to the last valid day (March 31 minus one
/// month is the last day of February). Absolute dates mean midnight UTC.
pub fn parse_relative_at(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateFilterError> {
    let invalid = || DateFilterError::InvalidExpression(expr.to_string());
    if expr.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    if let Some(caps) = RE_RELATIVE.captures(expr) {
        let n: u32 = caps[1].parse().map_err(|_| invalid())?;
        let shifted = match &caps[2] {
            "d" => now.checked_sub_days(Days::new(u64::from(n))),
            "w" => now.checked_sub_days(Days::new(u64::from(n) * 7)),
            "mo" => now.checked_sub_months(Months::new(n)),
            "y" => n
                .checked_mul(12)
                .and_then(|months| now.checked_sub_months(Months::new(months))),
            _ => None,
        };
        return shifted.ok_or_else(invalid);
    }

    NaiveDate::parse_from_str(expr, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(invalid)
}

/// Parses a backend timestamp.
///
/// Accepted forms, in order: RFC 3339 with offset, UTC with fractional
/// seconds and `Z`, naive date-time (treated as UTC), bare date.
pub fn parse_api_timestamp(raw: &str) -> Result<DateTime<Utc>, DateFilterError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DateFilterError::EmptyTimestamp);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(DateFilterError::UnrecognizedTimestamp(raw.to_string()))
}

/// Up to four independent bounds on creation and modification time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilterSet {
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
}

impl DateFilterSet {
    /// Builds a filter set from optional expressions
    pub fn from_expressions(
        created_after: Option<&str>,
        created_before: Option<&str>,
        modified_after: Option<&str>,
        modified_before: Option<&str>,
    ) -> Result<Self, DateFilterError> {
        let now = Utc::now();
        let parse = |expr: Option<&str>| expr.map(|e| parse_relative_at(e, now)).transpose();

        Ok(Self {
            created_after: parse(created_after)?,
            created_before: parse(created_before)?,
            modified_after: parse(modified_after)?,
            modified_before: parse(modified_before)?,
        })
    }

    pub fn has_date_filters(&self) -> bool {
        self.created_after.is_some()
            || self.created_before.is_some()
            || self.modified_after.is_some()
            || self.modified_before.is_some()
    }

    /// Returns true if a record with the given raw timestamps passes every
    /// set bound.
    ///
    /// A bound excludes the record when the timestamp it constrains is
    /// missing or unparseable. A timestamp equal to a bound passes.
    pub fn matches_dates(&self, created: &str, modified: &str) -> bool {
        bound_holds(created, self.created_after, self.created_before)
            && bound_holds(modified, self.modified_after, self.modified_before)
    }
}

fn bound_holds(raw: &str, after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> bool {
    if after.is_none() && before.is_none() {
        return true;
    }

    let Ok(ts) = parse_api_timestamp(raw) else {
        return false;
    };

    if after.is_some_and(|bound| ts < bound) {
        return false;
    }
    if before.is_some_and(|bound| ts > bound) {
        return false;
    }
    true
}
