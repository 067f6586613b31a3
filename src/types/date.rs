//! # Date Arithmetic
//!
//! DATE values are stored as an `i32` day offset from 1970-01-01. Offsets
//! may be negative. The textual form is strictly `YYYY-MM-DD`; years outside
//! `1..=9999` and impossible calendar dates are rejected at parse time.

use crate::error::{DbError, Result};

const DAYS_IN_MONTH: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: i32) -> i32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month - 1) as usize]
    }
}

fn is_valid_date(year: i32, month: i32, day: i32) -> bool {
    (1..=9999).contains(&year)
        && (1..=12).contains(&month)
        && day >= 1
        && day <= days_in_month(year, month)
}

fn days_in_year(year: i32) -> i32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Converts a calendar date to the stored day offset.
pub fn date_to_days(year: i32, month: i32, day: i32) -> Result<i32> {
    if !is_valid_date(year, month, day) {
        return Err(DbError::SchemaFieldTypeMismatch(format!(
            "invalid date: {year:04}-{month:02}-{day:02}"
        )));
    }
    let mut days = 0i32;
    if year >= crate::config::EPOCH_YEAR {
        for y in crate::config::EPOCH_YEAR..year {
            days += days_in_year(y);
        }
    } else {
        for y in year..crate::config::EPOCH_YEAR {
            days -= days_in_year(y);
        }
    }
    for m in 1..month {
        days += days_in_month(year, m);
    }
    Ok(days + day - 1)
}

/// Converts a stored day offset back to `(year, month, day)`.
pub fn days_to_date(mut days: i32) -> (i32, i32, i32) {
    let mut year = crate::config::EPOCH_YEAR;
    if days >= 0 {
        while days >= days_in_year(year) {
            days -= days_in_year(year);
            year += 1;
        }
    } else {
        while days < 0 {
            year -= 1;
            days += days_in_year(year);
        }
    }
    let mut month = 1;
    while days >= days_in_month(year, month) {
        days -= days_in_month(year, month);
        month += 1;
    }
    (year, month, days + 1)
}

/// Parses a `YYYY-MM-DD` literal into the stored day offset.
pub fn parse_date(text: &str) -> Result<i32> {
    let bad = || DbError::SchemaFieldTypeMismatch(format!("invalid date literal: {text:?}"));
    let mut parts = text.split('-');
    let year = parts.next().ok_or_else(bad)?;
    let month = parts.next().ok_or_else(bad)?;
    let day = parts.next().ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    let year: i32 = year.parse().map_err(|_| bad())?;
    let month: i32 = month.parse().map_err(|_| bad())?;
    let day: i32 = day.parse().map_err(|_| bad())?;
    date_to_days(year, month, day)
}

/// Formats a stored day offset as `YYYY-MM-DD`.
pub fn format_days(days: i32) -> String {
    let (y, m, d) = days_to_date(days);
    format!("{y:04}-{m:02}-{d:02}")
}
