//! Date formats found in the sources

use crate::error::ParseError;
use chrono::NaiveDate;

/// `M/D/YY` as used by the time series column headers; century is 2000
pub fn parse_short_us(value: &str) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::InvalidDate {
        value: value.to_string(),
        expected: "M/D/YY",
    };

    let mut parts = value.trim().split('/');
    let (Some(month), Some(day), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    if !(0..100).contains(&year) {
        return Err(invalid());
    }

    NaiveDate::from_ymd_opt(2000 + year, month, day).ok_or_else(invalid)
}

/// `YYYYMMDD` packed into an integer
pub fn parse_compact(value: u32) -> Result<NaiveDate, ParseError> {
    let year = (value / 10_000) as i32;
    let month = value / 100 % 100;
    let day = value % 100;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParseError::InvalidDate {
        value: value.to_string(),
        expected: "YYYYMMDD",
    })
}

/// `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_policy_date(value: &str) -> Result<NaiveDate, ParseError> {
    let value = value.trim();

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(packed) = value.parse::<u32>() {
            return parse_compact(packed);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ParseError::InvalidDate {
        value: value.to_string(),
        expected: "YYYYMMDD or YYYY-MM-DD",
    })
}
