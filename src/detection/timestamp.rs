//! Parsing of RouterOS log timestamps
//!
//! RouterOS abbreviates the time column depending on the entry's age:
//! `10:15:30` for today, `jan/02 10:15:30` for earlier this year and
//! `jan/02/2023 10:15:30` beyond that. Newer releases and exported logs use
//! ISO dates instead. The abbreviated forms are completed from a reference
//! date, normally the day of the run.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized log timestamp: {0:?}")]
    UnrecognizedFormat(String),
}

const FULL_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%b/%d/%Y %H:%M:%S"];

pub fn parse_log_time(raw: &str, reference: NaiveDate) -> Result<NaiveDateTime, ParseError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }

    for format in FULL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }

    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return Ok(reference.and_time(time));
    }

    // mon/dd hh:mm:ss, year taken from the reference date
    if let Some((date, time)) = raw.split_once(' ') {
        let with_year = format!("{}/{} {}", date, reference.year(), time.trim());
        if let Ok(dt) = NaiveDateTime::parse_from_str(&with_year, "%b/%d/%Y %H:%M:%S") {
            return Ok(dt);
        }
    }

    Err(ParseError::UnrecognizedFormat(raw.to_string()))
}
