// 📅 Report period - an inclusive range of calendar dates
//
// from_start = from 00:00:00, to_end = to 23:59:59, both inclusive.
// Timestamps are stored as "YYYY-MM-DD HH:MM:SS" (UTC), the same text
// SQLite's CURRENT_TIMESTAMP produces, so string and time order agree.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ObservationError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time at second resolution
pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the canonical format, an optional
/// fractional part, and the RFC 3339-ish "T" separator.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(ObservationError::validation(format!(
                "Invalid date range: {} is after {}",
                from, to
            )));
        }
        Ok(ReportPeriod { from, to })
    }

    /// Validate raw request dates (missing, blank, or unparseable are rejected)
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let from = from.map(str::trim).filter(|s| !s.is_empty());
        let to = to.map(str::trim).filter(|s| !s.is_empty());

        match (from, to) {
            (Some(from), Some(to)) => ReportPeriod::new(parse_date(from)?, parse_date(to)?),
            _ => Err(ObservationError::validation("Dates required")),
        }
    }

    /// A single-day period
    pub fn day(date: NaiveDate) -> Self {
        ReportPeriod { from: date, to: date }
    }

    pub fn from_start(&self) -> NaiveDateTime {
        self.from.and_time(NaiveTime::MIN)
    }

    pub fn to_end(&self) -> NaiveDateTime {
        // 23:59:59 always exists
        self.to
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.to.and_time(NaiveTime::MIN))
    }

    /// Inclusive on both ends
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.from_start() && at <= self.to_end()
    }

    pub fn contains_opt(&self, at: Option<NaiveDateTime>) -> bool {
        at.map_or(false, |t| self.contains(t))
    }

    pub fn label(&self) -> String {
        format!(
            "From {} to {}",
            self.from.format(DATE_FORMAT),
            self.to.format(DATE_FORMAT)
        )
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ObservationError::validation(format!("Invalid date: {}", value)))
}
