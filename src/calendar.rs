// 📅 Dimension Extractor - calendar fields from order timestamps
//
// Gregorian calendar only. Timestamps are taken as-is: no timezone shifts
// beyond what the source already encodes.

use crate::error::{PipelineError, PipelineResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// MONTH
// ============================================================================

/// Calendar month. `Ord` follows calendar order, so grouped and pivoted
/// month columns come out January → December without extra reindexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Month from its 1-based number
    pub fn from_number(number: u32) -> Option<Month> {
        if (1..=12).contains(&number) {
            Some(Month::ALL[(number - 1) as usize])
        } else {
            None
        }
    }

    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    /// Zero-based position, handy for indexing 12-slot arrays
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    /// Quarter 1-4 (month / 3, rounded up)
    pub fn quarter(self) -> u8 {
        ((self.number() + 2) / 3) as u8
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CALENDAR FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub year: i32,
    pub quarter: u8,
    pub month: Month,
}

impl CalendarFields {
    pub fn from_timestamp(timestamp: &NaiveDateTime) -> Self {
        let month = Month::ALL[timestamp.month0() as usize];
        CalendarFields {
            year: timestamp.year(),
            quarter: month.quarter(),
            month,
        }
    }

    pub fn month_name(&self) -> &'static str {
        self.month.name()
    }
}

// ============================================================================
// TIMESTAMP PARSING
// ============================================================================

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse an order timestamp as exported by spreadsheet tools.
///
/// Accepts full datetimes (`2018-05-31 00:00:00`, ISO `T` separator,
/// `05/31/2018 00:00:00`) and bare dates (`2018-05-31`, `05/31/2018`).
/// Bare dates are taken at midnight.
pub fn parse_timestamp(value: &str) -> PipelineResult<NaiveDateTime> {
    let value = value.trim();

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }

    Err(PipelineError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// serde adapter for `OrderDate` columns
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_quarters_round_up() {
        assert_eq!(Month::January.quarter(), 1);
        assert_eq!(Month::March.quarter(), 1);
        assert_eq!(Month::April.quarter(), 2);
        assert_eq!(Month::September.quarter(), 3);
        assert_eq!(Month::October.quarter(), 4);
        assert_eq!(Month::December.quarter(), 4);
    }

    #[test]
    fn test_month_numbers_round_trip() {
        for (i, month) in Month::ALL.iter().enumerate() {
            assert_eq!(month.number(), i as u32 + 1);
            assert_eq!(Month::from_number(month.number()), Some(*month));
        }
        assert_eq!(Month::from_number(0), None);
        assert_eq!(Month::from_number(13), None);
    }

    #[test]
    fn test_calendar_fields_from_timestamp() {
        let fields = CalendarFields::from_timestamp(&ts("2019-11-03 14:25:00"));

        assert_eq!(fields.year, 2019);
        assert_eq!(fields.quarter, 4);
        assert_eq!(fields.month, Month::November);
        assert_eq!(fields.month_name(), "November");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 5, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(ts("2018-05-31"), expected);
        assert_eq!(ts("05/31/2018"), expected);
        assert_eq!(ts("2018-05-31 00:00:00"), expected);
        assert_eq!(ts("2018-05-31T00:00:00"), expected);
        assert_eq!(ts("  2018-05-31 "), expected);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("31st of May").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_months_sort_in_calendar_order() {
        let mut months = vec![Month::December, Month::April, Month::January];
        months.sort();
        assert_eq!(months, vec![Month::January, Month::April, Month::December]);
    }
}
