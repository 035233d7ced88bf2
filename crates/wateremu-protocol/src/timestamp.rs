//! The 6-byte date/time field.
//!
//! Layout is `yy mm dd hh mm ss`. Captures only show the placeholder
//! `20 01 01 00 00 00`, so the year base and digit encoding are configurable.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Default year the year byte counts from.
pub const DEFAULT_BASE_YEAR: i32 = 2000;

/// How each field value is written into its byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitEncoding {
    /// Plain binary value (`31` → `0x1F`).
    #[default]
    Binary,
    /// Packed BCD (`31` → `0x31`).
    Bcd,
}

impl DigitEncoding {
    fn apply(self, value: u8) -> u8 {
        match self {
            DigitEncoding::Binary => value,
            DigitEncoding::Bcd => ((value / 10) << 4) | (value % 10),
        }
    }
}

/// Encoder for the date/time field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampEncoder {
    /// Year that encodes as `0`.
    pub base_year: i32,
    /// Digit encoding of every byte.
    pub digits: DigitEncoding,
}

impl Default for TimestampEncoder {
    fn default() -> Self {
        TimestampEncoder {
            base_year: DEFAULT_BASE_YEAR,
            digits: DigitEncoding::default(),
        }
    }
}

impl TimestampEncoder {
    /// Encode `t` as `[year-of-century, month, day, hour, minute, second]`.
    pub fn encode(&self, t: &NaiveDateTime) -> [u8; 6] {
        let year = (t.year() - self.base_year).rem_euclid(100) as u8;
        [
            year,
            t.month() as u8,
            t.day() as u8,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
        ]
        .map(|field| self.digits.apply(field))
    }
}

/// Simulated time used when none is configured.
///
/// With the default encoder this produces the captured `20 01 01 00 00 00`.
pub fn default_simulated_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2032, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .expect("valid date")
    }

    #[test]
    fn test_default_reproduces_capture() {
        let encoded = TimestampEncoder::default().encode(&default_simulated_time());
        assert_eq!(encoded, [0x20, 0x01, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_binary_fields() {
        let encoded = TimestampEncoder::default().encode(&at(2019, 8, 31, 22, 10, 3));
        assert_eq!(encoded, [19, 8, 31, 22, 10, 3]);
    }

    #[test]
    fn test_bcd_fields() {
        let encoder = TimestampEncoder {
            digits: DigitEncoding::Bcd,
            ..TimestampEncoder::default()
        };
        // Matches a later capture: 19 08 31 22 10 03
        let encoded = encoder.encode(&at(2019, 8, 31, 22, 10, 3));
        assert_eq!(encoded, [0x19, 0x08, 0x31, 0x22, 0x10, 0x03]);
    }

    #[test]
    fn test_base_year_offset() {
        let encoder = TimestampEncoder {
            base_year: 1988,
            ..TimestampEncoder::default()
        };
        assert_eq!(encoder.encode(&at(2020, 1, 1, 0, 0, 0))[0], 32);
        // Years before the base wrap within the century.
        assert_eq!(encoder.encode(&at(1987, 1, 1, 0, 0, 0))[0], 99);
    }
}
