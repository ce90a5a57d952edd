//! Device date encodings
//!
//! Terminals store timestamps in two ways: a packed `u32` counting seconds
//! over a calendar with 31-day months, and six raw bytes
//! `[yy, month, day, hour, minute, second]`. Both are rebuilt as local
//! `NaiveDateTime` values; out-of-range components roll over into the next
//! minute, day or month instead of failing.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

const BASE_YEAR: i64 = 2000;

fn calendar(year: i64, month0: i64, day: i64, hour: i64, minute: i64, second: i64) -> Result<NaiveDateTime> {
    let year = year + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;

    let start = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, 1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::Parse(format!("year {year} month {month} is out of range")))?;

    let offset = (day - 1) * 86_400 + hour * 3_600 + minute * 60 + second;
    start
        .checked_add_signed(Duration::seconds(offset))
        .ok_or_else(|| Error::Parse(format!("time offset {offset}s overflows")))
}

/// Decode a packed attendance timestamp
pub fn decode_packed_time(packed: u32) -> Result<NaiveDateTime> {
    let mut t = packed as i64;

    let second = t % 60;
    t /= 60;
    let minute = t % 60;
    t /= 60;
    let hour = t % 24;
    t /= 24;
    let day = t % 31 + 1;
    t /= 31;
    let month0 = t % 12;
    t /= 12;

    calendar(BASE_YEAR + t, month0, day, hour, minute, second)
}

/// Encode a timestamp in the packed attendance format
pub fn encode_packed_time(time: &NaiveDateTime) -> u32 {
    let years = (time.year() as i64 - BASE_YEAR).max(0);
    let packed = ((years * 12 + time.month0() as i64) * 31 + time.day0() as i64) * 86_400
        + time.hour() as i64 * 3_600
        + time.minute() as i64 * 60
        + time.second() as i64;

    packed.clamp(0, u32::MAX as i64) as u32
}

/// Decode the six-byte date carried by real-time events
pub fn decode_date_bytes(bytes: &[u8]) -> Result<NaiveDateTime> {
    Error::ensure_len("event date", bytes, 6)?;

    calendar(
        BASE_YEAR + bytes[0] as i64,
        bytes[1] as i64 - 1,
        bytes[2] as i64,
        bytes[3] as i64,
        bytes[4] as i64,
        bytes[5] as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_packed_time() {
        let expected = at(2023, 5, 17, 8, 30, 45);
        let packed = 45 + 60 * (30 + 60 * (8 + 24 * (16 + 31 * (4 + 12 * 23))));

        assert_eq!(encode_packed_time(&expected), packed);
        assert_eq!(decode_packed_time(packed).unwrap(), expected);
        assert_eq!(decode_packed_time(0).unwrap(), at(2000, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_packed_time_rolls_over_short_months() {
        // day index 30 of February
        let packed = 86_400 * (30 + 31 * (1 + 12 * 23));
        assert_eq!(decode_packed_time(packed).unwrap(), at(2023, 3, 3, 0, 0, 0));
    }

    #[test]
    fn test_date_bytes() {
        assert_eq!(
            decode_date_bytes(&[24, 2, 29, 23, 59, 58]).unwrap(),
            at(2024, 2, 29, 23, 59, 58)
        );
        assert_eq!(
            decode_date_bytes(&[23, 13, 1, 0, 0, 0]).unwrap(),
            at(2024, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            decode_date_bytes(&[23, 1, 1, 0, 0, 60]).unwrap(),
            at(2023, 1, 1, 0, 1, 0)
        );
    }

    #[test]
    fn test_date_bytes_zero_month_and_day() {
        assert_eq!(
            decode_date_bytes(&[23, 0, 0, 0, 0, 0]).unwrap(),
            at(2022, 11, 30, 0, 0, 0)
        );
        assert!(decode_date_bytes(&[23, 1, 1]).is_err());
    }
}
