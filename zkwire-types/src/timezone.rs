//! Timezone schedules and per-user timezone assignment

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Bytes, BytesMut};
use chrono::Weekday;

use crate::error::{Error, Result};
use crate::field::{clamp_u16, clamp_u32};

/// Size of an encoded timezone schedule
pub const TIMEZONE_SIZE: usize = 32;

/// Size of an encoded user-timezone write
pub const USER_TIMEZONE_WRITE_SIZE: usize = 20;

/// Minimum size of a user-timezone read reply
pub const USER_TIMEZONE_READ_SIZE: usize = 8;

/// One day's access window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaySegment {
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
}

impl DaySegment {
    pub fn new(start_hour: u8, start_minute: u8, end_hour: u8, end_minute: u8) -> Self {
        Self {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        }
    }

    /// Wire bytes with hours clamped to 0..=23 and minutes to 0..=59
    fn encode(self) -> [u8; 4] {
        [
            self.start_hour.min(23),
            self.start_minute.min(59),
            self.end_hour.min(23),
            self.end_minute.min(59),
        ]
    }

    fn decode(buf: &[u8]) -> Self {
        Self::new(buf[0], buf[1], buf[2], buf[3])
    }
}

/// Timezone schedule to be written with `CMD_TZ_WRQ`
///
/// Days without an explicit segment take `default_segment`, or the all-zero
/// segment when that is unset too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimezoneWrite {
    pub index: Option<i64>,
    /// Sunday first
    pub days: [Option<DaySegment>; 7],
    pub default_segment: Option<DaySegment>,
}

impl TimezoneWrite {
    pub fn new(index: impl Into<i64>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::default()
        }
    }

    pub fn with_day(mut self, day: Weekday, segment: DaySegment) -> Self {
        self.days[day.num_days_from_sunday() as usize] = Some(segment);
        self
    }

    pub fn with_default(mut self, segment: DaySegment) -> Self {
        self.default_segment = Some(segment);
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        let index = self
            .index
            .ok_or_else(|| Error::required("encode_timezone", "index"))?;

        let mut buf = BytesMut::zeroed(TIMEZONE_SIZE);
        LittleEndian::write_u32(&mut buf[0..4], clamp_u32(index));

        for (slot, day) in self.days.iter().enumerate() {
            let segment = day.or(self.default_segment).unwrap_or_default();
            let offset = 4 + slot * 4;
            buf[offset..offset + 4].copy_from_slice(&segment.encode());
        }

        Ok(buf.freeze())
    }
}

/// Timezone schedule as stored on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timezone {
    pub index: u32,
    /// Sunday first
    pub days: [DaySegment; 7],
}

impl Timezone {
    /// Decode a `CMD_TZ_RRQ` reply
    ///
    /// Short replies are tolerated: the index falls back to a 16-bit read or
    /// to `fallback_index`, and missing days decode as all-zero.
    pub fn decode(buf: &[u8], fallback_index: u32) -> Self {
        let index = if buf.len() >= 4 {
            LittleEndian::read_u32(&buf[0..4])
        } else if buf.len() >= 2 {
            LittleEndian::read_u16(&buf[0..2]) as u32
        } else {
            fallback_index
        };

        let mut days = [DaySegment::default(); 7];
        for (slot, day) in days.iter_mut().enumerate() {
            let offset = 4 + slot * 4;
            if buf.len() >= offset + 4 {
                *day = DaySegment::decode(&buf[offset..offset + 4]);
            }
        }

        Self { index, days }
    }

    pub fn day(&self, day: Weekday) -> DaySegment {
        self.days[day.num_days_from_sunday() as usize]
    }
}

/// Per-user timezone assignment to be written with `CMD_USERTZ_WRQ`
///
/// The user either follows its group's timezones or carries up to three of
/// its own; in group mode the three slots are written as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTimezoneWrite {
    pub uid: Option<i64>,
    /// Takes precedence over `use_group_timezones` when set
    pub use_user_timezones: Option<bool>,
    pub use_group_timezones: Option<bool>,
    pub timezones: Vec<i64>,
}

impl UserTimezoneWrite {
    pub fn new(uid: impl Into<i64>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    pub fn with_timezones(mut self, timezones: impl IntoIterator<Item = i64>) -> Self {
        self.timezones = timezones.into_iter().collect();
        self.use_user_timezones = Some(true);
        self
    }

    pub fn with_group_timezones(mut self) -> Self {
        self.use_group_timezones = Some(true);
        self.use_user_timezones = None;
        self
    }

    fn uses_own_timezones(&self) -> bool {
        match self.use_user_timezones {
            Some(own) => own,
            None => self.use_group_timezones != Some(true),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let uid = self
            .uid
            .ok_or_else(|| Error::required("encode_user_timezones", "uid"))?;

        let own = self.uses_own_timezones();
        let mut buf = BytesMut::zeroed(USER_TIMEZONE_WRITE_SIZE);

        LittleEndian::write_u32(&mut buf[0..4], clamp_u32(uid));
        LittleEndian::write_u32(&mut buf[4..8], own as u32);

        if own {
            for slot in 0..3 {
                let tz = self.timezones.get(slot).copied().unwrap_or(0);
                let offset = 8 + slot * 4;
                LittleEndian::write_u32(&mut buf[offset..offset + 4], clamp_u32(tz));
            }
        }

        Ok(buf.freeze())
    }
}

/// Per-user timezone assignment as reported by `CMD_USERTZ_RRQ`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTimezones {
    pub use_group_timezones: bool,
    pub timezones: [u16; 3],
}

impl UserTimezones {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < USER_TIMEZONE_READ_SIZE {
            return Err(Error::Validation(format!(
                "decode_user_timezones: invalid buffer ({} bytes, need {})",
                buf.len(),
                USER_TIMEZONE_READ_SIZE
            )));
        }

        Ok(Self {
            use_group_timezones: LittleEndian::read_u16(&buf[0..2]) == 1,
            timezones: [
                LittleEndian::read_u16(&buf[2..4]),
                LittleEndian::read_u16(&buf[4..6]),
                LittleEndian::read_u16(&buf[6..8]),
            ],
        })
    }
}

/// Clamp a timezone index list to the three u16 slots of group records
pub(crate) fn three_u16(timezones: &[i64]) -> [u16; 3] {
    [0, 1, 2].map(|slot| clamp_u16(timezones.get(slot).copied().unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_timezone_schedule() {
        let buf = TimezoneWrite::new(3)
            .with_day(Weekday::Sun, DaySegment::new(8, 30, 17, 45))
            .with_day(Weekday::Mon, DaySegment::new(9, 0, 18, 0))
            .encode()
            .unwrap();

        assert_eq!(buf.len(), 32);
        assert_eq!(LittleEndian::read_u32(&buf[0..4]), 3);
        assert_eq!(&buf[4..8], &[8, 30, 17, 45]);
        assert_eq!(&buf[8..12], &[9, 0, 18, 0]);
        assert_eq!(&buf[12..32], &[0; 20]);

        let decoded = Timezone::decode(&buf, 0);
        assert_eq!(decoded.index, 3);
        assert_eq!(decoded.day(Weekday::Sun), DaySegment::new(8, 30, 17, 45));
        assert_eq!(decoded.day(Weekday::Mon), DaySegment::new(9, 0, 18, 0));
        assert_eq!(decoded.day(Weekday::Tue), DaySegment::default());
    }

    #[test]
    fn test_default_segment_and_clamping() {
        let buf = TimezoneWrite::new(1)
            .with_default(DaySegment::new(7, 0, 19, 0))
            .with_day(Weekday::Sat, DaySegment::new(30, 75, 24, 60))
            .encode()
            .unwrap();

        let decoded = Timezone::decode(&buf, 0);
        assert_eq!(decoded.day(Weekday::Wed), DaySegment::new(7, 0, 19, 0));
        assert_eq!(decoded.day(Weekday::Sat), DaySegment::new(23, 59, 23, 59));
    }

    #[test]
    fn test_timezone_requires_index() {
        assert!(matches!(
            TimezoneWrite::default().encode(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_decode_short_timezone_reply() {
        assert_eq!(Timezone::decode(&[], 9).index, 9);
        assert_eq!(Timezone::decode(&[5, 0], 9).index, 5);

        let partial = Timezone::decode(&[2, 0, 0, 0, 8, 0, 17, 0], 0);
        assert_eq!(partial.day(Weekday::Sun), DaySegment::new(8, 0, 17, 0));
        assert_eq!(partial.day(Weekday::Mon), DaySegment::default());
    }

    #[test]
    fn test_encode_user_timezones() {
        let buf = UserTimezoneWrite::new(10)
            .with_timezones([1, 2])
            .encode()
            .unwrap();

        assert_eq!(buf.len(), 20);
        assert_eq!(LittleEndian::read_u32(&buf[0..4]), 10);
        assert_eq!(LittleEndian::read_u32(&buf[4..8]), 1);
        assert_eq!(LittleEndian::read_u32(&buf[8..12]), 1);
        assert_eq!(LittleEndian::read_u32(&buf[12..16]), 2);
        assert_eq!(LittleEndian::read_u32(&buf[16..20]), 0);
    }

    #[test]
    fn test_encode_user_timezones_group_mode_zeroes_slots() {
        let mut write = UserTimezoneWrite::new(11).with_group_timezones();
        write.timezones = vec![4, 5, 6];
        let buf = write.encode().unwrap();

        assert_eq!(LittleEndian::read_u32(&buf[4..8]), 0);
        assert_eq!(&buf[8..20], &[0; 12]);
    }

    #[test]
    fn test_decode_user_timezones() {
        let decoded = UserTimezones::decode(&[0, 0, 1, 0, 2, 0, 0, 0]).unwrap();
        assert!(!decoded.use_group_timezones);
        assert_eq!(decoded.timezones, [1, 2, 0]);

        let group = UserTimezones::decode(&[1, 0, 10, 0, 0, 0, 0, 0]).unwrap();
        assert!(group.use_group_timezones);
    }

    #[test]
    fn test_user_timezones_require_uid_and_length() {
        assert!(matches!(
            UserTimezoneWrite::default().encode(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            UserTimezones::decode(&[0; 7]),
            Err(Error::Validation(_))
        ));
    }
}
