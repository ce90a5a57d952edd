//! Group membership and group timezone records

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::field::clamp_u16;
use crate::timezone::three_u16;

/// Size of an encoded user-group write
pub const USER_GROUP_WRITE_SIZE: usize = 5;

/// Size of a group-timezone record
pub const GROUP_TIMEZONE_SIZE: usize = 8;

/// Group used when neither the caller nor the device names one
pub const DEFAULT_GROUP: u8 = 1;

const HOLIDAY_BIT: u8 = 0x80;
const VERIFY_STYLE_MASK: u8 = 0x7F;

/// Group membership to be written with `CMD_USERGRP_WRQ`
///
/// Only the low byte of `uid` fits the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGroupWrite {
    pub uid: Option<i64>,
    pub group: Option<i64>,
}

impl UserGroupWrite {
    pub fn new(uid: impl Into<i64>, group: impl Into<i64>) -> Self {
        Self {
            uid: Some(uid.into()),
            group: Some(group.into()),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let uid = self
            .uid
            .ok_or_else(|| Error::required("encode_user_group", "uid"))?;

        let mut buf = BytesMut::zeroed(USER_GROUP_WRITE_SIZE);
        buf[0] = clamp_u16(uid) as u8;
        buf[4] = clamp_u16(self.group.unwrap_or(DEFAULT_GROUP as i64)) as u8;

        Ok(buf.freeze())
    }
}

/// Group membership as reported by `CMD_USERGRP_RRQ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserGroup {
    pub group: u8,
}

impl UserGroup {
    /// An empty reply means the default group
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            group: buf.first().copied().unwrap_or(DEFAULT_GROUP),
        }
    }
}

/// Group timezone assignment to be written with `CMD_GRPTZ_WRQ`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTimezoneWrite {
    pub group: Option<i64>,
    pub timezones: Vec<i64>,
    /// Verification style, clamped to 7 bits
    pub verify_style: i64,
    pub holiday: bool,
}

impl GroupTimezoneWrite {
    pub fn new(group: impl Into<i64>) -> Self {
        Self {
            group: Some(group.into()),
            ..Self::default()
        }
    }

    pub fn with_timezones(mut self, timezones: impl IntoIterator<Item = i64>) -> Self {
        self.timezones = timezones.into_iter().collect();
        self
    }

    pub fn with_verify_style(mut self, style: impl Into<i64>) -> Self {
        self.verify_style = style.into();
        self
    }

    pub fn with_holiday(mut self, holiday: bool) -> Self {
        self.holiday = holiday;
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        let group = self
            .group
            .ok_or_else(|| Error::required("encode_group_timezones", "group"))?;

        let mut buf = BytesMut::zeroed(GROUP_TIMEZONE_SIZE);
        buf[0] = clamp_u16(group) as u8;

        for (slot, tz) in three_u16(&self.timezones).into_iter().enumerate() {
            let offset = 1 + slot * 2;
            LittleEndian::write_u16(&mut buf[offset..offset + 2], tz);
        }

        let verify = self.verify_style.clamp(0, VERIFY_STYLE_MASK as i64) as u8;
        let holiday = if self.holiday { HOLIDAY_BIT } else { 0 };
        buf[7] = verify | holiday;

        Ok(buf.freeze())
    }
}

/// Group timezone assignment as stored on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTimezones {
    pub group: u8,
    pub timezones: [u16; 3],
    pub verify_style: u8,
    pub holiday: bool,
}

impl GroupTimezones {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < GROUP_TIMEZONE_SIZE {
            return Err(Error::Validation(format!(
                "decode_group_timezones: invalid buffer ({} bytes, need {})",
                buf.len(),
                GROUP_TIMEZONE_SIZE
            )));
        }

        Ok(Self {
            group: buf[0],
            timezones: [
                LittleEndian::read_u16(&buf[1..3]),
                LittleEndian::read_u16(&buf[3..5]),
                LittleEndian::read_u16(&buf[5..7]),
            ],
            verify_style: buf[7] & VERIFY_STYLE_MASK,
            holiday: buf[7] & HOLIDAY_BIT == HOLIDAY_BIT,
        })
    }
}
