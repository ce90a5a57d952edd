//! Attendance log records returned by the bulk download

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;

use crate::datetime::decode_packed_time;
use crate::error::{Error, Result};
use crate::field::read_ascii;

/// Size of the extended attendance layout
pub const ATTENDANCE40_SIZE: usize = 40;

/// Size of the compact attendance layout
pub const ATTENDANCE16_SIZE: usize = 16;

/// One attendance punch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    /// Internal user serial, only present in the extended layout
    pub user_serial: Option<u16>,
    pub user_id: String,
    pub record_time: NaiveDateTime,
}

impl Attendance {
    pub fn decode40(buf: &[u8]) -> Result<Self> {
        Error::ensure_len("attendance40 record", buf, ATTENDANCE40_SIZE)?;

        Ok(Self {
            user_serial: Some(LittleEndian::read_u16(&buf[0..2])),
            user_id: read_ascii(buf, 2, 9),
            record_time: decode_packed_time(LittleEndian::read_u32(&buf[27..31]))?,
        })
    }

    pub fn decode16(buf: &[u8]) -> Result<Self> {
        Error::ensure_len("attendance16 record", buf, ATTENDANCE16_SIZE)?;

        Ok(Self {
            user_serial: None,
            user_id: LittleEndian::read_u16(&buf[0..2]).to_string(),
            record_time: decode_packed_time(LittleEndian::read_u32(&buf[4..8]))?,
        })
    }
}
