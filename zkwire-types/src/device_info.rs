//! Device capacity counters (`CMD_GET_FREE_SIZES`)

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

const USER_COUNT_OFFSET: usize = 16;
const LOG_COUNT_OFFSET: usize = 32;
const LOG_CAPACITY_OFFSET: usize = 64;

/// Minimum size of a free-sizes reply
pub const FREE_SIZES_MIN: usize = LOG_CAPACITY_OFFSET + 4;

/// Storage usage reported by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Enrolled users
    pub user_counts: u32,

    /// Stored attendance records
    pub log_counts: u32,

    /// Attendance records the device can hold
    pub log_capacity: u32,
}

impl DeviceInfo {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Error::ensure_len("free sizes", buf, FREE_SIZES_MIN)?;

        let read = |offset: usize| LittleEndian::read_u32(&buf[offset..offset + 4]);
        Ok(Self {
            user_counts: read(USER_COUNT_OFFSET),
            log_counts: read(LOG_COUNT_OFFSET),
            log_capacity: read(LOG_CAPACITY_OFFSET),
        })
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[users: {}, logs: {}/{}]",
            self.user_counts, self.log_counts, self.log_capacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_free_sizes() {
        let mut buf = vec![0u8; 80];
        LittleEndian::write_u32(&mut buf[16..20], 12);
        LittleEndian::write_u32(&mut buf[32..36], 3_410);
        LittleEndian::write_u32(&mut buf[64..68], 100_000);

        let info = DeviceInfo::decode(&buf).unwrap();
        assert_eq!(
            info,
            DeviceInfo {
                user_counts: 12,
                log_counts: 3_410,
                log_capacity: 100_000,
            }
        );
        assert_eq!(info.to_string(), "Device[users: 12, logs: 3410/100000]");
    }

    #[test]
    fn test_short_reply() {
        assert!(matches!(
            DeviceInfo::decode(&[0; 40]),
            Err(Error::Malformed { expected: 68, .. })
        ));
    }
}
