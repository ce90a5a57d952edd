//! Protocol constants

/// TCP envelope magic (`50 50 82 7D` on the wire)
pub const TCP_MAGIC: [u8; 4] = [0x50, 0x50, 0x82, 0x7D];

/// TCP envelope size
pub const ENVELOPE_SIZE: usize = 8;

/// Default per-command timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default keep-alive interval (milliseconds)
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 10_000;

/// Consecutive missed keep-alive probes before the link is declared dead
pub const MAX_MISSED_KEEP_ALIVES: u8 = 3;

/// Largest chunk requested with `CMD_DATA_RDY` over TCP
pub const MAX_CHUNK_TCP: u32 = 0xFFC0;

/// Largest chunk requested with `CMD_DATA_RDY` over UDP
pub const MAX_CHUNK_UDP: u32 = 16 * 1024;

/// Door unlock hold time used by `open_door` (tenths of a second)
pub const DEFAULT_UNLOCK_TENTHS: u32 = 30;

/// Real-time event flags
///
/// The same values double as the event-type discriminant carried in the
/// session-id slot of unsolicited `CMD_REG_EVENT` frames.
pub mod events {
    /// Attendance log event
    pub const EF_ATTLOG: u32 = 1;

    /// Verification event
    pub const EF_VERIFY: u32 = 1 << 7;

    /// Alarm signal
    pub const EF_ALARM: u32 = 1 << 9;

    /// Mask registered by the event listener
    pub const LISTEN_MASK: u32 = EF_ATTLOG | EF_VERIFY | EF_ALARM;
}

/// Data type flags (the `fct` field of buffered read requests)
pub mod data_types {
    /// Attendance log (the device ignores `fct` for `CMD_ATTLOG_RRQ`)
    pub const FCT_NONE: u32 = 0;

    /// User record
    pub const FCT_USER: u32 = 5;
}
