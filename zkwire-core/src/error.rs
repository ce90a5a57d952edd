//! Error types for zkwire-core

/// Result type alias for core protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short for the header it claims to carry
    #[error("Malformed frame: expected at least {expected} bytes, got {actual} bytes")]
    MalformedFrame {
        expected: usize,
        actual: usize,
    },

    /// TCP envelope does not start with the protocol magic
    #[error("Invalid envelope magic: {0}")]
    InvalidMagic(String),

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: {0}")]
    UnknownCommand(u16),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Payload too large for the u16 envelope length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
}

impl Error {
    /// Check if the error was caused by bytes on the wire rather than local state
    pub fn is_wire_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::InvalidMagic(_)
                | Self::ChecksumMismatch { .. }
        )
    }
}
