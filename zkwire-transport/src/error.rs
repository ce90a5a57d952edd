//! Transport errors

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Timed out after {0:?} waiting for reply")]
    Timeout(Duration),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    #[error("Local address {0} already in use")]
    AddressInUse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Protocol(#[from] zkwire_core::Error),

    #[error(transparent)]
    Codec(#[from] zkwire_types::Error),

    /// Device answered with an error acknowledgement
    #[error("Device rejected {command}: {reply}")]
    Device { command: String, reply: String },

    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error("Device requires authentication")]
    Unauthorized,

    #[error("Keep-alive failed after {missed} missed probes")]
    KeepAliveExhausted { missed: u8 },
}

impl Error {
    pub(crate) fn device(command: u16, reply: u16) -> Self {
        use zkwire_core::Command;
        Self::Device {
            command: Command::describe(command),
            reply: Command::describe(reply),
        }
    }

    pub(crate) fn unexpected(command: u16, reply: u16) -> Self {
        use zkwire_core::Command;
        Self::UnexpectedReply {
            command: Command::describe(command),
            reply: Command::describe(reply),
        }
    }

    /// Check if the socket can no longer carry commands
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionClosed)
    }

    /// Map a socket error, singling out refusals and address conflicts
    pub(crate) fn from_socket(err: io::Error, addr: &str) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(addr.to_string()),
            io::ErrorKind::AddrInUse => Self::AddressInUse(addr.to_string()),
            _ => Self::Io(err),
        }
    }
}
