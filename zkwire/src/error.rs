//! Façade error type
//!
//! Every failure leaving [`Device`](crate::Device) carries the operation tag
//! (`"[UDP] getUsers"`, `"TCP CONNECT"`, ...), the device address and the
//! underlying transport error. [`Error::kind`] folds the cause into the
//! closed [`ErrorKind`] taxonomy.

use std::fmt;

use zkwire_transport::Error as TransportError;

pub type Result<T> = std::result::Result<T, Error>;

/// Closed classification of façade failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No open socket when the operation was attempted
    NotConnected,
    /// No correlated reply within the deadline
    Timeout,
    /// Reply checksum did not recompute
    ChecksumMismatch,
    /// Buffer too short for its header or record layout
    MalformedFrame,
    /// Caller input rejected before anything was sent
    Validation,
    /// Local UDP port already bound
    AddressInUse,
    /// Device refused the TCP connection
    ConnectionRefused,
    /// Keep-alive probes went unanswered
    KeepAliveExhausted,
    /// Device answered with an error or unexpected acknowledgement
    Device,
    /// Any other socket failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotConnected => "not connected",
            Self::Timeout => "timeout",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::MalformedFrame => "malformed frame",
            Self::Validation => "validation error",
            Self::AddressInUse => "address in use",
            Self::ConnectionRefused => "connection refused",
            Self::KeepAliveExhausted => "keep-alive exhausted",
            Self::Device => "device error",
            Self::Io => "i/o error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{tag} {address}: {source}")]
pub struct Error {
    tag: String,
    address: String,
    source: TransportError,
}

impl Error {
    pub fn new(tag: impl Into<String>, address: impl Into<String>, source: TransportError) -> Self {
        Self {
            tag: tag.into(),
            address: address.into(),
            source,
        }
    }

    /// Operation and transport, e.g. `"[UDP] getUsers"`
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Address of the device the operation targeted
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn inner(&self) -> &TransportError {
        &self.source
    }

    pub fn into_inner(self) -> TransportError {
        self.source
    }

    pub fn kind(&self) -> ErrorKind {
        classify(&self.source)
    }
}

fn classify(err: &TransportError) -> ErrorKind {
    use zkwire_core::Error as Wire;
    use zkwire_types::Error as Codec;

    match err {
        TransportError::NotConnected | TransportError::ConnectionClosed => ErrorKind::NotConnected,
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
        TransportError::AddressInUse(_) => ErrorKind::AddressInUse,
        TransportError::KeepAliveExhausted { .. } => ErrorKind::KeepAliveExhausted,
        TransportError::Protocol(Wire::ChecksumMismatch { .. }) => ErrorKind::ChecksumMismatch,
        TransportError::Protocol(e) if e.is_wire_error() => ErrorKind::MalformedFrame,
        TransportError::Protocol(Wire::PayloadTooLarge { .. }) => ErrorKind::Validation,
        TransportError::Protocol(_) => ErrorKind::Device,
        TransportError::Codec(Codec::Validation(_)) => ErrorKind::Validation,
        TransportError::Codec(_) => ErrorKind::MalformedFrame,
        TransportError::Device { .. }
        | TransportError::UnexpectedReply { .. }
        | TransportError::Unauthorized => ErrorKind::Device,
        TransportError::Io(_) | TransportError::InvalidAddress(_) | TransportError::AlreadyConnected => {
            ErrorKind::Io
        }
    }
}
