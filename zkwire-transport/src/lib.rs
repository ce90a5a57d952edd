//! Transport layer for ZK terminals
//!
//! Sockets ([`TcpTransport`], [`UdpTransport`]), the command/reply
//! [`Correlator`], the keep-alive monitor and the [`Link`] driver that ties
//! them together behind [`DeviceCommands`].

pub mod commands;
pub mod correlator;
pub mod error;
pub mod keepalive;
pub mod link;
pub mod tcp;
pub mod udp;

pub use commands::{DeviceCommands, Driver, EventHandler, KeepAliveCallback, RecordHandler, SocketStatus};
pub use correlator::Correlator;
pub use error::{Error, Result};
pub use keepalive::{KeepAliveMonitor, KeepAliveState};
pub use link::Link;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use zkwire_core::constants::{MAX_CHUNK_TCP, MAX_CHUNK_UDP};

/// Which socket a link runs over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Enveloped frames over a stream
    #[default]
    Tcp,
    /// Bare frames, one per datagram
    Udp,
}

impl TransportKind {
    /// Largest chunk requested per `CMD_DATA_RDY`
    pub fn max_chunk(self) -> u32 {
        match self {
            Self::Tcp => MAX_CHUNK_TCP,
            Self::Udp => MAX_CHUNK_UDP,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

/// Byte pipe to one device
///
/// `send` takes a fully framed request (enveloped for TCP). `receive`
/// returns exactly one frame with any envelope already removed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the socket
    async fn connect(&mut self) -> Result<()>;

    /// Close the socket
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if the socket is open
    fn is_connected(&self) -> bool;

    /// Send one framed request
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next frame
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Remote address as `host:port`
    fn remote_addr(&self) -> String;

    fn kind(&self) -> TransportKind;
}
