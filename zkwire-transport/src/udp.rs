//! UDP transport
//!
//! Frames travel bare, one per datagram. The local port defaults to an
//! ephemeral one; a fixed port that is already taken surfaces as
//! [`Error::AddressInUse`] so callers can retry elsewhere.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{Transport, TransportKind, error::*};

/// Largest datagram accepted from the device
const MAX_DATAGRAM: usize = 65_535;

/// UDP transport for ZK terminals
pub struct UdpTransport {
    addr: String,
    port: u16,
    local_port: u16,
    socket: Option<UdpSocket>,
    remote_addr: Option<SocketAddr>,
}

impl UdpTransport {
    /// Create new UDP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            local_port: 0,
            socket: None,
            remote_addr: None,
        }
    }

    /// Bind to a fixed local port instead of an ephemeral one
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }

    /// Local address of the bound socket
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.remote_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.remote_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let remote = self.resolve_addr().await?;
        let local = format!("0.0.0.0:{}", self.local_port);

        debug!("Connecting to {} via UDP from {}...", remote, local);

        let socket = UdpSocket::bind(&local)
            .await
            .map_err(|e| Error::from_socket(e, &local))?;

        // fixes the default send target and filters datagrams from other peers
        socket
            .connect(remote)
            .await
            .map_err(|e| Error::from_socket(e, &remote.to_string()))?;

        debug!("Connected to {} via UDP", remote);

        self.socket = Some(socket);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Disconnecting from {}...", self.remote_addr());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes via UDP: {}", data.len(), hex::encode(data));

        socket.send(data).await?;

        Ok(())
    }

    async fn receive(&mut self, wait: Duration) -> Result<BytesMut> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(MAX_DATAGRAM);

        let n = timeout(wait, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                warn!("Read timeout after {:?}", wait);
                Error::Timeout(wait)
            })?
            .map_err(|e| {
                warn!("Read error: {}", e);
                Error::from_socket(e, &self.remote_addr())
            })?;

        if n == 0 {
            warn!("Received empty datagram");
            return Err(Error::ConnectionClosed);
        }

        buf.truncate(n);

        trace!("Received {} bytes via UDP: {}", n, hex::encode(&buf));

        Ok(buf)
    }

    fn remote_addr(&self) -> String {
        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_udp_transport_create() {
        let transport = UdpTransport::new("192.168.1.201", 4370);
        assert!(!transport.is_connected());
        assert_eq!(transport.kind(), TransportKind::Udp);
    }

    #[tokio::test]
    async fn test_udp_transport_invalid_address() {
        let mut transport = UdpTransport::new("invalid..address", 4370);
        assert!(transport.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_local_port_in_use() {
        let blocker = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let taken = blocker.local_addr().unwrap().port();

        let mut transport = UdpTransport::new("127.0.0.1", 4370).with_local_port(taken);
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, Error::AddressInUse(_)), "{err:?}");
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_datagram_exchange() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = device.local_addr().unwrap().port();

        let mut transport = UdpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();
        transport.send(&[1, 2, 3, 4, 5, 6, 7, 8]).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, peer) = device.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(Some(peer.port()), transport.local_addr().map(|a| a.port()));

        device.send_to(&[0xD0, 0x07, 0, 0, 0, 0, 1, 0], peer).await.unwrap();
        let reply = transport.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(&reply[..], &[0xD0, 0x07, 0, 0, 0, 0, 1, 0]);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_receive_timeout() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = device.local_addr().unwrap().port();

        let mut transport = UdpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();

        let err = transport.receive(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(transport.is_connected());
    }
}
