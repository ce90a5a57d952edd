//! Connection settings for a [`Device`](crate::Device)

use std::time::Duration;

use zkwire_core::constants::{DEFAULT_KEEP_ALIVE_MS, DEFAULT_TIMEOUT_MS};
use zkwire_core::DEFAULT_PORT;
use zkwire_transport::TransportKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub ip: String,
    pub port: u16,
    /// Connect and per-reply deadline
    pub timeout: Duration,
    pub transport: TransportKind,
    /// Local UDP port; 0 picks an ephemeral one
    pub local_port: u16,
    /// Probe UDP links once connected
    pub keep_alive: bool,
    pub keep_alive_interval: Duration,
    /// Reject replies with a bad checksum
    pub validate_checksum: bool,
}

impl DeviceConfig {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    pub fn with_checksum_validation(mut self, enabled: bool) -> Self {
        self.validate_checksum = enabled;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ip: String::from("192.168.1.201"),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            transport: TransportKind::Tcp,
            local_port: 0,
            keep_alive: false,
            keep_alive_interval: Duration::from_millis(DEFAULT_KEEP_ALIVE_MS),
            validate_checksum: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::new("10.0.0.5");
        assert_eq!(config.ip, "10.0.0.5");
        assert_eq!(config.port, 4370);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.transport, TransportKind::Tcp);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(10));
        assert!(!config.keep_alive);
    }

    #[test]
    fn test_builders() {
        let config = DeviceConfig::new("10.0.0.5")
            .with_transport(TransportKind::Udp)
            .with_local_port(5200)
            .with_keep_alive(true)
            .with_timeout(Duration::from_secs(2));

        assert_eq!(config.transport, TransportKind::Udp);
        assert_eq!(config.local_port, 5200);
        assert!(config.keep_alive);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
