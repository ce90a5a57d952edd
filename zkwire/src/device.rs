//! High-level device interface

use tracing::{info, warn};
use zkwire_core::Frame;
use zkwire_transport::{
    Correlator, Driver, Error as TransportError, EventHandler, KeepAliveCallback, Link,
    RecordHandler, SocketStatus, TcpTransport, TransportKind, UdpTransport,
};
use zkwire_types::{
    Attendance, DeviceInfo, GroupTimezoneWrite, GroupTimezones, Timezone, TimezoneWrite, Uid,
    User, UserGroup, UserGroupWrite, UserTimezoneWrite, UserTimezones, UserWrite,
};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// ZK terminal reached over one statically chosen transport
///
/// Every operation fails with [`ErrorKind::NotConnected`](crate::ErrorKind)
/// until [`Device::create_socket`] has succeeded.
///
/// # Examples
///
/// ```no_run
/// use zkwire::Device;
///
/// #[tokio::main]
/// async fn main() -> zkwire::Result<()> {
///     let device = Device::new_udp("192.168.1.201", 4370);
///
///     if device.connect().await? {
///         let info = device.get_info().await?;
///         println!("{}", info);
///         device.disconnect().await?;
///     }
///     Ok(())
/// }
/// ```
pub struct Device {
    config: DeviceConfig,
    driver: Box<dyn Driver>,
}

impl Device {
    /// Device reached over TCP
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self::with_config(DeviceConfig::new(ip).with_port(port))
    }

    /// Device reached over UDP
    pub fn new_udp(ip: impl Into<String>, port: u16) -> Self {
        Self::with_config(
            DeviceConfig::new(ip)
                .with_port(port)
                .with_transport(TransportKind::Udp),
        )
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        let driver: Box<dyn Driver> = match config.transport {
            TransportKind::Tcp => {
                let transport = TcpTransport::new(config.ip.clone(), config.port)
                    .with_connect_timeout(config.timeout);
                Box::new(Link::new(
                    Correlator::new(transport)
                        .with_timeout(config.timeout)
                        .with_checksum_validation(config.validate_checksum),
                ))
            }
            TransportKind::Udp => {
                let transport = UdpTransport::new(config.ip.clone(), config.port)
                    .with_local_port(config.local_port);
                Box::new(
                    Link::new(
                        Correlator::new(transport)
                            .with_timeout(config.timeout)
                            .with_checksum_validation(config.validate_checksum),
                    )
                    .with_keep_alive_interval(config.keep_alive_interval),
                )
            }
        };

        Self { config, driver }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn transport(&self) -> TransportKind {
        self.config.transport
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// Open the socket and establish a session
    ///
    /// Returns `Ok(false)` when the device refuses a TCP connection, so a
    /// supervisor can retry later. On UDP with keep-alive enabled,
    /// `on_keep_alive_failure` is told once when probing gives up; a
    /// warning is logged instead when no callback is given.
    pub async fn create_socket(
        &self,
        on_keep_alive_failure: Option<KeepAliveCallback>,
    ) -> Result<bool> {
        let kind = self.transport();

        if !self.driver.is_connected() {
            info!("Connecting to {}:{} over {}", self.config.ip, self.config.port, kind);

            match self.driver.connect().await {
                Ok(()) => {}
                Err(TransportError::ConnectionRefused(addr)) if kind == TransportKind::Tcp => {
                    warn!("Connection refused by {}", addr);
                    return Ok(false);
                }
                Err(e @ TransportError::AddressInUse(_)) if kind == TransportKind::Udp => {
                    return Err(self.fail("UDP EADDRINUSE", e));
                }
                Err(e) => return Err(self.fail(format!("{} CONNECT", kind), e)),
            }
        }

        if kind == TransportKind::Udp && self.config.keep_alive {
            let callback: KeepAliveCallback = match on_keep_alive_failure {
                Some(callback) => callback,
                None => {
                    let ip = self.config.ip.clone();
                    Box::new(move |e: TransportError| {
                        warn!("Keep-alive to {} gave up: {}", ip, e)
                    })
                }
            };
            self.driver.set_keep_alive(Some(callback));
        }

        Ok(true)
    }

    /// Same as [`Device::create_socket`] without a keep-alive callback
    pub async fn connect(&self) -> Result<bool> {
        self.create_socket(None).await
    }

    /// Close the session and the socket
    ///
    /// Fails with [`ErrorKind::NotConnected`](crate::ErrorKind) when no
    /// socket is open.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.driver.is_connected() {
            return Err(self.fail(self.tag("disconnect"), TransportError::NotConnected));
        }
        let result = self.driver.disconnect().await;
        self.wrap("disconnect", result)
    }

    /// Start (`Some`) or stop (`None`) keep-alive probing on a UDP link
    pub fn set_keep_alive(&self, on_failure: Option<KeepAliveCallback>) -> Result<()> {
        self.driver()?.set_keep_alive(on_failure);
        Ok(())
    }

    /// Local link state; sends nothing to the device
    pub async fn get_socket_status(&self) -> Result<SocketStatus> {
        Ok(self.driver()?.socket_status().await)
    }

    /// Send a raw command and return the device's reply frame
    pub async fn execute_command(&self, code: u16, payload: &[u8]) -> Result<Frame> {
        let result = self.driver()?.execute_command(code, payload).await;
        self.wrap("executeCmd", result)
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        let result = self.driver()?.get_users().await;
        self.wrap("getUsers", result)
    }

    /// Download the attendance log, handing each record to `on_record` as it
    /// is decoded
    pub async fn get_attendances(&self, on_record: RecordHandler<'_>) -> Result<Vec<Attendance>> {
        let result = self.driver()?.get_attendances(on_record).await;
        self.wrap("getAttendances", result)
    }

    /// Register for pushed events and deliver them until `on_event` breaks
    pub async fn get_real_time_logs(&self, on_event: EventHandler<'_>) -> Result<()> {
        let result = self.driver()?.get_real_time_logs(on_event).await;
        self.wrap("getRealTimeLogs", result)
    }

    pub async fn set_user(&self, user: &UserWrite) -> Result<()> {
        let result = self.driver()?.set_user(user).await;
        self.wrap("setUser", result)
    }

    /// Delete a user; `uid` is validated before anything is sent
    pub async fn delete_user<U>(&self, uid: U) -> Result<()>
    where
        U: TryInto<Uid, Error = zkwire_types::Error>,
    {
        let uid = uid
            .try_into()
            .map_err(|e| self.fail(self.tag("deleteUser"), e.into()))?;

        let result = self.driver()?.delete_user(uid).await;
        self.wrap("deleteUser", result)
    }

    pub async fn get_user_group(&self, uid: u16) -> Result<UserGroup> {
        let result = self.driver()?.get_user_group(uid).await;
        self.wrap("getUserGroup", result)
    }

    pub async fn set_user_group(&self, write: &UserGroupWrite) -> Result<()> {
        let result = self.driver()?.set_user_group(write).await;
        self.wrap("setUserGroup", result)
    }

    pub async fn get_timezone(&self, index: u32) -> Result<Timezone> {
        let result = self.driver()?.get_timezone(index).await;
        self.wrap("getTimezone", result)
    }

    pub async fn set_timezone(&self, write: &TimezoneWrite) -> Result<()> {
        let result = self.driver()?.set_timezone(write).await;
        self.wrap("setTimezone", result)
    }

    pub async fn get_user_timezones(&self, uid: u16) -> Result<UserTimezones> {
        let result = self.driver()?.get_user_timezones(uid).await;
        self.wrap("getUserTimezones", result)
    }

    pub async fn set_user_timezones(&self, write: &UserTimezoneWrite) -> Result<()> {
        let result = self.driver()?.set_user_timezones(write).await;
        self.wrap("setUserTimezones", result)
    }

    pub async fn get_group_timezones(&self, group: u8) -> Result<GroupTimezones> {
        let result = self.driver()?.get_group_timezones(group).await;
        self.wrap("getGroupTimezones", result)
    }

    pub async fn set_group_timezones(&self, write: &GroupTimezoneWrite) -> Result<()> {
        let result = self.driver()?.set_group_timezones(write).await;
        self.wrap("setGroupTimezones", result)
    }

    pub async fn open_door(&self) -> Result<()> {
        let result = self.driver()?.open_door().await;
        self.wrap("openDoor", result)
    }

    pub async fn restart_device(&self) -> Result<()> {
        warn!("Restarting device {}", self.config.ip);
        let result = self.driver()?.restart_device().await;
        self.wrap("restartDevice", result)
    }

    /// Resume normal operation
    pub async fn enable_device(&self) -> Result<()> {
        let result = self.driver()?.enable_device().await;
        self.wrap("enableDevice", result)
    }

    /// Lock the keypad and show "Working..." on the display
    pub async fn disable_device(&self) -> Result<()> {
        let result = self.driver()?.disable_device().await;
        self.wrap("disableDevice", result)
    }

    pub async fn get_info(&self) -> Result<DeviceInfo> {
        let result = self.driver()?.get_info().await;
        self.wrap("getInfo", result)
    }

    pub async fn clear_attendance_log(&self) -> Result<()> {
        let result = self.driver()?.clear_attendance_log().await;
        self.wrap("clearAttendanceLog", result)
    }

    pub async fn free_data(&self) -> Result<()> {
        let result = self.driver()?.free_data().await;
        self.wrap("freeData", result)
    }

    pub async fn refresh_data(&self) -> Result<()> {
        let result = self.driver()?.refresh_data().await;
        self.wrap("refreshData", result)
    }

    // Helper methods

    fn driver(&self) -> Result<&dyn Driver> {
        if self.driver.is_connected() {
            Ok(self.driver.as_ref())
        } else {
            Err(self.fail(format!("[{}]", self.transport()), TransportError::NotConnected))
        }
    }

    fn tag(&self, op: &str) -> String {
        format!("[{}] {}", self.transport(), op)
    }

    fn fail(&self, tag: impl Into<String>, source: TransportError) -> Error {
        Error::new(tag, self.config.ip.clone(), source)
    }

    fn wrap<R>(&self, op: &str, result: zkwire_transport::Result<R>) -> Result<R> {
        result.map_err(|e| self.fail(self.tag(op), e))
    }
}
