//! # zkwire
//!
//! Client for the binary control protocol spoken by ZK biometric
//! access-control and attendance terminals.
//!
//! ## Features
//!
//! - TCP (enveloped) and UDP (bare datagram) transports
//! - Users, groups, timezones and attendance logs as typed records
//! - Real-time attendance, verify and alarm events
//! - Keep-alive supervision for UDP links
//!
//! ## Quick Start
//!
//! ```no_run
//! use zkwire::Device;
//!
//! #[tokio::main]
//! async fn main() -> zkwire::Result<()> {
//!     let device = Device::new("192.168.1.201", 4370);
//!
//!     if !device.connect().await? {
//!         // refused; try again later
//!         return Ok(());
//!     }
//!
//!     for user in device.get_users().await? {
//!         println!("{} {}", user.uid, user.name);
//!     }
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;

pub use config::DeviceConfig;
pub use device::Device;
pub use error::{Error, ErrorKind, Result};

pub use zkwire_core::{Command, Frame};
pub use zkwire_transport::{
    Error as TransportError, KeepAliveCallback, KeepAliveState, SocketStatus, TransportKind,
};
pub use zkwire_types::{
    AlarmEvent, AlarmType, Attendance, DaySegment, DeviceInfo, GroupTimezoneWrite,
    GroupTimezones, Permission, RealTimeEvent, Role, Timezone, TimezoneWrite, Uid, User,
    UserGroup, UserGroupWrite, UserTimezoneWrite, UserTimezones, UserWrite,
};
