//! Record model and binary codecs for zkwire
//!
//! Every codec is a pure function over byte slices; nothing here touches a
//! socket.

pub mod attendance;
pub mod datetime;
pub mod device_info;
pub mod error;
pub mod event;
mod field;
pub mod group;
pub mod timezone;
pub mod user;

pub use attendance::Attendance;
pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use event::{AlarmEvent, AlarmType, RealTimeEvent, decode_real_time_event};
pub use group::{GroupTimezoneWrite, GroupTimezones, UserGroup, UserGroupWrite};
pub use timezone::{DaySegment, Timezone, TimezoneWrite, UserTimezoneWrite, UserTimezones};
pub use user::{Permission, Role, Uid, User, UserWrite};
