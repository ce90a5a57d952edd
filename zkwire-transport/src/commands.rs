//! Device operations shared by every driver
//!
//! Implementors supply raw command execution, buffered reads and event
//! delivery; the entity operations are provided on top of those.

use std::ops::ControlFlow;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zkwire_core::constants::data_types::{FCT_NONE, FCT_USER};
use zkwire_core::constants::events::LISTEN_MASK;
use zkwire_core::constants::DEFAULT_UNLOCK_TENTHS;
use zkwire_core::{Command, Frame};
use zkwire_types::attendance::{ATTENDANCE16_SIZE, ATTENDANCE40_SIZE};
use zkwire_types::user::{USER28_SIZE, USER72_SIZE};
use zkwire_types::{
    Attendance, DeviceInfo, GroupTimezoneWrite, GroupTimezones, RealTimeEvent, Timezone,
    TimezoneWrite, Uid, User, UserGroup, UserGroupWrite, UserTimezoneWrite, UserTimezones,
    UserWrite,
};

use crate::keepalive::KeepAliveState;
use crate::{TransportKind, error::*};

/// Size prefix in front of every buffered data set
const DATA_SIZE_PREFIX: usize = 4;

/// Local view of a link, gathered without touching the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketStatus {
    pub transport: TransportKind,
    pub remote_addr: String,
    pub connected: bool,
    pub session_id: u16,
    pub reply_id: u16,
    pub keep_alive: Option<KeepAliveState>,
    pub missed_keep_alives: u8,
}

/// Callback receiving each decoded real-time event
pub type EventHandler<'a> = &'a mut (dyn FnMut(RealTimeEvent) -> ControlFlow<()> + Send);

/// Callback receiving each attendance record as it is decoded
pub type RecordHandler<'a> = &'a mut (dyn FnMut(&Attendance) + Send);

/// Callback told once that keep-alive probing gave up
pub type KeepAliveCallback = Box<dyn FnOnce(Error) + Send + 'static>;

#[async_trait]
pub trait DeviceCommands: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Send one command and return the device's reply as-is
    async fn execute_command(&self, code: u16, payload: &[u8]) -> Result<Frame>;

    /// Download a data set through the device's transfer buffer
    async fn read_with_buffer(&self, command: Command, fct: u32) -> Result<Bytes>;

    /// Deliver pushed events until the handler breaks; frames that do not
    /// decode are skipped
    async fn listen_events(&self, on_event: EventHandler<'_>) -> Result<()>;

    /// Send a command and fail on an error acknowledgement
    async fn command(&self, command: Command, payload: &[u8]) -> Result<Frame> {
        let reply = self.execute_command(command.into(), payload).await?;
        if reply.is_error() || reply.command() == Some(Command::AckUnauth) {
            return Err(Error::device(command.into(), reply.code));
        }
        Ok(reply)
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        let data = self.read_with_buffer(Command::UserTempRrq, FCT_USER).await?;

        let users = match self.kind() {
            TransportKind::Tcp => records(&data, USER72_SIZE)
                .map(User::decode72)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            TransportKind::Udp => records(&data, USER28_SIZE)
                .map(User::decode28)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        debug!("Decoded {} users", users.len());
        Ok(users)
    }

    /// Read the attendance log, handing each record to `on_record` as well
    async fn get_attendances(&self, on_record: RecordHandler<'_>) -> Result<Vec<Attendance>> {
        let data = self.read_with_buffer(Command::AttLogRrq, FCT_NONE).await?;

        let (size, decode): (usize, fn(&[u8]) -> zkwire_types::Result<Attendance>) =
            match self.kind() {
                TransportKind::Tcp => (ATTENDANCE40_SIZE, Attendance::decode40),
                TransportKind::Udp => (ATTENDANCE16_SIZE, Attendance::decode16),
            };

        let mut out = Vec::new();
        for raw in records(&data, size) {
            let record = decode(raw)?;
            on_record(&record);
            out.push(record);
        }

        debug!("Decoded {} attendance records", out.len());
        Ok(out)
    }

    /// Register for attendance, verify and alarm events, then listen
    async fn get_real_time_logs(&self, on_event: EventHandler<'_>) -> Result<()> {
        self.command(Command::RegEvent, &LISTEN_MASK.to_le_bytes())
            .await?;
        self.listen_events(on_event).await
    }

    async fn set_user(&self, user: &UserWrite) -> Result<()> {
        let payload = user.encode72()?;
        self.command(Command::UserWrq, &payload).await?;
        Ok(())
    }

    async fn delete_user(&self, uid: Uid) -> Result<()> {
        self.command(Command::DeleteUser, &uid.to_le_bytes())
            .await?;
        Ok(())
    }

    async fn get_user_group(&self, uid: u16) -> Result<UserGroup> {
        let reply = self
            .command(Command::UserGrpRrq, &u32::from(uid).to_le_bytes())
            .await?;
        Ok(UserGroup::decode(&reply.payload))
    }

    async fn set_user_group(&self, write: &UserGroupWrite) -> Result<()> {
        self.command(Command::UserGrpWrq, &write.encode()?).await?;
        Ok(())
    }

    async fn get_timezone(&self, index: u32) -> Result<Timezone> {
        let reply = self.command(Command::TzRrq, &index.to_le_bytes()).await?;
        Ok(Timezone::decode(&reply.payload, index))
    }

    async fn set_timezone(&self, write: &TimezoneWrite) -> Result<()> {
        self.command(Command::TzWrq, &write.encode()?).await?;
        Ok(())
    }

    async fn get_user_timezones(&self, uid: u16) -> Result<UserTimezones> {
        let reply = self
            .command(Command::UserTzRrq, &u32::from(uid).to_le_bytes())
            .await?;
        Ok(UserTimezones::decode(&reply.payload)?)
    }

    async fn set_user_timezones(&self, write: &UserTimezoneWrite) -> Result<()> {
        self.command(Command::UserTzWrq, &write.encode()?).await?;
        Ok(())
    }

    async fn get_group_timezones(&self, group: u8) -> Result<GroupTimezones> {
        let reply = self
            .command(Command::GrpTzRrq, &u32::from(group).to_le_bytes())
            .await?;
        Ok(GroupTimezones::decode(&reply.payload)?)
    }

    async fn set_group_timezones(&self, write: &GroupTimezoneWrite) -> Result<()> {
        self.command(Command::GrpTzWrq, &write.encode()?).await?;
        Ok(())
    }

    /// Release the door lock for the default hold time
    async fn open_door(&self) -> Result<()> {
        self.command(Command::Unlock, &DEFAULT_UNLOCK_TENTHS.to_le_bytes())
            .await?;
        Ok(())
    }

    async fn restart_device(&self) -> Result<()> {
        self.command(Command::Restart, &[]).await?;
        Ok(())
    }

    async fn enable_device(&self) -> Result<()> {
        self.command(Command::EnableDevice, &[]).await?;
        Ok(())
    }

    async fn disable_device(&self) -> Result<()> {
        self.command(Command::DisableDevice, &[]).await?;
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        let reply = self.command(Command::GetFreeSizes, &[]).await?;
        Ok(DeviceInfo::decode(&reply.payload)?)
    }

    async fn clear_attendance_log(&self) -> Result<()> {
        self.command(Command::ClearAttLog, &[]).await?;
        Ok(())
    }

    async fn free_data(&self) -> Result<()> {
        self.command(Command::FreeData, &[]).await?;
        Ok(())
    }

    async fn refresh_data(&self) -> Result<()> {
        self.command(Command::RefreshData, &[]).await?;
        Ok(())
    }
}

/// A connectable link to one device
#[async_trait]
pub trait Driver: DeviceCommands {
    /// Open the socket and establish a session
    async fn connect(&self) -> Result<()>;

    /// Close the session and the socket; safe to call when already closed
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn remote_addr(&self) -> String;

    /// Link state as known locally; waits for any in-flight command
    async fn socket_status(&self) -> SocketStatus;

    /// Start keep-alive probing with `Some`, stop it with `None`
    ///
    /// Probing only runs on a connected UDP link. The callback runs once
    /// when the device stops answering; it is never followed by an
    /// automatic reconnect.
    fn set_keep_alive(&self, on_failure: Option<KeepAliveCallback>);
}

/// Fixed-size records following the size prefix; a trailing partial record
/// is ignored
fn records(data: &[u8], size: usize) -> impl Iterator<Item = &[u8]> {
    data.get(DATA_SIZE_PREFIX..)
        .unwrap_or_default()
        .chunks_exact(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use chrono::Weekday;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use zkwire_core::frame::build_frame;
    use zkwire_core::Session;
    use zkwire_types::timezone::DaySegment;

    /// Records every command and answers from a script (`CMD_ACK_OK` once
    /// the script runs out)
    struct Recorder {
        kind: TransportKind,
        calls: Mutex<Vec<(u16, Vec<u8>)>>,
        replies: Mutex<VecDeque<Frame>>,
        buffered: Bytes,
    }

    impl Recorder {
        fn new(kind: TransportKind) -> Self {
            Self {
                kind,
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(VecDeque::new()),
                buffered: Bytes::new(),
            }
        }

        fn reply_with(self, code: Command, payload: &[u8]) -> Self {
            let raw = build_frame(code.into(), &mut Session::with_ids(1, 0), payload);
            self.replies.lock().push_back(Frame::decode(raw).unwrap());
            self
        }

        fn calls(&self) -> Vec<(u16, Vec<u8>)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl DeviceCommands for Recorder {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn execute_command(&self, code: u16, payload: &[u8]) -> Result<Frame> {
            self.calls.lock().push((code, payload.to_vec()));
            let next = self.replies.lock().pop_front();
            Ok(next.unwrap_or_else(|| {
                let raw = build_frame(Command::AckOk.into(), &mut Session::with_ids(1, 0), &[]);
                Frame::decode(raw).unwrap()
            }))
        }

        async fn read_with_buffer(&self, command: Command, fct: u32) -> Result<Bytes> {
            let mut payload = BytesMut::new();
            payload.extend_from_slice(&fct.to_le_bytes());
            self.calls.lock().push((command.into(), payload.to_vec()));
            Ok(self.buffered.clone())
        }

        async fn listen_events(&self, _on_event: EventHandler<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn code(command: Command) -> u16 {
        command.into()
    }

    #[tokio::test]
    async fn test_set_user_sends_72_byte_record() {
        let zk = Recorder::new(TransportKind::Udp);
        let user = UserWrite::new(99).with_user_id("U99").with_name("Front Desk");

        zk.set_user(&user).await.unwrap();

        let calls = zk.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, code(Command::UserWrq));
        assert_eq!(calls[0].1.len(), 72);
        assert_eq!(&calls[0].1[0..2], &99u16.to_le_bytes());
    }

    #[tokio::test]
    async fn test_delete_user_writes_uid() {
        let zk = Recorder::new(TransportKind::Tcp);
        zk.delete_user(Uid::try_from(321).unwrap()).await.unwrap();

        assert_eq!(
            zk.calls(),
            vec![(code(Command::DeleteUser), 321u16.to_le_bytes().to_vec())]
        );
    }

    #[tokio::test]
    async fn test_refresh_data() {
        let zk = Recorder::new(TransportKind::Udp);
        zk.refresh_data().await.unwrap();
        assert_eq!(zk.calls()[0].0, code(Command::RefreshData));
    }

    #[tokio::test]
    async fn test_user_group_round_trip() {
        let zk = Recorder::new(TransportKind::Udp).reply_with(Command::AckOk, &[6]);

        let group = zk.get_user_group(42).await.unwrap();
        assert_eq!(group.group, 6);

        zk.set_user_group(&UserGroupWrite::new(23, 4)).await.unwrap();

        let calls = zk.calls();
        assert_eq!(calls[0], (code(Command::UserGrpRrq), 42u32.to_le_bytes().to_vec()));
        assert_eq!(calls[1].0, code(Command::UserGrpWrq));
        assert_eq!(calls[1].1[0], 23);
        assert_eq!(calls[1].1[4], 4);
    }

    #[tokio::test]
    async fn test_timezone_commands() {
        let mut tz = vec![0u8; 32];
        tz[0] = 5;
        let zk = Recorder::new(TransportKind::Udp).reply_with(Command::AckOk, &tz);

        let timezone = zk.get_timezone(5).await.unwrap();
        assert_eq!(timezone.index, 5);

        let write = TimezoneWrite::new(2).with_day(Weekday::Sun, DaySegment::new(8, 0, 17, 0));
        zk.set_timezone(&write).await.unwrap();

        let calls = zk.calls();
        assert_eq!(calls[0], (code(Command::TzRrq), 5u32.to_le_bytes().to_vec()));
        assert_eq!(calls[1].0, code(Command::TzWrq));
        assert_eq!(calls[1].1.len(), 32);
        assert_eq!(&calls[1].1[0..4], &2u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_user_and_group_timezone_commands() {
        let zk = Recorder::new(TransportKind::Udp)
            .reply_with(Command::AckOk, &[1, 0, 10, 0, 0, 0, 0, 0])
            .reply_with(Command::AckOk, &[])
            .reply_with(Command::AckOk, &[4, 1, 0, 0, 0, 0, 0, 0]);

        let user_tz = zk.get_user_timezones(12).await.unwrap();
        assert!(user_tz.use_group_timezones);

        zk.set_user_timezones(&UserTimezoneWrite::new(12).with_timezones([1, 2, 3]))
            .await
            .unwrap();

        let group_tz = zk.get_group_timezones(4).await.unwrap();
        assert_eq!(group_tz.group, 4);
        assert_eq!(group_tz.timezones, [1, 0, 0]);

        zk.set_group_timezones(
            &GroupTimezoneWrite::new(4)
                .with_timezones([2, 3, 0])
                .with_verify_style(1),
        )
        .await
        .unwrap();

        let calls = zk.calls();
        assert_eq!(calls[0], (code(Command::UserTzRrq), 12u32.to_le_bytes().to_vec()));
        assert_eq!(calls[1].0, code(Command::UserTzWrq));
        assert_eq!(calls[1].1.len(), 20);
        assert_eq!(calls[2].0, code(Command::GrpTzRrq));
        assert_eq!(calls[2].1[0], 4);
        assert_eq!(calls[3].0, code(Command::GrpTzWrq));
        assert_eq!(calls[3].1.len(), 8);
    }

    #[tokio::test]
    async fn test_error_ack_is_a_device_error() {
        let zk = Recorder::new(TransportKind::Udp).reply_with(Command::AckError, &[]);
        let err = zk.enable_device().await.unwrap_err();
        assert!(matches!(err, Error::Device { .. }));
    }

    #[tokio::test]
    async fn test_short_group_timezone_reply() {
        let zk = Recorder::new(TransportKind::Udp).reply_with(Command::AckOk, &[4, 1]);
        let err = zk.get_group_timezones(4).await.unwrap_err();
        assert!(matches!(err, Error::Codec(zkwire_types::Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_open_door_and_info() {
        let mut sizes = vec![0u8; 80];
        sizes[16] = 3;
        sizes[32] = 20;
        sizes[64..68].copy_from_slice(&1000u32.to_le_bytes());
        let zk = Recorder::new(TransportKind::Tcp).reply_with(Command::AckOk, &[]).reply_with(Command::AckOk, &sizes);

        zk.open_door().await.unwrap();
        let info = zk.get_info().await.unwrap();

        assert_eq!(info.user_counts, 3);
        assert_eq!(info.log_counts, 20);
        assert_eq!(info.log_capacity, 1000);

        let calls = zk.calls();
        assert_eq!(calls[0], (code(Command::Unlock), 30u32.to_le_bytes().to_vec()));
        assert_eq!(calls[1], (code(Command::GetFreeSizes), vec![]));
    }

    #[tokio::test]
    async fn test_get_users_decodes_by_transport() {
        let mut udp = Recorder::new(TransportKind::Udp);
        let mut data = vec![0u8; 4 + 2 * USER28_SIZE];
        data[0..4].copy_from_slice(&((2 * USER28_SIZE) as u32).to_le_bytes());
        data[4] = 7;
        data[4 + USER28_SIZE] = 8;
        udp.buffered = Bytes::from(data);

        let users = udp.get_users().await.unwrap();
        assert_eq!(users.iter().map(|u| u.uid).collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(udp.calls()[0], (code(Command::UserTempRrq), FCT_USER.to_le_bytes().to_vec()));

        let mut tcp = Recorder::new(TransportKind::Tcp);
        let mut data = vec![0u8; 4 + USER72_SIZE];
        data[4] = 9;
        data[4 + 11..4 + 14].copy_from_slice(b"Ann");
        tcp.buffered = Bytes::from(data);

        let users = tcp.get_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ann");
    }

    #[tokio::test]
    async fn test_get_attendances_streams_records() {
        let mut zk = Recorder::new(TransportKind::Udp);
        let mut data = vec![0u8; 4 + 3 * ATTENDANCE16_SIZE + 5];
        for i in 0..3 {
            data[4 + i * ATTENDANCE16_SIZE] = 10 + i as u8;
        }
        zk.buffered = Bytes::from(data);

        let mut seen = Vec::new();
        let records = zk
            .get_attendances(&mut |r: &Attendance| seen.push(r.user_id.clone()))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(seen, vec!["10", "11", "12"]);
    }

    #[tokio::test]
    async fn test_real_time_logs_register_mask() {
        let zk = Recorder::new(TransportKind::Tcp);
        zk.get_real_time_logs(&mut |_: RealTimeEvent| ControlFlow::Break(()))
            .await
            .unwrap();

        assert_eq!(
            zk.calls(),
            vec![(code(Command::RegEvent), LISTEN_MASK.to_le_bytes().to_vec())]
        );
    }
}
