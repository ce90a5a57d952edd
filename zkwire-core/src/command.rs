//! Protocol command codes

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// Values are shared with the device firmware and must not change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    // Connection commands
    Connect = 1000,
    Exit = 1001,
    EnableDevice = 1002,
    DisableDevice = 1003,
    Restart = 1004,
    RefreshData = 1013,

    // Data transfer
    PrepareData = 1500,
    Data = 1501,
    FreeData = 1502,
    DataWrrq = 1503,
    DataRdy = 1504,

    // Database operations
    UserWrq = 8,
    UserTempRrq = 9,
    AttLogRrq = 13,
    ClearAttLog = 15,
    DeleteUser = 18,

    // Group & timezone management
    UserGrpRrq = 21,
    UserGrpWrq = 22,
    UserTzRrq = 23,
    UserTzWrq = 24,
    GrpTzRrq = 25,
    GrpTzWrq = 26,
    TzRrq = 27,
    TzWrq = 28,
    Unlock = 31,

    // Device status
    GetFreeSizes = 50,
    GetTime = 201,

    // Real-time events
    RegEvent = 500,

    // Response commands (from device)
    AckOk = 2000,
    AckError = 2001,
    AckData = 2002,
    AckRetry = 2003,
    AckRepeat = 2004,
    AckUnauth = 2005,
    AckUnknown = 0xFFFF,
    AckErrorCmd = 0xFFFD,
    AckErrorInit = 0xFFFC,
    AckErrorData = 0xFFFB,
}

impl Command {
    /// Check if this is a response command (from device to PC)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::AckOk
                | Self::AckError
                | Self::AckData
                | Self::AckRetry
                | Self::AckRepeat
                | Self::AckUnauth
                | Self::AckUnknown
                | Self::AckErrorCmd
                | Self::AckErrorInit
                | Self::AckErrorData
        )
    }

    /// Check if this is a success response
    pub fn is_success(self) -> bool {
        matches!(self, Self::AckOk | Self::AckData)
    }

    /// Check if this is an error response
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::AckError
                | Self::AckErrorCmd
                | Self::AckErrorInit
                | Self::AckErrorData
        )
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "CMD_CONNECT",
            Self::Exit => "CMD_EXIT",
            Self::EnableDevice => "CMD_ENABLEDEVICE",
            Self::DisableDevice => "CMD_DISABLEDEVICE",
            Self::Restart => "CMD_RESTART",
            Self::RefreshData => "CMD_REFRESHDATA",
            Self::PrepareData => "CMD_PREPARE_DATA",
            Self::Data => "CMD_DATA",
            Self::FreeData => "CMD_FREE_DATA",
            Self::DataWrrq => "CMD_DATA_WRRQ",
            Self::DataRdy => "CMD_DATA_RDY",
            Self::UserWrq => "CMD_USER_WRQ",
            Self::UserTempRrq => "CMD_USERTEMP_RRQ",
            Self::AttLogRrq => "CMD_ATTLOG_RRQ",
            Self::ClearAttLog => "CMD_CLEAR_ATTLOG",
            Self::DeleteUser => "CMD_DELETE_USER",
            Self::UserGrpRrq => "CMD_USERGRP_RRQ",
            Self::UserGrpWrq => "CMD_USERGRP_WRQ",
            Self::UserTzRrq => "CMD_USERTZ_RRQ",
            Self::UserTzWrq => "CMD_USERTZ_WRQ",
            Self::GrpTzRrq => "CMD_GRPTZ_RRQ",
            Self::GrpTzWrq => "CMD_GRPTZ_WRQ",
            Self::TzRrq => "CMD_TZ_RRQ",
            Self::TzWrq => "CMD_TZ_WRQ",
            Self::Unlock => "CMD_UNLOCK",
            Self::GetFreeSizes => "CMD_GET_FREE_SIZES",
            Self::GetTime => "CMD_GET_TIME",
            Self::RegEvent => "CMD_REG_EVENT",
            Self::AckOk => "CMD_ACK_OK",
            Self::AckError => "CMD_ACK_ERROR",
            Self::AckData => "CMD_ACK_DATA",
            Self::AckRetry => "CMD_ACK_RETRY",
            Self::AckRepeat => "CMD_ACK_REPEAT",
            Self::AckUnauth => "CMD_ACK_UNAUTH",
            Self::AckUnknown => "CMD_ACK_UNKNOWN",
            Self::AckErrorCmd => "CMD_ACK_ERROR_CMD",
            Self::AckErrorInit => "CMD_ACK_ERROR_INIT",
            Self::AckErrorData => "CMD_ACK_ERROR_DATA",
        }
    }

    /// Name for a raw code, including codes this table does not know
    pub fn describe(code: u16) -> String {
        match Self::try_from(code) {
            Ok(cmd) => cmd.to_string(),
            Err(_) => format!("CMD_UNKNOWN({})", code),
        }
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl TryFrom<u16> for Command {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            1000 => Ok(Self::Connect),
            1001 => Ok(Self::Exit),
            1002 => Ok(Self::EnableDevice),
            1003 => Ok(Self::DisableDevice),
            1004 => Ok(Self::Restart),
            1013 => Ok(Self::RefreshData),
            1500 => Ok(Self::PrepareData),
            1501 => Ok(Self::Data),
            1502 => Ok(Self::FreeData),
            1503 => Ok(Self::DataWrrq),
            1504 => Ok(Self::DataRdy),
            8 => Ok(Self::UserWrq),
            9 => Ok(Self::UserTempRrq),
            13 => Ok(Self::AttLogRrq),
            15 => Ok(Self::ClearAttLog),
            18 => Ok(Self::DeleteUser),
            21 => Ok(Self::UserGrpRrq),
            22 => Ok(Self::UserGrpWrq),
            23 => Ok(Self::UserTzRrq),
            24 => Ok(Self::UserTzWrq),
            25 => Ok(Self::GrpTzRrq),
            26 => Ok(Self::GrpTzWrq),
            27 => Ok(Self::TzRrq),
            28 => Ok(Self::TzWrq),
            31 => Ok(Self::Unlock),
            50 => Ok(Self::GetFreeSizes),
            201 => Ok(Self::GetTime),
            500 => Ok(Self::RegEvent),
            2000 => Ok(Self::AckOk),
            2001 => Ok(Self::AckError),
            2002 => Ok(Self::AckData),
            2003 => Ok(Self::AckRetry),
            2004 => Ok(Self::AckRepeat),
            2005 => Ok(Self::AckUnauth),
            0xFFFF => Ok(Self::AckUnknown),
            0xFFFD => Ok(Self::AckErrorCmd),
            0xFFFC => Ok(Self::AckErrorInit),
            0xFFFB => Ok(Self::AckErrorData),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u16::from(Command::Connect), 1000);
        assert_eq!(Command::try_from(1000).unwrap(), Command::Connect);
        assert_eq!(Command::try_from(1503).unwrap(), Command::DataWrrq);
    }

    #[test]
    fn test_command_is_response() {
        assert!(Command::AckOk.is_response());
        assert!(!Command::Connect.is_response());
    }

    #[test]
    fn test_command_is_success() {
        assert!(Command::AckOk.is_success());
        assert!(Command::AckData.is_success());
        assert!(!Command::AckError.is_success());
        assert!(Command::AckErrorData.is_error());
    }

    #[test]
    fn test_unknown_command() {
        let result = Command::try_from(9999);
        assert!(matches!(result, Err(Error::UnknownCommand(9999))));
        assert_eq!(Command::describe(9999), "CMD_UNKNOWN(9999)");
        assert_eq!(Command::describe(500), "CMD_REG_EVENT(500)");
    }
}
