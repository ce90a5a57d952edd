//! Real-time events pushed by the device after `CMD_REG_EVENT`
//!
//! Event frames reuse the header's session-id slot (u16 at offset 4) as the
//! event type, so the decoder works on the whole unwrapped frame.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use chrono::NaiveDateTime;
use zkwire_core::constants::events::{EF_ALARM, EF_ATTLOG, EF_VERIFY};

use crate::datetime::decode_date_bytes;
use crate::error::{Error, Result};

const EVENT_TYPE_OFFSET: usize = 4;
const ALARM_FRAME_SIZE: usize = 16;
const REJECTED_SERIAL: [u8; 4] = [0xFF; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmType {
    ExitButton,
    DoorState,
    Tamper,
    Misoperation,
    Unknown(u8),
}

impl From<u8> for AlarmType {
    fn from(value: u8) -> Self {
        match value {
            0x35 => Self::ExitButton,
            0x36 => Self::DoorState,
            0x37 => Self::Tamper,
            0x3a => Self::Misoperation,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitButton => f.write_str("exit_button"),
            Self::DoorState => f.write_str("door_state"),
            Self::Tamper => f.write_str("tamper"),
            Self::Misoperation => f.write_str("misoperation"),
            Self::Unknown(code) => write!(f, "unknown (0x{code:02x})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    DoorLeftOpen,
    DoorNotClosed,
    DoorClosed,
    Unknown(u8),
}

impl From<u8> for AlarmEvent {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::DoorLeftOpen,
            0x04 => Self::DoorNotClosed,
            0x05 => Self::DoorClosed,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoorLeftOpen => f.write_str("door_left_open"),
            Self::DoorNotClosed => f.write_str("door_not_closed"),
            Self::DoorClosed => f.write_str("door_closed"),
            Self::Unknown(code) => write!(f, "unknown (0x{code:02x})"),
        }
    }
}

/// Decoded real-time event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealTimeEvent {
    /// Fingerprint check; `None` when the device rejected the finger
    FingerprintVerify { user_serial: Option<u32> },

    AttendanceLog {
        user_serial: u16,
        verify_type: u8,
        verify_state: u8,
        timestamp: NaiveDateTime,
    },

    /// `alarm_event` is only reported by 16-byte door alarms
    Alarm {
        alarm_type: AlarmType,
        alarm_event: Option<AlarmEvent>,
    },

    Unknown { event_type: u16, raw: Bytes },
}

impl RealTimeEvent {
    pub fn event_type(&self) -> u16 {
        match self {
            Self::FingerprintVerify { .. } => EF_VERIFY as u16,
            Self::AttendanceLog { .. } => EF_ATTLOG as u16,
            Self::Alarm { .. } => EF_ALARM as u16,
            Self::Unknown { event_type, .. } => *event_type,
        }
    }
}

/// Decode an event frame (header included, envelope stripped)
pub fn decode_real_time_event(frame: &[u8]) -> Result<RealTimeEvent> {
    Error::ensure_len("event frame", frame, EVENT_TYPE_OFFSET + 2)?;
    let event_type = LittleEndian::read_u16(&frame[EVENT_TYPE_OFFSET..EVENT_TYPE_OFFSET + 2]);

    match u32::from(event_type) {
        EF_VERIFY => decode_verify(frame),
        EF_ATTLOG => decode_attendance(frame),
        EF_ALARM => decode_alarm(frame),
        _ => Ok(RealTimeEvent::Unknown {
            event_type,
            raw: Bytes::copy_from_slice(frame),
        }),
    }
}

fn decode_verify(frame: &[u8]) -> Result<RealTimeEvent> {
    if frame.windows(4).any(|w| w == REJECTED_SERIAL) {
        return Ok(RealTimeEvent::FingerprintVerify { user_serial: None });
    }

    Error::ensure_len("verify event", frame, 12)?;
    Ok(RealTimeEvent::FingerprintVerify {
        user_serial: Some(LittleEndian::read_u32(&frame[8..12])),
    })
}

fn decode_attendance(frame: &[u8]) -> Result<RealTimeEvent> {
    Error::ensure_len("attendance event", frame, 18)?;

    Ok(RealTimeEvent::AttendanceLog {
        user_serial: LittleEndian::read_u16(&frame[8..10]),
        verify_type: frame[10],
        verify_state: frame[11],
        timestamp: decode_date_bytes(&frame[12..18])?,
    })
}

fn decode_alarm(frame: &[u8]) -> Result<RealTimeEvent> {
    Error::ensure_len("alarm event", frame, 9)?;

    let alarm_event = (frame.len() == ALARM_FRAME_SIZE).then(|| AlarmEvent::from(frame[12]));
    Ok(RealTimeEvent::Alarm {
        alarm_type: AlarmType::from(frame[8]),
        alarm_event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn event_frame(event_type: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xF4, 0x01, 0, 0, 0, 0, 0, 0];
        LittleEndian::write_u16(&mut frame[4..6], event_type);
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn test_attendance_event() {
        let frame = event_frame(EF_ATTLOG as u16, &[0x2A, 0x00, 1, 0, 24, 6, 15, 9, 41, 7]);

        let event = decode_real_time_event(&frame).unwrap();
        assert_eq!(
            event,
            RealTimeEvent::AttendanceLog {
                user_serial: 42,
                verify_type: 1,
                verify_state: 0,
                timestamp: NaiveDate::from_ymd_opt(2024, 6, 15)
                    .unwrap()
                    .and_hms_opt(9, 41, 7)
                    .unwrap(),
            }
        );
        assert_eq!(event.event_type(), 1);
    }

    #[test]
    fn test_verify_event() {
        let accepted = event_frame(EF_VERIFY as u16, &[7, 0, 0, 0]);
        assert_eq!(
            decode_real_time_event(&accepted).unwrap(),
            RealTimeEvent::FingerprintVerify {
                user_serial: Some(7)
            }
        );

        let rejected = event_frame(EF_VERIFY as u16, &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            decode_real_time_event(&rejected).unwrap(),
            RealTimeEvent::FingerprintVerify { user_serial: None }
        );
    }

    #[test]
    fn test_alarm_event() {
        let door = event_frame(EF_ALARM as u16, &[0x36, 0, 0, 0, 0x05, 0, 0, 0]);
        assert_eq!(door.len(), 16);
        assert_eq!(
            decode_real_time_event(&door).unwrap(),
            RealTimeEvent::Alarm {
                alarm_type: AlarmType::DoorState,
                alarm_event: Some(AlarmEvent::DoorClosed),
            }
        );

        let tamper = event_frame(EF_ALARM as u16, &[0x37, 0, 0, 0]);
        assert_eq!(
            decode_real_time_event(&tamper).unwrap(),
            RealTimeEvent::Alarm {
                alarm_type: AlarmType::Tamper,
                alarm_event: None,
            }
        );

        assert_eq!(AlarmType::from(0x99).to_string(), "unknown (0x99)");
        assert_eq!(AlarmEvent::DoorLeftOpen.to_string(), "door_left_open");
    }

    #[test]
    fn test_unknown_event_keeps_raw_frame() {
        let frame = event_frame(0x0400, &[1, 2, 3]);
        assert_eq!(
            decode_real_time_event(&frame).unwrap(),
            RealTimeEvent::Unknown {
                event_type: 0x0400,
                raw: Bytes::from(frame.clone()),
            }
        );
    }

    #[test]
    fn test_truncated_event_frames() {
        assert!(matches!(
            decode_real_time_event(&[0xF4, 0x01, 0, 0]),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            decode_real_time_event(&event_frame(EF_ATTLOG as u16, &[1, 0, 0])),
            Err(Error::Malformed { .. })
        ));
    }
}
