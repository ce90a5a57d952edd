//! Frame structure, TCP envelope and header decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{ENVELOPE_SIZE, TCP_MAGIC},
    error::{Error, Result},
    session::Session,
};

/// Protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Command   │  Checksum   │  SessionID  │  ReplyID    │   Payload   │
/// │   2 bytes   │   2 bytes   │   2 bytes   │   2 bytes   │   N bytes   │
/// │ (LE u16)    │  (LE u16)   │  (LE u16)   │  (LE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// On TCP every frame is additionally wrapped in an 8-byte envelope:
///
/// ```text
/// ┌──────────────────────┬──────────────┬────────────┬──────────────┐
/// │ Magic 50 50 82 7D    │ Length (u16) │  Reserved  │    Frame     │
/// │       4 bytes        │   2 bytes    │  2 bytes   │   N bytes    │
/// └──────────────────────┴──────────────┴────────────┴──────────────┘
/// ```
///
/// For unsolicited `CMD_REG_EVENT` frames the session-id slot carries the
/// event type instead.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command or reply code
    pub code: u16,

    /// Checksum as carried on the wire
    pub checksum: u16,

    /// Session identifier (event type for event frames)
    pub session_id: u16,

    /// Reply number
    pub reply_id: u16,

    /// Command-specific data
    pub payload: Bytes,
}

impl Frame {
    /// Frame header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Maximum payload that still fits the envelope's u16 length field
    pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - Self::HEADER_SIZE;

    /// Decode a bare frame
    ///
    /// The checksum is read but not validated; see [`Frame::verify_checksum`].
    ///
    /// # Examples
    ///
    /// ```
    /// use zkwire_core::{frame, Command, Frame, Session};
    ///
    /// let mut session = Session::with_ids(7, 0);
    /// let encoded = frame::build_frame(Command::Connect.into(), &mut session, &[]);
    ///
    /// let decoded = Frame::decode(encoded).unwrap();
    /// assert_eq!(decoded.command(), Some(Command::Connect));
    /// assert_eq!(decoded.reply_id, 1);
    /// ```
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::MalformedFrame {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let code = buf.get_u16_le();
        let checksum = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        Ok(Self {
            code,
            checksum,
            session_id,
            reply_id,
            payload: buf.freeze(),
        })
    }

    /// Encode the frame exactly as held, checksum field included
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u16_le(self.code);
        buf.put_u16_le(self.checksum);
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);
        buf.put_slice(&self.payload);

        buf
    }

    /// Recompute the checksum with the field zeroed and compare
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = checksum::calculate_zeroed(&self.encode());
        if expected != self.checksum {
            return Err(Error::ChecksumMismatch {
                expected,
                received: self.checksum,
            });
        }
        Ok(())
    }

    /// Known command for this frame's code
    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.code).ok()
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.command().is_some_and(Command::is_success)
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        self.command().is_some_and(Command::is_error)
    }

    /// Check if this is an unsolicited event frame
    pub fn is_event(&self) -> bool {
        self.code == u16::from(Command::RegEvent)
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("code", &Command::describe(self.code))
            .field("checksum", &format!("0x{:04X}", self.checksum))
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &self.reply_id)
            .field("payload", &hex::encode(&self.payload[..self.payload.len().min(32)]))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](session={}, reply={}, len={})",
            Command::describe(self.code),
            self.session_id,
            self.reply_id,
            self.payload.len()
        )
    }
}

/// Bare frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command_id: u16,
    pub checksum: u16,
    pub session_id: u16,
    pub reply_id: u16,
}

impl FrameHeader {
    /// Decode the first 8 bytes of a bare frame
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Frame::HEADER_SIZE {
            return Err(Error::MalformedFrame {
                expected: Frame::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut buf = &buf[..Frame::HEADER_SIZE];
        Ok(Self {
            command_id: buf.get_u16_le(),
            checksum: buf.get_u16_le(),
            session_id: buf.get_u16_le(),
            reply_id: buf.get_u16_le(),
        })
    }
}

/// Envelope length plus the wrapped frame's header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Inner frame length advertised at offset 4
    pub payload_size: u16,

    /// Header of the wrapped frame
    pub header: FrameHeader,
}

impl EnvelopeHeader {
    /// Decode an enveloped buffer's length field and inner header
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENVELOPE_SIZE + Frame::HEADER_SIZE {
            return Err(Error::MalformedFrame {
                expected: ENVELOPE_SIZE + Frame::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let payload_size = u16::from_le_bytes([buf[4], buf[5]]);
        let header = FrameHeader::decode(&buf[ENVELOPE_SIZE..])?;

        Ok(Self {
            payload_size,
            header,
        })
    }
}

/// Build a bare (UDP) frame and advance the session's reply id
///
/// The checksum is computed while the reply-id slot still holds the
/// pre-increment value; the incremented value is written afterwards. Devices
/// validate against this ordering.
pub fn build_frame(code: u16, session: &mut Session, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(Frame::HEADER_SIZE + payload.len());

    buf.put_u16_le(code);
    buf.put_u16_le(0);
    buf.put_u16_le(session.session_id());
    buf.put_u16_le(session.reply_id());
    buf.put_slice(payload);

    checksum::write_in_place(&mut buf);

    let reply_id = session.advance_reply_id();
    buf[6..8].copy_from_slice(&reply_id.to_le_bytes());

    buf
}

/// Build an enveloped (TCP) frame and advance the session's reply id
pub fn build_envelope(code: u16, session: &mut Session, payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > Frame::MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: Frame::MAX_PAYLOAD_SIZE,
        });
    }

    let inner = build_frame(code, session, payload);

    let mut buf = BytesMut::with_capacity(ENVELOPE_SIZE + inner.len());
    buf.put_slice(&TCP_MAGIC);
    buf.put_u16_le(inner.len() as u16);
    buf.put_u16_le(0);
    buf.put_slice(&inner);

    Ok(buf)
}

/// Remove the TCP envelope if present
///
/// Buffers shorter than 8 bytes or without the magic are returned unchanged,
/// so stripping is idempotent.
pub fn strip_envelope(buf: &[u8]) -> &[u8] {
    if buf.len() < ENVELOPE_SIZE || buf[..4] != TCP_MAGIC {
        return buf;
    }
    &buf[ENVELOPE_SIZE..]
}

/// Split one complete enveloped frame off the front of a stream buffer
///
/// Returns `Ok(None)` until the 8-byte envelope plus the advertised length
/// have arrived; partial data stays in `buf`. The returned frame has its
/// envelope removed.
pub fn split_envelope(buf: &mut BytesMut) -> Result<Option<BytesMut>> {
    if buf.len() < ENVELOPE_SIZE {
        return Ok(None);
    }

    if buf[..4] != TCP_MAGIC {
        return Err(Error::InvalidMagic(hex::encode(&buf[..4])));
    }

    let len = u16::from_le_bytes([buf[4], buf[5]]) as usize;
    if buf.len() < ENVELOPE_SIZE + len {
        return Ok(None);
    }

    buf.advance(ENVELOPE_SIZE);
    Ok(Some(buf.split_to(len)))
}
