//! Command/reply correlation
//!
//! A [`Correlator`] owns one transport and the [`Session`] that numbers its
//! frames. It sends one command at a time and waits for the reply under a
//! per-call deadline. Event frames pushed by the device in the meantime are
//! queued for [`Correlator::next_event`] instead of being taken as replies.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use zkwire_core::constants::DEFAULT_TIMEOUT_MS;
use zkwire_core::frame::{build_envelope, build_frame};
use zkwire_core::{Command, Frame, Session};

use crate::{Transport, TransportKind, error::*};

/// Timed-out reply ids remembered for dropping their late answers
const MAX_ABANDONED: usize = 8;

/// Serializes commands over one transport
pub struct Correlator<T> {
    transport: T,
    session: Session,
    timeout: Duration,
    validate_checksum: bool,
    pending_events: VecDeque<Frame>,
    /// Reply ids of commands that timed out; late answers to them are dropped
    abandoned: VecDeque<u16>,
}

impl<T: Transport> Correlator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: Session::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            validate_checksum: false,
            pending_events: VecDeque::new(),
            abandoned: VecDeque::with_capacity(MAX_ABANDONED),
        }
    }

    /// Set the per-call reply deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject replies whose checksum does not match
    pub fn with_checksum_validation(mut self, enabled: bool) -> Self {
        self.validate_checksum = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Open the socket and run the `CMD_CONNECT` handshake
    pub async fn open(&mut self) -> Result<()> {
        // a socket left behind by a lost link
        if self.transport.is_connected() {
            self.transport.disconnect().await?;
        }
        self.transport.connect().await?;
        self.pending_events.clear();
        self.abandoned.clear();
        self.session.begin_handshake();

        match self.handshake().await {
            Ok(session_id) => {
                debug!(
                    "Session 0x{:04X} established with {}",
                    session_id,
                    self.transport.remote_addr()
                );
                Ok(())
            }
            Err(e) => {
                self.session.close();
                let _ = self.transport.disconnect().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<u16> {
        let connect = u16::from(Command::Connect);
        let reply = self.execute(connect, &[]).await?;

        match reply.command() {
            Some(Command::AckOk) => {
                self.session.initialize(reply.session_id)?;
                Ok(reply.session_id)
            }
            Some(Command::AckUnauth) => Err(Error::Unauthorized),
            _ => Err(Error::unexpected(connect, reply.code)),
        }
    }

    /// Send `CMD_EXIT` if a session is up, then close the socket
    pub async fn close(&mut self) -> Result<()> {
        if self.session.is_connected() && self.transport.is_connected() {
            if let Err(e) = self.execute(Command::Exit.into(), &[]).await {
                debug!("CMD_EXIT not acknowledged: {}", e);
            }
        }

        self.session.close();
        self.pending_events.clear();
        self.transport.disconnect().await
    }

    /// Send one command and wait for its reply
    ///
    /// Error acknowledgements are returned as frames; interpreting them is
    /// up to the caller.
    pub async fn execute(&mut self, code: u16, payload: &[u8]) -> Result<Frame> {
        self.send_command(code, payload).await?;
        self.receive_reply().await
    }

    async fn send_command(&mut self, code: u16, payload: &[u8]) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let buf = match self.transport.kind() {
            TransportKind::Tcp => build_envelope(code, &mut self.session, payload)?,
            TransportKind::Udp => build_frame(code, &mut self.session, payload),
        };

        // the id space wrapped around onto an abandoned command
        let current = self.session.reply_id();
        self.abandoned.retain(|&id| id != current);

        trace!(
            "-> {} reply_id={} payload={}",
            Command::describe(code),
            self.session.reply_id(),
            hex::encode(payload)
        );

        self.transport.send(&buf).await
    }

    async fn receive_frame(&mut self, wait: Duration) -> Result<Frame> {
        let frame = Frame::decode(self.transport.receive(wait).await?)?;
        if self.validate_checksum {
            frame.verify_checksum()?;
        }
        Ok(frame)
    }

    /// Wait for the reply to the command just sent
    async fn receive_reply(&mut self) -> Result<Frame> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.abandon());
            }

            let frame = match self.receive_frame(remaining).await {
                Ok(frame) => frame,
                Err(Error::Timeout(_)) => return Err(self.abandon()),
                Err(e) => return Err(e),
            };

            if frame.is_event() {
                trace!("Queued event 0x{:04X} while waiting for reply", frame.session_id);
                self.pending_events.push_back(frame);
                continue;
            }

            if self.abandoned.contains(&frame.reply_id) {
                debug!("Dropped late reply {:?}", frame);
                continue;
            }

            trace!("<- {:?}", frame);
            return Ok(frame);
        }
    }

    fn abandon(&mut self) -> Error {
        if self.abandoned.len() == MAX_ABANDONED {
            self.abandoned.pop_front();
        }
        self.abandoned.push_back(self.session.reply_id());
        Error::Timeout(self.timeout)
    }

    /// Next pushed event frame, waiting at most `wait`
    ///
    /// Returns `Ok(None)` when nothing arrives in time. Stray non-event
    /// frames are discarded.
    pub async fn next_event(&mut self, wait: Duration) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending_events.pop_front() {
            return Ok(Some(frame));
        }

        if !self.transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match self.receive_frame(remaining).await {
                Ok(frame) if frame.is_event() => return Ok(Some(frame)),
                Ok(frame) => debug!("Discarded stray frame {:?}", frame),
                Err(Error::Timeout(_)) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Download a data set through the device's transfer buffer
    ///
    /// Returns the assembled buffer; its first four bytes hold the total
    /// size as reported by the device.
    pub async fn read_with_buffer(&mut self, command: Command, fct: u32, ext: u32) -> Result<Bytes> {
        let mut request = BytesMut::with_capacity(11);
        request.put_u8(1);
        request.put_u16_le(command.into());
        request.put_u32_le(fct);
        request.put_u32_le(ext);

        let wrrq = u16::from(Command::DataWrrq);
        let reply = self.execute(wrrq, &request).await?;

        let size = match reply.command() {
            Some(Command::Data) => {
                debug!("{} answered inline with {} bytes", command, reply.payload.len());
                return Ok(reply.payload);
            }
            Some(Command::AckOk) => read_u32(&reply.payload, 1)? as usize,
            Some(cmd) if cmd.is_error() => return Err(Error::device(wrrq, reply.code)),
            _ => return Err(Error::unexpected(wrrq, reply.code)),
        };

        debug!("{} buffered {} bytes on the device", command, size);

        // the device keeps the buffer until told otherwise, even after a failed chunk
        let result = self.read_chunks(size).await;
        self.free_data().await;
        result
    }

    async fn read_chunks(&mut self, size: usize) -> Result<Bytes> {
        let max_chunk = self.kind().max_chunk() as usize;
        let mut data = BytesMut::with_capacity(size);
        let mut start = 0;

        while start < size {
            let len = max_chunk.min(size - start);
            let chunk = self.read_chunk(start as u32, len as u32).await?;
            data.extend_from_slice(&chunk);
            start += len;
        }

        Ok(data.freeze())
    }

    async fn read_chunk(&mut self, start: u32, size: u32) -> Result<Bytes> {
        let mut request = BytesMut::with_capacity(8);
        request.put_u32_le(start);
        request.put_u32_le(size);

        let rdy = u16::from(Command::DataRdy);
        let first = self.execute(rdy, &request).await?;

        match first.command() {
            Some(Command::Data) => Ok(first.payload),
            Some(Command::PrepareData) => {
                let total = read_u32(&first.payload, 0)? as usize;
                let mut chunk = BytesMut::with_capacity(total);

                while chunk.len() < total {
                    let part = self.receive_reply().await?;
                    if part.command() != Some(Command::Data) {
                        return Err(Error::unexpected(rdy, part.code));
                    }
                    chunk.extend_from_slice(&part.payload);
                }

                let ack = self.receive_reply().await?;
                if !ack.is_success() {
                    return Err(Error::device(rdy, ack.code));
                }

                Ok(chunk.freeze())
            }
            Some(cmd) if cmd.is_error() => Err(Error::device(rdy, first.code)),
            _ => Err(Error::unexpected(rdy, first.code)),
        }
    }

    async fn free_data(&mut self) {
        if let Err(e) = self.execute(Command::FreeData.into(), &[]).await {
            warn!("Failed to release device buffer: {}", e);
        }
    }
}

fn read_u32(payload: &[u8], offset: usize) -> Result<u32> {
    payload
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| {
            zkwire_core::Error::MalformedFrame {
                expected: offset + 4,
                actual: payload.len(),
            }
            .into()
        })
}
