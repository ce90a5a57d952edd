//! Session state for one connection
//!
//! A session is the `(session_id, reply_id)` pair negotiated at connect time
//! and advanced by every frame sent. It is owned by exactly one driver and is
//! passed by `&mut` to the frame builder, so two in-flight commands can never
//! draw from the same counter.

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// `CMD_CONNECT` sent, waiting for the device to assign a session id
    Handshaking,

    /// Session id assigned, ready for commands
    Connected,
}

/// Session identifiers and reply sequence
#[derive(Debug, Clone)]
pub struct Session {
    session_id: u16,
    reply_id: u16,
    state: SessionState,
}

impl Session {
    /// Reply id every handshake starts from
    pub const INITIAL_REPLY_ID: u16 = 0;

    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            session_id: 0,
            reply_id: Self::INITIAL_REPLY_ID,
            state: SessionState::Disconnected,
        }
    }

    /// Current session id
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Reply id the next frame will be checksummed with
    pub fn reply_id(&self) -> u16 {
        self.reply_id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if a session id has been assigned
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Reset identifiers for a new `CMD_CONNECT` exchange
    pub fn begin_handshake(&mut self) {
        self.session_id = 0;
        self.reply_id = Self::INITIAL_REPLY_ID;
        self.state = SessionState::Handshaking;
    }

    /// Adopt the session id assigned by the device
    pub fn initialize(&mut self, session_id: u16) -> Result<()> {
        if self.state != SessionState::Handshaking {
            return Err(Error::InvalidSessionState(format!(
                "Cannot initialize from state: {:?}",
                self.state
            )));
        }

        self.session_id = session_id;
        self.state = SessionState::Connected;

        Ok(())
    }

    /// Close session
    pub fn close(&mut self) {
        self.session_id = 0;
        self.reply_id = Self::INITIAL_REPLY_ID;
        self.state = SessionState::Disconnected;
    }

    /// Advance the reply id (mod 65536) and return the new value
    pub fn advance_reply_id(&mut self) -> u16 {
        self.reply_id = self.reply_id.wrapping_add(1);
        self.reply_id
    }

    /// Session positioned at an arbitrary reply id
    pub fn with_ids(session_id: u16, reply_id: u16) -> Self {
        Self {
            session_id,
            reply_id,
            state: SessionState::Connected,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.session_id(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_session_initialize() {
        let mut session = Session::new();
        session.begin_handshake();
        session.initialize(1234).unwrap();

        assert_eq!(session.session_id(), 1234);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.is_connected());
    }

    #[test]
    fn test_session_close() {
        let mut session = Session::with_ids(1234, 77);

        session.close();

        assert_eq!(session.session_id(), 0);
        assert_eq!(session.reply_id(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_reply_id_wrap() {
        let mut session = Session::with_ids(100, 65534);

        assert_eq!(session.advance_reply_id(), 65535);
        assert_eq!(session.advance_reply_id(), 0);
        assert_eq!(session.advance_reply_id(), 1);
    }

    #[test]
    fn test_handshake_resets_counters() {
        let mut session = Session::with_ids(100, 900);
        session.begin_handshake();

        assert_eq!(session.session_id(), 0);
        assert_eq!(session.reply_id(), 0);
        assert_eq!(session.state(), SessionState::Handshaking);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let mut session = Session::new();

        // Cannot initialize without a handshake
        assert!(session.initialize(100).is_err());

        session.begin_handshake();
        session.initialize(100).unwrap();

        // Cannot initialize twice
        assert!(session.initialize(200).is_err());
    }
}
