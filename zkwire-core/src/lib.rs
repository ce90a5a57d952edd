//! # zkwire-core
//!
//! Core protocol implementation for ZK access-control and attendance terminals.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure, TCP envelope and header decoding
//! - Checksum calculation
//! - Command definitions
//! - Session identifiers and reply sequencing
//! - Protocol constants

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod session;

pub use command::Command;
pub use error::{Error, Result};
pub use frame::{EnvelopeHeader, Frame, FrameHeader};
pub use session::{Session, SessionState};

/// Default device port
pub const DEFAULT_PORT: u16 = 4370;
