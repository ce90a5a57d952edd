//! Keep-alive supervision for UDP links
//!
//! UDP gives no signal when the device goes away, so the link probes it on
//! a fixed interval. [`KeepAliveMonitor`] is the pure bookkeeping part:
//!
//! ```text
//! ┌──────┐ connected ┌───────────┐ probe_sent ┌───────────┐
//! │ Idle │──────────>│ Connected │───────────>│ ProbeSent │
//! └──────┘           └───────────┘<───────────└───────────┘
//!                          ^       acked / missed  │
//!                          │                       │ 3rd consecutive miss
//!                          │ connected             v
//!                          │                  ┌────────┐
//!                          └──────────────────│ Failed │
//!                                             └────────┘
//! ```
//!
//! [`run`] drives the monitor from a `tokio::time::interval`. It reports
//! exhaustion once through the failure callback and never reconnects by
//! itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};
use zkwire_core::constants::MAX_MISSED_KEEP_ALIVES;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveState {
    /// No link to supervise
    Idle,
    /// Link up, no probe outstanding
    Connected,
    /// Probe outstanding
    ProbeSent,
    /// Too many consecutive probes went unanswered
    Failed,
}

/// Result of recording a missed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    /// Still tolerable
    Missed { missed: u8 },
    /// Limit reached by this miss
    Exhausted { missed: u8 },
    /// Limit was already reached earlier
    AlreadyFailed,
}

/// Keep-alive bookkeeping
#[derive(Debug, Clone)]
pub struct KeepAliveMonitor {
    state: KeepAliveState,
    missed: u8,
    max_missed: u8,
}

impl KeepAliveMonitor {
    pub fn new() -> Self {
        Self::with_limit(MAX_MISSED_KEEP_ALIVES)
    }

    pub fn with_limit(max_missed: u8) -> Self {
        Self {
            state: KeepAliveState::Idle,
            missed: 0,
            max_missed: max_missed.max(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> KeepAliveState {
        self.state
    }

    /// Consecutive unanswered probes
    #[must_use]
    pub fn missed(&self) -> u8 {
        self.missed
    }

    /// Misses tolerated before giving up
    #[must_use]
    pub fn max_missed(&self) -> u8 {
        self.max_missed
    }

    /// Start supervising a fresh link
    pub fn connected(&mut self) {
        self.state = KeepAliveState::Connected;
        self.missed = 0;
    }

    /// Stop supervising
    pub fn reset(&mut self) {
        self.state = KeepAliveState::Idle;
        self.missed = 0;
    }

    /// Record that a probe went out
    ///
    /// Returns `false` when the monitor is not supervising a live link.
    pub fn probe_sent(&mut self) -> bool {
        match self.state {
            KeepAliveState::Connected | KeepAliveState::ProbeSent => {
                self.state = KeepAliveState::ProbeSent;
                true
            }
            KeepAliveState::Idle | KeepAliveState::Failed => false,
        }
    }

    /// Record an answered probe
    pub fn probe_acked(&mut self) {
        if self.state == KeepAliveState::ProbeSent {
            self.state = KeepAliveState::Connected;
            self.missed = 0;
        }
    }

    /// Record an unanswered probe
    pub fn probe_missed(&mut self) -> MissOutcome {
        match self.state {
            KeepAliveState::Failed => MissOutcome::AlreadyFailed,
            KeepAliveState::Idle => MissOutcome::Missed { missed: self.missed },
            KeepAliveState::Connected | KeepAliveState::ProbeSent => {
                self.missed = self.missed.saturating_add(1);
                if self.missed >= self.max_missed {
                    self.state = KeepAliveState::Failed;
                    MissOutcome::Exhausted { missed: self.missed }
                } else {
                    self.state = KeepAliveState::Connected;
                    MissOutcome::Missed { missed: self.missed }
                }
            }
        }
    }
}

impl Default for KeepAliveMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe on every tick until the monitor reports exhaustion or goes idle
///
/// The first probe goes out one full `period` after start.
pub async fn run<P, Fut, F>(
    monitor: Arc<Mutex<KeepAliveMonitor>>,
    period: Duration,
    mut probe: P,
    on_failure: F,
) where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
    F: FnOnce(Error),
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if !monitor.lock().probe_sent() {
            debug!("Keep-alive stopped: link no longer supervised");
            return;
        }

        let result = probe().await;

        let (outcome, limit) = {
            let mut monitor = monitor.lock();
            let outcome = match result {
                Ok(()) => {
                    monitor.probe_acked();
                    None
                }
                Err(e) => {
                    debug!("Keep-alive probe failed: {}", e);
                    Some(monitor.probe_missed())
                }
            };
            (outcome, monitor.max_missed())
        };

        match outcome {
            None => {}
            Some(MissOutcome::Missed { missed }) => {
                warn!("Keep-alive probe missed ({}/{})", missed, limit);
            }
            Some(MissOutcome::Exhausted { missed }) => {
                warn!("Keep-alive exhausted after {} missed probes", missed);
                on_failure(Error::KeepAliveExhausted { missed });
                return;
            }
            Some(MissOutcome::AlreadyFailed) => return,
        }
    }
}
