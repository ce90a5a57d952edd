//! Concrete driver: one transport, one session, optional keep-alive
//!
//! The correlator sits behind a `tokio::sync::Mutex`, so application
//! commands, bulk reads, event polling and keep-alive probes take turns on
//! the socket. The keep-alive monitor is shared with status queries through
//! a `parking_lot::Mutex` that is never held across an await.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkwire_core::constants::DEFAULT_KEEP_ALIVE_MS;
use zkwire_core::{Command, Frame};
use zkwire_types::decode_real_time_event;

use crate::commands::{DeviceCommands, Driver, EventHandler, KeepAliveCallback, SocketStatus};
use crate::keepalive::{self, KeepAliveMonitor};
use crate::{Correlator, TcpTransport, Transport, TransportKind, UdpTransport, error::*};

/// How long one event poll holds the socket before letting other commands in
const EVENT_POLL: Duration = Duration::from_millis(500);

/// Driver for one device over one transport
pub struct Link<T: Transport> {
    correlator: Arc<tokio::sync::Mutex<Correlator<T>>>,
    kind: TransportKind,
    remote_addr: String,
    connected: AtomicBool,
    monitor: Arc<Mutex<KeepAliveMonitor>>,
    keep_alive: Mutex<Option<JoinHandle<()>>>,
    keep_alive_interval: Duration,
}

impl Link<TcpTransport> {
    pub fn tcp(ip: impl Into<String>, port: u16, timeout: Duration) -> Self {
        let transport = TcpTransport::new(ip, port).with_connect_timeout(timeout);
        Self::new(Correlator::new(transport).with_timeout(timeout))
    }
}

impl Link<UdpTransport> {
    pub fn udp(ip: impl Into<String>, port: u16, timeout: Duration, local_port: u16) -> Self {
        let transport = UdpTransport::new(ip, port).with_local_port(local_port);
        Self::new(Correlator::new(transport).with_timeout(timeout))
    }
}

impl<T: Transport + 'static> Link<T> {
    pub fn new(correlator: Correlator<T>) -> Self {
        Self {
            kind: correlator.kind(),
            remote_addr: correlator.transport().remote_addr(),
            correlator: Arc::new(tokio::sync::Mutex::new(correlator)),
            connected: AtomicBool::new(false),
            monitor: Arc::new(Mutex::new(KeepAliveMonitor::new())),
            keep_alive: Mutex::new(None),
            keep_alive_interval: Duration::from_millis(DEFAULT_KEEP_ALIVE_MS),
        }
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Forget the link when the socket itself failed
    fn observe<R>(&self, result: &Result<R>) {
        if let Err(e) = result {
            if e.is_link_failure() {
                warn!("Link to {} lost: {}", self.remote_addr, e);
                self.connected.store(false, Ordering::Release);
            }
        }
    }

    fn stop_keep_alive(&self) {
        if let Some(handle) = self.keep_alive.lock().take() {
            handle.abort();
            debug!("Keep-alive for {} stopped", self.remote_addr);
        }
        self.monitor.lock().reset();
    }

    fn start_keep_alive(&self, on_failure: KeepAliveCallback) {
        if self.kind != TransportKind::Udp {
            debug!("Keep-alive is only used on UDP links");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("Keep-alive needs a running tokio runtime");
            return;
        };

        if !self.connected.load(Ordering::Acquire) {
            debug!("Keep-alive requested on a closed link; ignored");
            return;
        }

        self.stop_keep_alive();
        self.monitor.lock().connected();

        let correlator = self.correlator.clone();
        let probe = move || {
            let correlator = correlator.clone();
            async move {
                let mut correlator = correlator.lock().await;
                let reply = correlator.execute(Command::GetTime.into(), &[]).await?;
                if reply.is_error() {
                    return Err(Error::device(Command::GetTime.into(), reply.code));
                }
                Ok::<(), Error>(())
            }
        };

        let handle = runtime.spawn(keepalive::run(
            self.monitor.clone(),
            self.keep_alive_interval,
            probe,
            on_failure,
        ));

        *self.keep_alive.lock() = Some(handle);
        debug!(
            "Keep-alive for {} every {:?}",
            self.remote_addr, self.keep_alive_interval
        );
    }
}

#[async_trait]
impl<T: Transport + 'static> DeviceCommands for Link<T> {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn execute_command(&self, code: u16, payload: &[u8]) -> Result<Frame> {
        self.ensure_connected()?;

        let result = self.correlator.lock().await.execute(code, payload).await;
        self.observe(&result);
        result
    }

    async fn read_with_buffer(&self, command: Command, fct: u32) -> Result<Bytes> {
        self.ensure_connected()?;

        let result = self
            .correlator
            .lock()
            .await
            .read_with_buffer(command, fct, 0)
            .await;
        self.observe(&result);
        result
    }

    async fn listen_events(&self, on_event: EventHandler<'_>) -> Result<()> {
        info!("Listening for events from {}", self.remote_addr);

        loop {
            self.ensure_connected()?;

            let polled = self.correlator.lock().await.next_event(EVENT_POLL).await;
            self.observe(&polled);

            let Some(frame) = polled? else {
                continue;
            };

            let event = match decode_real_time_event(&frame.encode()) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipped event from {}: {}", self.remote_addr, e);
                    continue;
                }
            };
            debug!("Event from {}: {:?}", self.remote_addr, event);

            if on_event(event).is_break() {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> Driver for Link<T> {
    async fn connect(&self) -> Result<()> {
        let mut correlator = self.correlator.lock().await;
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }

        correlator.open().await?;
        self.connected.store(true, Ordering::Release);

        info!("Connected to {} over {}", self.remote_addr, self.kind);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop_keep_alive();

        let mut correlator = self.correlator.lock().await;
        let was_connected = self.connected.swap(false, Ordering::AcqRel);

        correlator.close().await?;
        if was_connected {
            info!("Disconnected from {}", self.remote_addr);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }

    async fn socket_status(&self) -> SocketStatus {
        let correlator = self.correlator.lock().await;
        let running = self
            .keep_alive
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        let monitor = self.monitor.lock().clone();

        SocketStatus {
            transport: self.kind,
            remote_addr: self.remote_addr.clone(),
            connected: self.connected.load(Ordering::Acquire),
            session_id: correlator.session().session_id(),
            reply_id: correlator.session().reply_id(),
            keep_alive: running.then(|| monitor.state()),
            missed_keep_alives: monitor.missed(),
        }
    }

    fn set_keep_alive(&self, on_failure: Option<KeepAliveCallback>) {
        match on_failure {
            Some(callback) => self.start_keep_alive(callback),
            None => self.stop_keep_alive(),
        }
    }
}

impl<T: Transport> Drop for Link<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.keep_alive.get_mut().take() {
            handle.abort();
        }
    }
}
