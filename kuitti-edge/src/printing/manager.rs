//! Connection manager
//!
//! Drives the per-device state machine on top of the transport drivers:
//!
//! ```text
//! disconnected --connect--> connecting --ok--> connected
//! connecting --fail--> error --retry--> connecting
//! connected --disconnect / send failure--> disconnected
//! ```
//!
//! Concurrent `connect` calls for one device share a single attempt. Sends
//! never reconnect on their own: a device that is not connected fails fast
//! with [`PrintError::NotConnected`]. Abandoning a connect or send future
//! drops the driver's socket and puts the device back to `disconnected`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use futures::stream::{self, BoxStream, StreamExt};
use kuitti_printer::{Delivery, DiscoveryEvent, PrintError, PrintResult, Session, Transport};
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::registry::PrinterRegistry;
use super::retry::ReconnectPolicy;

type ConnectFuture = BoxFuture<'static, PrintResult<()>>;

/// One live session per device, `None` while disconnected
type SessionSlot = Arc<Mutex<Option<Session>>>;

pub struct ConnectionManager {
    registry: Arc<PrinterRegistry>,
    transports: HashMap<TransportKind, Arc<dyn Transport>>,
    sessions: DashMap<String, SessionSlot>,
    in_flight: DashMap<String, WeakShared<ConnectFuture>>,
}

/// Resets a device whose connect attempt was dropped mid-flight
struct ConnectGuard<'a> {
    manager: &'a ConnectionManager,
    device_id: String,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(device_id = %self.device_id, "Connect abandoned");
            self.manager.registry.reset(&self.device_id);
            self.manager
                .in_flight
                .remove_if(&self.device_id, |_, weak| weak.upgrade().is_none());
        }
    }
}

/// Resets a device whose send was dropped mid-write
struct SendGuard<'a> {
    registry: &'a PrinterRegistry,
    device_id: &'a str,
    armed: bool,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(device_id = %self.device_id, "Send abandoned, session released");
            self.registry.reset(self.device_id);
        }
    }
}

impl ConnectionManager {
    pub fn new(registry: Arc<PrinterRegistry>, transports: Vec<Arc<dyn Transport>>) -> Self {
        let transports = transports.into_iter().map(|t| (t.kind(), t)).collect();
        Self {
            registry,
            transports,
            sessions: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<PrinterRegistry> {
        &self.registry
    }

    pub fn transport(&self, kind: TransportKind) -> PrintResult<Arc<dyn Transport>> {
        self.transports.get(&kind).cloned().ok_or_else(|| {
            PrintError::TransportUnavailable(format!("No {} driver configured", kind))
        })
    }

    fn active_device(&self, id: &str) -> PrintResult<PrinterDevice> {
        let device = self
            .registry
            .get(id)
            .ok_or_else(|| PrintError::InvalidState(format!("Unknown printer {}", id)))?;
        if !device.is_active {
            return Err(PrintError::InvalidState(format!(
                "Printer {} has been removed",
                id
            )));
        }
        Ok(device)
    }

    fn is_connected(&self, id: &str) -> bool {
        self.registry
            .get(id)
            .is_some_and(|d| d.connection_state == ConnectionState::Connected)
    }

    fn slot(&self, id: &str) -> SessionSlot {
        self.sessions.entry(id.to_string()).or_default().clone()
    }

    /// Connect a device; joins an attempt already in flight
    #[instrument(skip(self), fields(device_id = %id))]
    pub async fn connect(self: &Arc<Self>, id: &str) -> PrintResult<()> {
        let device = self.active_device(id)?;
        if device.connection_state == ConnectionState::Connected {
            return Ok(());
        }

        let attempt = match self.in_flight.entry(id.to_string()) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(running) => {
                    debug!("Joining connect in flight");
                    running
                }
                None => {
                    let fresh = self.start_connect(device);
                    if let Some(weak) = fresh.downgrade() {
                        entry.insert(weak);
                    }
                    fresh
                }
            },
            Entry::Vacant(entry) => {
                let fresh = self.start_connect(device);
                if let Some(weak) = fresh.downgrade() {
                    entry.insert(weak);
                }
                fresh
            }
        };
        attempt.await
    }

    fn start_connect(self: &Arc<Self>, device: PrinterDevice) -> Shared<ConnectFuture> {
        let this = Arc::clone(self);
        async move { this.connect_once(device).await }
            .boxed()
            .shared()
    }

    async fn connect_once(&self, device: PrinterDevice) -> PrintResult<()> {
        let id = device.id.clone();
        let mut guard = ConnectGuard {
            manager: self,
            device_id: id.clone(),
            armed: false,
        };

        let result = match self.registry.transition(&id, ConnectionState::Connecting) {
            Ok(_) => {
                guard.armed = true;
                self.open_session(&device).await
            }
            // A concurrent attempt finished between the caller's read and ours
            Err(_) if self.is_connected(&id) => {
                debug!(device_id = %id, "Already connected");
                Ok(())
            }
            Err(e) => Err(e),
        };

        guard.armed = false;
        self.in_flight.remove(&id);
        result
    }

    async fn open_session(&self, device: &PrinterDevice) -> PrintResult<()> {
        let id = device.id.as_str();
        let opened = match self.transport(device.transport_kind) {
            Ok(transport) => transport
                .connect(device)
                .await
                .map(|session| (transport, session)),
            Err(e) => Err(e),
        };

        match opened {
            Ok((transport, session)) => {
                let stale = self.slot(id).lock().await.replace(session);
                if let Some(stale) = stale {
                    transport.disconnect(stale).await;
                }
                self.registry.transition(id, ConnectionState::Connected)?;
                info!(device_id = %id, transport = %device.transport_kind, "Printer connected");
                Ok(())
            }
            Err(e) => {
                let _ = self.registry.transition(id, ConnectionState::Error);
                if e.is_retryable() {
                    warn!(device_id = %id, error = %e, "Connect failed");
                } else {
                    error!(device_id = %id, error = %e, "Connect failed");
                }
                Err(e)
            }
        }
    }

    /// Connect again from the `error` state
    pub async fn retry(self: &Arc<Self>, id: &str) -> PrintResult<()> {
        match self.registry.state(id) {
            Some(ConnectionState::Error) => self.connect(id).await,
            Some(state) => Err(PrintError::InvalidState(format!(
                "{}: retry needs the error state, printer is {}",
                id, state
            ))),
            None => Err(PrintError::InvalidState(format!("Unknown printer {}", id))),
        }
    }

    /// Connect with bounded exponential backoff
    ///
    /// Each attempt is announced as a `ConnectAttempt` registry event.
    /// Non-retryable failures stop immediately.
    #[instrument(skip(self, policy), fields(device_id = %id, max = policy.max_attempts))]
    pub async fn reconnect(self: &Arc<Self>, id: &str, policy: &ReconnectPolicy) -> PrintResult<()> {
        let mut attempt = 1;
        loop {
            self.registry.connect_attempt(id, attempt, policy.max_attempts);
            match self.connect(id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Reconnect attempt failed");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send one job to a connected device
    ///
    /// A failed send closes the session and leaves the device
    /// `disconnected`; the job records the failure.
    #[instrument(skip(self, job), fields(device_id = %id, job_id = %job.id, bytes = job.payload.len()))]
    pub async fn send_job(&self, id: &str, job: &mut PrintJob) -> PrintResult<Delivery> {
        let device = self.active_device(id)?;
        if device.connection_state != ConnectionState::Connected {
            let err = PrintError::NotConnected(format!(
                "{} is {}",
                device.name, device.connection_state
            ));
            job.mark_failed(err.operator_message());
            return Err(err);
        }
        let transport = self.transport(device.transport_kind)?;

        let slot = self.slot(id);
        let mut held = slot.lock().await;
        let Some(mut session) = held.take() else {
            self.registry.reset(id);
            let err = PrintError::NotConnected(format!("{} has no open session", device.name));
            job.mark_failed(err.operator_message());
            return Err(err);
        };

        job.begin_attempt();
        let mut guard = SendGuard {
            registry: &self.registry,
            device_id: id,
            armed: true,
        };
        let result = transport.send(&mut session, job).await;
        guard.armed = false;

        match result {
            Ok(delivery) => {
                *held = Some(session);
                job.mark_acked(delivery.remote_job_id());
                info!(attempt = job.attempts, delivery = ?delivery, "Job sent");
                Ok(delivery)
            }
            Err(e) => {
                transport.disconnect(session).await;
                let _ = self.registry.transition(id, ConnectionState::Disconnected);
                job.mark_failed(e.operator_message());
                if e.is_retryable() {
                    warn!(error = %e, "Send failed");
                } else {
                    error!(error = %e, "Send failed");
                }
                Err(e)
            }
        }
    }

    /// Send raw bytes (test page, drawer kick) to a connected device
    pub async fn send_bytes(&self, id: &str, payload: Vec<u8>) -> PrintResult<Delivery> {
        let mut job = PrintJob::new(id, payload);
        self.send_job(id, &mut job).await
    }

    /// Close the session; no-op for a disconnected device
    #[instrument(skip(self), fields(device_id = %id))]
    pub async fn disconnect(&self, id: &str) -> PrintResult<()> {
        let device = self
            .registry
            .get(id)
            .ok_or_else(|| PrintError::InvalidState(format!("Unknown printer {}", id)))?;

        match device.connection_state {
            ConnectionState::Disconnected => Ok(()),
            ConnectionState::Connecting => Err(PrintError::InvalidState(format!(
                "{}: connect in progress",
                id
            ))),
            ConnectionState::Connected | ConnectionState::Error => {
                let slot = self.sessions.get(id).map(|s| s.value().clone());
                if let Some(slot) = slot
                    && let Some(session) = slot.lock().await.take()
                {
                    self.transport(device.transport_kind)?
                        .disconnect(session)
                        .await;
                }
                self.registry.transition(id, ConnectionState::Disconnected)?;
                info!("Printer disconnected");
                Ok(())
            }
        }
    }

    /// Reachability check through the driver; registry state is untouched
    pub async fn probe(&self, id: &str) -> PrintResult<ConnectionState> {
        let device = self.active_device(id)?;
        let transport = self.transport(device.transport_kind)?;
        Ok(transport.probe(&device).await)
    }

    /// Disconnect and deactivate
    pub async fn remove(&self, id: &str) -> PrintResult<()> {
        if let Err(e) = self.disconnect(id).await {
            warn!(device_id = %id, error = %e, "Disconnect before removal failed");
        }
        self.sessions.remove(id);
        self.registry.deactivate(id)
    }

    /// Discovery events from every configured driver
    pub fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        stream::select_all(self.transports.values().map(|t| t.discover())).boxed()
    }
}
