// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervisor for the sessions of several printers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientFactory, PrinterCommand, ServiceState, StatusReport};
use crate::error::{ClientError, Error, Result};
use crate::event::{DeliverySink, DeviceId, LifecycleKind, Notification};
use crate::session::{Session, SubscriptionId, UpdateHub};
use crate::snapshot::serialize_state;

use super::config::{PrinterConfig, ReconnectionPolicy, SupervisorConfig};
use super::managed::{ConnectionState, DeviceStatus, ManagedSession};
use super::throttle::Throttle;

/// Error message recorded when the client reports a dropped session.
pub const CONNECTION_LOST: &str = "Connection lost";

/// Outcome of [`Supervisor::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestConnectionResult {
    /// Whether the printer answered with a connected status.
    pub success: bool,
    /// Human readable outcome.
    pub message: String,
    /// Model reported by the printer, if any.
    pub printer_model: Option<String>,
}

impl TestConnectionResult {
    fn success(model: String) -> Self {
        Self {
            success: true,
            message: "Connected successfully".to_string(),
            printer_model: (!model.is_empty()).then_some(model),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            printer_model: None,
        }
    }
}

/// Owns the sessions of all configured printers.
///
/// The supervisor keeps at most one live session per device ID. Each
/// session gets a background retry loop that connects it, and a status
/// subscription that turns raw client updates into throttled
/// [`Notification`]s for the [`DeliverySink`].
///
/// All bookkeeping sits behind one mutex that is never held across I/O or
/// sleeps, so the query methods never wait on the network.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use bambu_fleet::client::ClientFactory;
/// use bambu_fleet::event::EventBus;
/// use bambu_fleet::supervisor::{PrinterConfig, Supervisor, SupervisorConfig};
///
/// # async fn example(factory: Arc<dyn ClientFactory>) -> bambu_fleet::Result<()> {
/// let bus = EventBus::new();
/// let mut events = bus.subscribe();
/// let supervisor = Supervisor::new(factory, Arc::new(bus), SupervisorConfig::default());
///
/// supervisor.connect(PrinterConfig::new("x1c", "192.168.1.40", "12345678", "00M09A350100123"))?;
///
/// while let Ok(notification) = events.recv().await {
///     println!("{}", serde_json::to_string(&notification).unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    factory: Arc<dyn ClientFactory>,
    sink: Arc<dyn DeliverySink>,
    config: SupervisorConfig,
    runtime: Handle,
    sessions: Mutex<HashMap<DeviceId, ManagedSession>>,
    next_generation: AtomicU64,
}

impl Supervisor {
    /// Creates a supervisor.
    ///
    /// Background tasks are spawned on the tokio runtime that is current at
    /// construction time.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        sink: Arc<dyn DeliverySink>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                sink,
                config,
                runtime: Handle::current(),
                sessions: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the supervisor's timing settings.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Starts supervising a printer.
    ///
    /// Returns immediately. If the device already has a live session this is
    /// a no-op; otherwise a new session is created, a `connecting`
    /// notification is delivered and a background loop retries the
    /// connection until it succeeds or the session is disconnected.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is incomplete.
    pub fn connect(&self, config: PrinterConfig) -> Result<()> {
        self.install(config, false)
    }

    /// Stops supervising a printer.
    ///
    /// Cancels its background tasks, closes the client and removes the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if the device has no session.
    pub fn disconnect(&self, device_id: &DeviceId) -> Result<()> {
        let removed = self.inner.sessions.lock().remove(device_id);
        let mut managed = removed.ok_or_else(|| Error::DeviceNotFound(device_id.clone()))?;

        managed.shut_down();
        tracing::info!(device_id = %device_id, "Printer disconnected");
        self.inner.sink.deliver(Notification::lifecycle(
            device_id.clone(),
            LifecycleKind::Disconnected,
            "",
        ));
        self.inner
            .sink
            .deliver(Notification::state_update(managed.status()));
        Ok(())
    }

    /// Replaces a printer's session with one built from `config`.
    ///
    /// The old session (if any) is removed and the new one inserted in one
    /// step, so no query ever observes the device as missing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is incomplete.
    pub fn reconnect(&self, config: PrinterConfig) -> Result<()> {
        self.install(config, true)
    }

    /// Connects every configuration that has `auto_connect` set.
    ///
    /// Invalid configurations are logged and skipped. Returns the number of
    /// devices passed to [`connect`](Self::connect) successfully.
    pub fn connect_all(&self, configs: &[PrinterConfig]) -> usize {
        let mut started = 0;
        for config in configs.iter().filter(|c| c.auto_connect) {
            match self.connect(config.clone()) {
                Ok(()) => started += 1,
                Err(e) => {
                    tracing::warn!(device_id = %config.id, error = %e, "Skipping printer");
                }
            }
        }
        started
    }

    /// Applies a new set of printer configurations.
    ///
    /// Devices missing from `configs` are disconnected, new devices with
    /// `auto_connect` are connected and devices whose connection settings
    /// changed are reconnected. Other changes (name, camera address) are
    /// applied in place.
    pub fn sync_configs(&self, configs: &[PrinterConfig]) {
        let current: HashMap<DeviceId, PrinterConfig> = self
            .inner
            .sessions
            .lock()
            .iter()
            .map(|(id, managed)| (id.clone(), managed.config.clone()))
            .collect();
        let wanted: HashSet<&DeviceId> = configs.iter().map(|c| &c.id).collect();

        for id in current.keys().filter(|id| !wanted.contains(id)) {
            if let Err(e) = self.disconnect(id) {
                tracing::debug!(device_id = %id, error = %e, "Already removed");
            }
        }

        for config in configs {
            let result = match current.get(&config.id) {
                None if config.auto_connect => self.connect(config.clone()),
                None => Ok(()),
                Some(old) if old.connection_changed(config) => {
                    tracing::info!(device_id = %config.id, "Connection settings changed");
                    self.reconnect(config.clone())
                }
                Some(_) => {
                    if let Some(managed) = self.inner.sessions.lock().get_mut(&config.id) {
                        managed.config = config.clone();
                    }
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::warn!(device_id = %config.id, error = %e, "Failed to apply configuration");
            }
        }
    }

    /// Disconnects every printer.
    pub fn shutdown_all(&self) {
        let drained: Vec<ManagedSession> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, managed)| managed)
            .collect();

        for mut managed in drained {
            managed.shut_down();
            self.inner.sink.deliver(Notification::lifecycle(
                managed.config.id.clone(),
                LifecycleKind::Disconnected,
                "",
            ));
        }
        tracing::info!("All printers disconnected");
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns the cached status of one printer.
    #[must_use]
    pub fn get_state(&self, device_id: &DeviceId) -> Option<DeviceStatus> {
        self.inner
            .sessions
            .lock()
            .get(device_id)
            .map(ManagedSession::status)
    }

    /// Returns the cached status of every printer, ordered by device ID.
    #[must_use]
    pub fn get_all_states(&self) -> Vec<DeviceStatus> {
        let mut states: Vec<DeviceStatus> = self
            .inner
            .sessions
            .lock()
            .values()
            .map(ManagedSession::status)
            .collect();
        states.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        states
    }

    /// Returns the IDs of all supervised printers.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.inner.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of supervised printers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Returns `true` if no printer is supervised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.lock().is_empty()
    }

    /// Returns the configuration a printer was connected with.
    #[must_use]
    pub fn printer_config(&self, device_id: &DeviceId) -> Option<PrinterConfig> {
        self.inner
            .sessions
            .lock()
            .get(device_id)
            .map(|managed| managed.config.clone())
    }

    /// Returns the session of a printer, for consumers that share it.
    #[must_use]
    pub fn session(&self, device_id: &DeviceId) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .lock()
            .get(device_id)
            .map(|managed| Arc::clone(&managed.session))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Forwards a command to a connected printer.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown device,
    /// `Error::NotConnected` if its session is not connected, or
    /// `Error::Client` if the printer rejects the command. A rejected command
    /// does not change the connection state.
    pub async fn execute(&self, device_id: &DeviceId, command: PrinterCommand) -> Result<()> {
        let session = {
            let sessions = self.inner.sessions.lock();
            let managed = sessions
                .get(device_id)
                .ok_or_else(|| Error::DeviceNotFound(device_id.clone()))?;
            if !managed.state.is_connected() {
                return Err(Error::NotConnected(device_id.clone()));
            }
            Arc::clone(&managed.session)
        };

        tracing::debug!(device_id = %device_id, command = %command, "Sending command");
        session.execute(&command).await.map_err(|e| {
            tracing::warn!(
                device_id = %device_id,
                command = command.name(),
                error = %e,
                "Command failed"
            );
            Error::Client(e)
        })
    }

    /// Tries a configuration without supervising it.
    ///
    /// Creates a separate client, waits up to the configured test timeout
    /// for a connected status report and always closes the client again.
    pub async fn test_connection(&self, config: &PrinterConfig) -> TestConnectionResult {
        if let Err(e) = config.validate() {
            return TestConnectionResult::failure(e.to_string());
        }

        let hub = Arc::new(UpdateHub::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<StatusReport>();
        hub.subscribe(move |report| {
            if report.service_state.is_connected() {
                let _ = tx.send(report.clone());
            }
        });
        let client = self.inner.factory.create(config, hub.notifier());
        let timeout = self.inner.config.test_timeout;

        let outcome = tokio::time::timeout(timeout, async {
            client.start_session().await?;
            rx.recv()
                .await
                .ok_or_else(|| ClientError::ConnectionFailed("client closed".to_string()))
        })
        .await;

        client.quit();
        hub.clear();

        match outcome {
            Ok(Ok(report)) => {
                let model = serialize_state(&report).printer_model;
                tracing::info!(device_id = %config.id, model = %model, "Connection test succeeded");
                TestConnectionResult::success(model)
            }
            Ok(Err(e)) => {
                tracing::info!(device_id = %config.id, error = %e, "Connection test failed");
                TestConnectionResult::failure(e.to_string())
            }
            Err(_) => {
                tracing::info!(device_id = %config.id, "Connection test timed out");
                TestConnectionResult::failure(ClientError::Timeout(timeout).to_string())
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn install(&self, config: PrinterConfig, replace: bool) -> Result<()> {
        config.validate()?;
        let id = config.id.clone();

        if !replace && self.inner.has_live_session(&id) {
            tracing::debug!(device_id = %id, "Already connected or connecting");
            return Ok(());
        }

        let session = Arc::new(Session::open(self.inner.factory.as_ref(), &config));
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let tracker = self.inner.track(&session, &id, generation);
        let mut managed = ManagedSession::new(config, Arc::clone(&session), generation);
        managed.tracker = Some(tracker);
        let cancel = managed.cancel.clone();

        let previous = {
            let mut sessions = self.inner.sessions.lock();
            if !replace && sessions.get(&id).is_some_and(ManagedSession::is_live) {
                drop(sessions);
                session.unsubscribe(tracker);
                session.quit();
                tracing::debug!(device_id = %id, "Session already live, discarding duplicate");
                return Ok(());
            }
            let previous = sessions.insert(id.clone(), managed);
            self.inner.sink.deliver(Notification::lifecycle(
                id.clone(),
                LifecycleKind::Connecting,
                "",
            ));
            previous
        };

        if let Some(mut previous) = previous {
            tracing::debug!(device_id = %id, "Replacing previous session");
            previous.shut_down();
        }

        tracing::info!(device_id = %id, name = session.name(), "Connecting to printer");
        self.inner.runtime.spawn(run_retry_loop(
            Arc::downgrade(&self.inner),
            id,
            generation,
            session,
            cancel,
            self.inner.config.retry_interval,
        ));
        Ok(())
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("devices", &self.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Decides which raw updates are processed.
///
/// Updates are throttled per device, except that a change of the client's
/// service state is always let through so connection transitions are
/// never lost.
struct UpdateGate {
    throttle: Throttle,
    last_state: Option<ServiceState>,
}

impl UpdateGate {
    fn new(interval: Duration) -> Self {
        Self {
            throttle: Throttle::new(interval),
            last_state: None,
        }
    }

    fn admit(&mut self, state: ServiceState, now: Instant) -> bool {
        if self.last_state != Some(state) {
            self.last_state = Some(state);
            self.throttle.reset();
        }
        self.throttle.try_acquire(now)
    }
}

impl Inner {
    fn has_live_session(&self, id: &DeviceId) -> bool {
        self.sessions
            .lock()
            .get(id)
            .is_some_and(ManagedSession::is_live)
    }

    /// Runs `f` on the session entry if it is still the given generation.
    ///
    /// Stale tasks and callbacks of a replaced or removed session see `None`.
    fn with_current<R>(
        &self,
        id: &DeviceId,
        generation: u64,
        f: impl FnOnce(&mut ManagedSession, &dyn DeliverySink) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.lock();
        let managed = sessions
            .get_mut(id)
            .filter(|m| m.generation == generation && !m.cancel.is_cancelled())?;
        Some(f(managed, self.sink.as_ref()))
    }

    fn track(self: &Arc<Self>, session: &Session, id: &DeviceId, generation: u64) -> SubscriptionId {
        let weak = Arc::downgrade(self);
        let id = id.clone();
        let gate = Mutex::new(UpdateGate::new(self.config.update_throttle));

        session.subscribe(move |report| {
            if let Some(inner) = weak.upgrade() {
                inner.on_raw_update(&id, generation, &gate, report);
            }
        })
    }

    /// Handles one raw status update from the client's thread.
    fn on_raw_update(
        self: &Arc<Self>,
        id: &DeviceId,
        generation: u64,
        gate: &Mutex<UpdateGate>,
        report: &StatusReport,
    ) {
        if !gate.lock().admit(report.service_state, Instant::now()) {
            tracing::trace!(device_id = %id, "Update throttled");
            return;
        }

        let snapshot = Arc::new(serialize_state(report));
        let service_state = report.service_state;

        let recovery = self.with_current(id, generation, |managed, sink| {
            managed.last_snapshot = Some(Arc::clone(&snapshot));
            if !snapshot.printer_model.is_empty() {
                managed.model.clone_from(&snapshot.printer_model);
            }

            let mut recovery = None;
            if service_state.is_connected() {
                if managed.mark_connected() {
                    tracing::info!(device_id = %id, "Printer connected");
                    sink.deliver(Notification::lifecycle(
                        id.clone(),
                        LifecycleKind::Connected,
                        "",
                    ));
                }
            } else if managed.state.is_connected() && service_state.is_lost() {
                managed.state = ConnectionState::Reconnecting;
                managed.error = CONNECTION_LOST.to_string();
                tracing::warn!(device_id = %id, service_state = %service_state, "Connection lost");
                sink.deliver(Notification::lifecycle(
                    id.clone(),
                    LifecycleKind::Reconnecting,
                    CONNECTION_LOST,
                ));
                match managed.begin_recovery() {
                    Some(token) => recovery = Some((Arc::clone(&managed.session), token)),
                    None => tracing::debug!(device_id = %id, "Recovery already running"),
                }
            }

            sink.deliver(Notification::state_update(managed.status()));
            recovery
        });

        if let Some((session, cancel)) = recovery.flatten() {
            self.runtime.spawn(run_recovery(
                Arc::downgrade(self),
                id.clone(),
                generation,
                session,
                cancel,
                self.config.reconnection.clone(),
                self.config.reconnect_delay,
            ));
        }
    }

    fn set_connecting(&self, id: &DeviceId, generation: u64) {
        self.with_current(id, generation, |managed, _| {
            if managed.state == ConnectionState::Pending {
                managed.state = ConnectionState::Connecting;
            }
        });
    }

    fn record_failure(&self, id: &DeviceId, generation: u64, message: String) {
        self.with_current(id, generation, |managed, sink| {
            managed.error = message;
            sink.deliver(Notification::state_update(managed.status()));
        });
    }

    fn mark_connected(&self, id: &DeviceId, generation: u64, session: &Session) {
        let model = serialize_state(&session.report()).printer_model;
        self.with_current(id, generation, |managed, sink| {
            if !model.is_empty() {
                managed.model = model;
            }
            if managed.mark_connected() {
                tracing::info!(device_id = %id, "Printer connected");
                sink.deliver(Notification::lifecycle(
                    id.clone(),
                    LifecycleKind::Connected,
                    "",
                ));
                sink.deliver(Notification::state_update(managed.status()));
            }
        });
    }

    fn give_up(&self, id: &DeviceId, generation: u64, message: String) {
        self.with_current(id, generation, |managed, sink| {
            if managed.state != ConnectionState::Reconnecting {
                return;
            }
            tracing::error!(device_id = %id, error = %message, "Giving up on printer");
            managed.state = ConnectionState::Error;
            managed.error.clone_from(&message);
            sink.deliver(Notification::lifecycle(
                id.clone(),
                LifecycleKind::Error,
                message,
            ));
            sink.deliver(Notification::state_update(managed.status()));
        });
    }
}

/// Connects a new session, retrying at a fixed interval until it succeeds
/// or the session is cancelled.
async fn run_retry_loop(
    inner: Weak<Inner>,
    id: DeviceId,
    generation: u64,
    session: Arc<Session>,
    cancel: CancellationToken,
    interval: Duration,
) {
    let mut attempts: u32 = 0;

    while !cancel.is_cancelled() {
        if !session.is_connected() {
            let Some(strong) = inner.upgrade() else { break };
            strong.set_connecting(&id, generation);
            drop(strong);

            attempts = attempts.saturating_add(1);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = session.connect() => result,
            };

            if let Err(e) = result {
                if attempts == 1 {
                    tracing::warn!(device_id = %id, error = %e, "Connection attempt failed, retrying");
                } else {
                    tracing::debug!(device_id = %id, attempt = attempts, error = %e, "Connection attempt failed");
                }
                let Some(strong) = inner.upgrade() else { break };
                strong.record_failure(&id, generation, e.to_string());
            }
        }

        if session.is_connected() {
            if let Some(strong) = inner.upgrade() {
                strong.mark_connected(&id, generation, &session);
            }
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(device_id = %id, attempts, "Retry loop finished");
}

/// Restores a session that dropped, with bounded exponential backoff.
///
/// `cancel` is the session's recovery token. It is cancelled when this task
/// exits so the session can start a new recovery later.
async fn run_recovery(
    inner: Weak<Inner>,
    id: DeviceId,
    generation: u64,
    session: Arc<Session>,
    cancel: CancellationToken,
    policy: ReconnectionPolicy,
    first_delay: Duration,
) {
    let _slot = cancel.clone().drop_guard();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        if !policy.should_retry(attempt) {
            if let Some(strong) = inner.upgrade() {
                strong.give_up(
                    &id,
                    generation,
                    format!("Reconnection failed after {attempt} attempts"),
                );
            }
            return;
        }

        let delay = if attempt == 0 {
            first_delay
        } else {
            policy.delay_for_attempt(attempt)
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        if !session.is_connected() {
            tracing::info!(device_id = %id, attempt = attempt + 1, "Reconnecting");
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = session.connect() => result,
            };
            if let Err(e) = result {
                tracing::warn!(device_id = %id, attempt = attempt + 1, error = %e, "Reconnection attempt failed");
                let Some(strong) = inner.upgrade() else { return };
                strong.record_failure(&id, generation, e.to_string());
            }
        }

        if session.is_connected() {
            if let Some(strong) = inner.upgrade() {
                strong.mark_connected(&id, generation, &session);
            }
            return;
        }

        attempt += 1;
    }
}
