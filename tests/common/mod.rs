// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted printer clients, sinks and video sources for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bambu_fleet::camera::{Frame, VideoCapture, VideoSource};
use bambu_fleet::client::{ClientFactory, PrinterClient, PrinterCommand, ServiceState, StatusReport};
use bambu_fleet::error::{CameraError, ClientError};
use bambu_fleet::event::{DeliverySink, DeviceId, LifecycleKind, Notification};
use bambu_fleet::session::UpdateNotifier;
use bambu_fleet::supervisor::{DeviceStatus, PrinterConfig};
use parking_lot::Mutex;

// ============================================================================
// Printer client
// ============================================================================

/// How a mock printer answers connection attempts.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub reachable: bool,
    pub connect_delay: Option<Duration>,
    pub model: String,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            reachable: true,
            connect_delay: None,
            model: "X1C".to_string(),
        }
    }
}

impl Behaviour {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::default()
        }
    }
}

pub struct MockClient {
    pub device_id: DeviceId,
    notifier: UpdateNotifier,
    behaviour: Arc<Mutex<Behaviour>>,
    report: Mutex<StatusReport>,
    connect_calls: AtomicUsize,
    commands: Mutex<Vec<PrinterCommand>>,
    reject_commands: AtomicBool,
}

impl MockClient {
    fn new(device_id: DeviceId, notifier: UpdateNotifier, behaviour: Arc<Mutex<Behaviour>>) -> Self {
        Self {
            device_id,
            notifier,
            behaviour,
            report: Mutex::new(StatusReport::default()),
            connect_calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            reject_commands: AtomicBool::new(false),
        }
    }

    /// Changes the report and notifies subscribers.
    pub fn push(&self, update: impl FnOnce(&mut StatusReport)) {
        let report = {
            let mut report = self.report.lock();
            update(&mut report);
            report.clone()
        };
        self.notifier.notify(&report);
    }

    pub fn set_service_state(&self, state: ServiceState) {
        self.push(|report| report.service_state = state);
    }

    /// Simulates the printer dropping the session.
    pub fn drop_connection(&self) {
        self.set_service_state(ServiceState::Disconnected);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.behaviour.lock().reachable = reachable;
    }

    pub fn reject_commands(&self, reject: bool) {
        self.reject_commands.store(reject, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<PrinterCommand> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl PrinterClient for MockClient {
    async fn start_session(&self) -> Result<(), ClientError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.behaviour.lock().clone();
        if let Some(delay) = behaviour.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if !behaviour.reachable {
            return Err(ClientError::ConnectionFailed("host unreachable".to_string()));
        }
        self.push(|report| {
            report.service_state = ServiceState::Connected;
            report.info.printer_model = Some(behaviour.model.as_str().into());
        });
        Ok(())
    }

    fn quit(&self) {
        self.report.lock().service_state = ServiceState::Quit;
    }

    fn service_state(&self) -> ServiceState {
        self.report.lock().service_state
    }

    fn report(&self) -> StatusReport {
        self.report.lock().clone()
    }

    async fn execute(&self, command: &PrinterCommand) -> Result<(), ClientError> {
        if !self.service_state().is_connected() {
            return Err(ClientError::NotConnected);
        }
        if self.reject_commands.load(Ordering::SeqCst) {
            return Err(ClientError::CommandRejected(command.name().to_string()));
        }
        self.commands.lock().push(command.clone());
        Ok(())
    }
}

/// Creates [`MockClient`]s and keeps them for inspection.
#[derive(Default)]
pub struct MockFactory {
    behaviours: Mutex<HashMap<DeviceId, Arc<Mutex<Behaviour>>>>,
    clients: Mutex<Vec<Arc<MockClient>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_behaviour(&self, id: &str, behaviour: Behaviour) {
        let shared = self.behaviour(&DeviceId::new(id));
        *shared.lock() = behaviour;
    }

    fn behaviour(&self, id: &DeviceId) -> Arc<Mutex<Behaviour>> {
        Arc::clone(self.behaviours.lock().entry(id.clone()).or_default())
    }

    /// Most recently created client for a device.
    pub fn latest(&self, id: &str) -> Option<Arc<MockClient>> {
        self.clients
            .lock()
            .iter()
            .rev()
            .find(|c| c.device_id.as_str() == id)
            .cloned()
    }

    pub fn clients(&self, id: &str) -> Vec<Arc<MockClient>> {
        self.clients
            .lock()
            .iter()
            .filter(|c| c.device_id.as_str() == id)
            .cloned()
            .collect()
    }

    pub fn created(&self, id: &str) -> usize {
        self.clients
            .lock()
            .iter()
            .filter(|c| c.device_id.as_str() == id)
            .count()
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, config: &PrinterConfig, notifier: UpdateNotifier) -> Arc<dyn PrinterClient> {
        let client = Arc::new(MockClient::new(
            config.id.clone(),
            notifier,
            self.behaviour(&config.id),
        ));
        self.clients.lock().push(Arc::clone(&client));
        client
    }
}

pub fn printer(id: &str) -> PrinterConfig {
    PrinterConfig::new(id, format!("{id}.local"), "12345678", format!("SERIAL-{id}"))
        .with_name(format!("Printer {id}"))
}

// ============================================================================
// Delivery sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn lifecycle(&self, id: &str) -> Vec<(LifecycleKind, String)> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Lifecycle {
                    device_id,
                    event,
                    message,
                } if device_id.as_str() == id => Some((*event, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn lifecycle_kinds(&self, id: &str) -> Vec<LifecycleKind> {
        self.lifecycle(id).into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn state_updates(&self, id: &str) -> Vec<DeviceStatus> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::StateUpdate(status) if status.device_id.as_str() == id => {
                    Some(status.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl DeliverySink for RecordingSink {
    fn deliver(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

// ============================================================================
// Video source
// ============================================================================

/// Produces solid frames. URLs listed in `refuse` fail to open.
///
/// Each successful open yields a different colour. Reads are counted across
/// all captures, and reads listed with [`MockVideoSource::fail_read`] fail.
#[derive(Default)]
pub struct MockVideoSource {
    opens: AtomicUsize,
    opened_urls: Mutex<Vec<String>>,
    refuse: Mutex<Vec<String>>,
    reads: Arc<AtomicUsize>,
    failing_reads: Arc<Mutex<Vec<usize>>>,
}

impl MockVideoSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self, url: &str) {
        self.refuse.lock().push(url.to_string());
    }

    /// Makes the `nth` read (counting from 1) fail.
    pub fn fail_read(&self, nth: usize) {
        self.failing_reads.lock().push(nth);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().clone()
    }
}

struct SolidCapture {
    rgb: [u8; 3],
    reads: Arc<AtomicUsize>,
    failing_reads: Arc<Mutex<Vec<usize>>>,
}

impl VideoCapture for SolidCapture {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let nth = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_reads.lock().contains(&nth) {
            return Err(CameraError::ReadFailed(format!("read {nth}")));
        }
        Ok(Frame::solid(64, 48, self.rgb))
    }
}

impl VideoSource for MockVideoSource {
    fn open(&self, url: &str) -> Result<Box<dyn VideoCapture>, CameraError> {
        self.opened_urls.lock().push(url.to_string());
        if self.refuse.lock().iter().any(|r| r == url) {
            return Err(CameraError::OpenFailed(url.to_string()));
        }
        let opened = self.opens.fetch_add(1, Ordering::SeqCst);
        let shade = u8::try_from(opened % 5).unwrap_or(0) * 50;
        Ok(Box::new(SolidCapture {
            rgb: [200, 30, shade],
            reads: Arc::clone(&self.reads),
            failing_reads: Arc::clone(&self.failing_reads),
        }))
    }
}

/// Polls `condition` every 10 ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
