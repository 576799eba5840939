// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration types for the connection supervisor.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::DeviceId;

/// Default MQTT-over-TLS port of the printer.
pub const DEFAULT_MQTT_PORT: u16 = 8883;

/// Connection settings for one printer.
///
/// # Examples
///
/// ```
/// use bambu_fleet::supervisor::PrinterConfig;
///
/// let config = PrinterConfig::new("x1c", "192.168.1.40", "12345678", "00M09A350100123")
///     .with_name("Workshop X1C")
///     .with_external_chamber(true);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.display_name(), "Workshop X1C");
/// assert_eq!(config.mqtt_port, 8883);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Stable device identifier, used as the key everywhere.
    pub id: DeviceId,
    /// Display name. Falls back to the ID when empty.
    pub name: String,
    /// Printer hostname or IP address.
    pub hostname: String,
    /// LAN access code shown on the printer.
    pub access_code: String,
    /// Printer serial number.
    pub serial_number: String,
    /// MQTT port.
    pub mqtt_port: u16,
    /// Whether an external chamber sensor is fitted.
    pub external_chamber: bool,
    /// Whether commands must be signed (newer firmware).
    pub sign_commands: bool,
    /// Whether to connect when the supervisor loads its configuration.
    pub auto_connect: bool,
    /// Camera stream address overriding the derived one.
    pub camera_url: Option<String>,
}

impl PrinterConfig {
    /// Creates a configuration with default flags.
    #[must_use]
    pub fn new(
        id: impl Into<DeviceId>,
        hostname: impl Into<String>,
        access_code: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            access_code: access_code.into(),
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the MQTT port.
    #[must_use]
    pub fn with_mqtt_port(mut self, port: u16) -> Self {
        self.mqtt_port = port;
        self
    }

    /// Declares an external chamber sensor.
    #[must_use]
    pub fn with_external_chamber(mut self, external: bool) -> Self {
        self.external_chamber = external;
        self
    }

    /// Enables or disables command signing.
    #[must_use]
    pub fn with_sign_commands(mut self, sign: bool) -> Self {
        self.sign_commands = sign;
        self
    }

    /// Enables or disables connecting on load.
    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Overrides the camera stream address.
    #[must_use]
    pub fn with_camera_url(mut self, url: impl Into<String>) -> Self {
        self.camera_url = Some(url.into());
        self
    }

    /// Assigns a freshly generated ID if the configuration has none.
    #[must_use]
    pub fn with_generated_id(mut self) -> Self {
        if self.id.is_empty() {
            self.id = DeviceId::generate();
        }
        self
    }

    /// Returns the name to display, falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Checks that the fields required to connect are present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for the first empty required
    /// field, or `ConfigError::InvalidValue` for a zero port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingField("id"));
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::MissingField("hostname"));
        }
        if self.access_code.is_empty() {
            return Err(ConfigError::MissingField("access_code"));
        }
        if self.serial_number.trim().is_empty() {
            return Err(ConfigError::MissingField("serial_number"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mqtt_port",
                message: "port must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Returns `true` if `other` differs in a field that requires a new
    /// connection (host, credentials, port, chamber flag, signing flag).
    #[must_use]
    pub fn connection_changed(&self, other: &Self) -> bool {
        self.hostname != other.hostname
            || self.access_code != other.access_code
            || self.serial_number != other.serial_number
            || self.mqtt_port != other.mqtt_port
            || self.external_chamber != other.external_chamber
            || self.sign_commands != other.sign_commands
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            id: DeviceId::default(),
            name: String::new(),
            hostname: String::new(),
            access_code: String::new(),
            serial_number: String::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            external_chamber: false,
            sign_commands: true,
            auto_connect: true,
            camera_url: None,
        }
    }
}

// The access code is a credential and stays out of logs.
impl fmt::Debug for PrinterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrinterConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("access_code", &"***")
            .field("serial_number", &self.serial_number)
            .field("mqtt_port", &self.mqtt_port)
            .field("external_chamber", &self.external_chamber)
            .field("sign_commands", &self.sign_commands)
            .field("auto_connect", &self.auto_connect)
            .field("camera_url", &self.camera_url.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Timing settings of the supervisor.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bambu_fleet::supervisor::SupervisorConfig;
///
/// let config = SupervisorConfig::default()
///     .with_update_throttle(Duration::from_millis(500));
///
/// assert_eq!(config.update_throttle, Duration::from_millis(500));
/// assert_eq!(config.retry_interval, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Minimum interval between two processed status updates per device.
    pub update_throttle: Duration,
    /// Pause between initial connection attempts.
    pub retry_interval: Duration,
    /// Wait before the first reconnection attempt after a dropped session.
    pub reconnect_delay: Duration,
    /// Bound on [`Supervisor::test_connection`](super::Supervisor::test_connection).
    pub test_timeout: Duration,
    /// Backoff applied to reconnection after a dropped session.
    pub reconnection: ReconnectionPolicy,
}

impl SupervisorConfig {
    /// Sets the update throttle interval.
    #[must_use]
    pub fn with_update_throttle(mut self, interval: Duration) -> Self {
        self.update_throttle = interval;
        self
    }

    /// Sets the pause between initial connection attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the wait before reconnecting a dropped session.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the connection test timeout.
    #[must_use]
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            update_throttle: Duration::from_millis(1000),
            retry_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(5),
            test_timeout: Duration::from_secs(15),
            reconnection: ReconnectionPolicy::default(),
        }
    }
}

/// Backoff for reconnecting a session that dropped unexpectedly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bambu_fleet::supervisor::ReconnectionPolicy;
///
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(3)
///     .with_initial_delay(Duration::from_secs(2));
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    /// Whether dropped sessions are reconnected at all.
    pub enabled: bool,
    /// Maximum number of attempts before giving up (None = infinite).
    pub max_retries: Option<u32>,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Retries forever.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Sets the delay before the first attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the upper bound for the delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay before attempt number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let factor = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * factor;

        // delay_ms is non-negative; saturates on overflow
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns `true` if attempt number `attempt` (zero-based) is allowed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: Some(5),
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
