//! Node configuration parameters
//!
//! Everything a node needs to join the bus and run its control loop.
//! Values are entered through the provisioning portal, persisted by the
//! [`ConfigPort`](crate::app::ports::ConfigPort) adapter, and erased by a
//! factory reset.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::app::aggregator::MAX_ROOMS;

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Update channel the update agent listens on.
pub const UPDATE_CHANNEL: &str = "heatbus";

/// Which firmware image this node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    BoilerController,
    TemperatureSensor,
}

impl NodeRole {
    /// Banner served on the portal's diagnostic route.
    pub fn banner(self) -> &'static str {
        match self {
            Self::BoilerController => "heatbus boiler controller",
            Self::TemperatureSensor => "heatbus temperature sensor",
        }
    }

    /// Fields the portal collects for this role.
    pub fn portal_fields(self) -> &'static [PortalField] {
        match self {
            Self::BoilerController => CONTROLLER_FIELDS,
            Self::TemperatureSensor => SENSOR_FIELDS,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Bus ---
    /// Broker address (dotted IPv4 or short hostname)
    pub mqtt_server: heapless::String<15>,
    /// Broker TCP port
    pub mqtt_port: u16,
    /// Broker user (empty = anonymous)
    pub mqtt_user: heapless::String<32>,
    /// Broker password
    pub mqtt_password: heapless::String<32>,

    /// WiFi station SSID (empty = no station join, host simulation)
    pub wifi_ssid: heapless::String<32>,
    /// WiFi station password
    pub wifi_password: heapless::String<64>,

    // --- Identity ---
    /// Node display name; also the bus client id and update device id
    pub name: heapless::String<32>,

    // --- Sensor node ---
    /// Publish interval and deep-sleep duration (seconds)
    pub sample_interval_secs: u32,
    /// Calibration offset added to accepted readings (tenths of a degree)
    pub calibration_tenths: i32,
    /// How long inbound bus traffic keeps the node awake (seconds)
    pub keep_awake_grace_secs: u32,

    // --- Controller node ---
    /// Number of room demand switches exposed (0-32)
    pub room_count: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mqtt_server: heapless::String::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_user: heapless::String::new(),
            mqtt_password: heapless::String::new(),
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            name: heapless::String::new(),

            sample_interval_secs: 5,
            calibration_tenths: 0,
            keep_awake_grace_secs: 10,

            room_count: MAX_ROOMS as u8,
        }
    }
}

impl NodeConfig {
    /// Sample interval in milliseconds (also the deep-sleep duration).
    pub fn sample_interval_ms(&self) -> u32 {
        self.sample_interval_secs.saturating_mul(1000)
    }

    pub fn keep_awake_grace_ms(&self) -> u32 {
        self.keep_awake_grace_secs.saturating_mul(1000)
    }

    /// Calibration offset in degrees.
    pub fn calibration_offset(&self) -> f32 {
        self.calibration_tenths as f32 / 10.0
    }

    /// Range-check every field.  Adapters call this before persisting and
    /// after loading; invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_server.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_server must not be empty"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be 1-65535"));
        }
        if self.name.is_empty() {
            return Err(ConfigError::ValidationFailed("name must not be empty"));
        }
        if !self
            .name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::ValidationFailed(
                "name may only contain ASCII letters, digits, '-' and '_'",
            ));
        }
        if !(1..=3600).contains(&self.sample_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_secs must be 1-3600",
            ));
        }
        if !(-500..=500).contains(&self.calibration_tenths) {
            return Err(ConfigError::ValidationFailed(
                "calibration_tenths must be -500..=500",
            ));
        }
        if self.keep_awake_grace_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "keep_awake_grace_secs must be 0-600",
            ));
        }
        if self.room_count as usize > MAX_ROOMS {
            return Err(ConfigError::ValidationFailed("room_count must be 0-32"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Portal field schema
// ---------------------------------------------------------------------------

/// How the portal renders and bounds a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text with a maximum byte length.
    Text { max_len: usize },
    /// Integer with the value pre-filled on first boot.
    Integer { default: i64 },
}

/// One field registered with the configuration collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalField {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str, max_len: usize) -> PortalField {
    PortalField {
        name,
        kind: FieldKind::Text { max_len },
    }
}

const fn integer(name: &'static str, default: i64) -> PortalField {
    PortalField {
        name,
        kind: FieldKind::Integer { default },
    }
}

const CONTROLLER_FIELDS: &[PortalField] = &[
    text("wifissid", 32),
    text("wifipassword", 64),
    text("mqttserver", 15),
    text("name", 32),
    integer("mqttport", DEFAULT_MQTT_PORT as i64),
    text("mqttuser", 32),
    text("mqttpassword", 32),
    integer("rooms", MAX_ROOMS as i64),
];

const SENSOR_FIELDS: &[PortalField] = &[
    text("wifissid", 32),
    text("wifipassword", 64),
    integer("calibration", 0),
    integer("sleeptime", 5),
    text("mqttserver", 15),
    text("name", 32),
    integer("mqttport", DEFAULT_MQTT_PORT as i64),
    text("mqttuser", 32),
    text("mqttpassword", 32),
    integer("stayawake", 10),
];
