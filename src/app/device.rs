//! Bus-bound devices: toggle, binary sensor, continuous sensor.
//!
//! Each device owns one topic pair and a locally retained value.  The
//! three variants share a [`DeviceCore`] and the [`Device`] capability
//! trait; they differ in what they bind and whether they accept commands.
//!
//! ```text
//!  Unbound ──bind──▶ Bound ──announce──▶ Announced ──set_state──▶ Active
//! ```
//!
//! The bus is passed in at every call that has a network side effect
//! rather than being stored in the device, so a node can hold many devices
//! and one bus client without shared mutable ownership.
//!
//! Discovery follows the Home Assistant MQTT convention: a retained JSON
//! document on `homeassistant/<component>/<id>/config`.

use core::fmt::Write as _;

use log::{debug, info, warn};
use serde::Serialize;

use super::commands::SwitchCommand;
use super::ports::BusPort;
use crate::error::DeviceError;

/// Root of every discovery topic.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

pub type DeviceId = heapless::String<48>;
pub type Topic = heapless::String<64>;

/// Where a device is in its bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unbound,
    Bound,
    Announced,
    Active,
}

/// Discovery component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Switch,
    BinarySensor,
    Sensor,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::BinarySensor => "binary_sensor",
            Self::Sensor => "sensor",
        }
    }
}

/// Optional descriptive fields carried in the discovery payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    pub device_class: Option<&'static str>,
    pub unit: Option<&'static str>,
}

// ───────────────────────────────────────────────────────────────
// Retained value encoding
// ───────────────────────────────────────────────────────────────

/// A value a device can retain and publish.
pub trait StateValue: Copy + PartialEq + core::fmt::Debug {
    fn encode(self) -> heapless::String<24>;
}

impl StateValue for bool {
    fn encode(self) -> heapless::String<24> {
        let mut s = heapless::String::new();
        let _ = s.push_str(if self { PAYLOAD_ON } else { PAYLOAD_OFF });
        s
    }
}

impl StateValue for f32 {
    fn encode(self) -> heapless::String<24> {
        let mut s = heapless::String::new();
        let _ = write!(s, "{:.2}", self);
        s
    }
}

// ───────────────────────────────────────────────────────────────
// Discovery payload
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DiscoveryPayload<'a> {
    name: &'a str,
    unique_id: &'a str,
    state_topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_on: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_off: Option<&'a str>,
}

/// `homeassistant/<component>/<id>/config`
pub fn discovery_topic(component: Component, id: &str) -> String {
    format!("{}/{}/{}/config", DISCOVERY_PREFIX, component.as_str(), id)
}

// ───────────────────────────────────────────────────────────────
// DeviceCore
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Binding {
    id: DeviceId,
    state_topic: Topic,
    command_topic: Option<Topic>,
    meta: Metadata,
}

/// Identity, topics and publish bookkeeping shared by every variant.
#[derive(Debug)]
pub struct DeviceCore<V> {
    component: Component,
    binding: Option<Binding>,
    discovery_sent: bool,
    retained: Option<V>,
    publish_count: u32,
}

fn bounded<const N: usize>(s: &str) -> Result<heapless::String<N>, DeviceError> {
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|_| DeviceError::TooLong)?;
    Ok(out)
}

impl<V: StateValue> DeviceCore<V> {
    pub const fn new(component: Component) -> Self {
        Self {
            component,
            binding: None,
            discovery_sent: false,
            retained: None,
            publish_count: 0,
        }
    }

    fn bind(
        &mut self,
        id: &str,
        state_topic: &str,
        command_topic: Option<&str>,
        meta: Metadata,
    ) -> Result<(), DeviceError> {
        if self.binding.is_some() {
            return Err(DeviceError::AlreadyBound);
        }
        let command_topic = match command_topic {
            Some(t) => Some(bounded(t)?),
            None => None,
        };
        self.binding = Some(Binding {
            id: bounded(id)?,
            state_topic: bounded(state_topic)?,
            command_topic,
            meta,
        });
        Ok(())
    }

    fn binding(&self) -> Result<&Binding, DeviceError> {
        self.binding.as_ref().ok_or(DeviceError::InvalidState)
    }

    /// Publish the discovery document.  Returns `Ok(false)` when it was
    /// already sent during this boot.
    pub fn announce(&mut self, bus: &mut impl BusPort) -> Result<bool, DeviceError> {
        let binding = self.binding()?;
        if self.discovery_sent {
            debug!("{}: discovery already sent", binding.id);
            return Ok(false);
        }

        let is_switch = self.component == Component::Switch;
        let payload = DiscoveryPayload {
            name: &binding.id,
            unique_id: &binding.id,
            state_topic: &binding.state_topic,
            command_topic: binding.command_topic.as_deref(),
            device_class: binding.meta.device_class,
            unit_of_measurement: binding.meta.unit,
            payload_on: is_switch.then_some(PAYLOAD_ON),
            payload_off: is_switch.then_some(PAYLOAD_OFF),
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: discovery encode failed: {}", binding.id, e);
                return Ok(false);
            }
        };
        let topic = discovery_topic(self.component, &binding.id);
        bus.publish(&topic, &body, true);
        info!("{}: discovery sent on {}", binding.id, topic);
        self.discovery_sent = true;
        Ok(true)
    }

    /// Update the retained value; publish on change or when forced.
    /// Returns whether a publish happened.
    pub fn set_state(
        &mut self,
        bus: &mut impl BusPort,
        value: V,
        force: bool,
    ) -> Result<bool, DeviceError> {
        let binding = self.binding()?;
        let changed = self.retained != Some(value);
        if !changed && !force {
            return Ok(false);
        }
        let encoded = value.encode();
        bus.publish(&binding.state_topic, encoded.as_bytes(), true);
        debug!("{}: {} -> {}", binding.id, binding.state_topic, encoded);
        self.retained = Some(value);
        self.publish_count = self.publish_count.wrapping_add(1);
        Ok(true)
    }

    pub fn state(&self) -> Option<V> {
        self.retained
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match (&self.binding, self.discovery_sent, self.retained.is_some()) {
            (None, _, _) => Lifecycle::Unbound,
            (Some(_), _, true) => Lifecycle::Active,
            (Some(_), true, false) => Lifecycle::Announced,
            (Some(_), false, false) => Lifecycle::Bound,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.id.as_str())
    }

    pub fn state_topic(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.state_topic.as_str())
    }

    pub fn command_topic(&self) -> Option<&str> {
        self.binding
            .as_ref()
            .and_then(|b| b.command_topic.as_deref())
    }

    /// State publishes since boot (changes plus forced publishes).
    pub fn publish_count(&self) -> u32 {
        self.publish_count
    }

    pub fn discovery_sent(&self) -> bool {
        self.discovery_sent
    }
}

// ───────────────────────────────────────────────────────────────
// Device capability trait
// ───────────────────────────────────────────────────────────────

/// Capabilities shared by every device variant.  Binding differs per
/// variant and lives on the concrete types.
pub trait Device {
    type Value: StateValue;

    fn core(&self) -> &DeviceCore<Self::Value>;
    fn core_mut(&mut self) -> &mut DeviceCore<Self::Value>;

    fn announce(&mut self, bus: &mut impl BusPort) -> Result<bool, DeviceError> {
        self.core_mut().announce(bus)
    }

    fn set_state(
        &mut self,
        bus: &mut impl BusPort,
        value: Self::Value,
        force: bool,
    ) -> Result<bool, DeviceError> {
        self.core_mut().set_state(bus, value, force)
    }

    fn state(&self) -> Option<Self::Value> {
        self.core().state()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core().lifecycle()
    }

    fn id(&self) -> Option<&str> {
        self.core().id()
    }
}

macro_rules! impl_device {
    ($ty:ty, $value:ty) => {
        impl Device for $ty {
            type Value = $value;

            fn core(&self) -> &DeviceCore<$value> {
                &self.core
            }

            fn core_mut(&mut self) -> &mut DeviceCore<$value> {
                &mut self.core
            }
        }
    };
}

// ───────────────────────────────────────────────────────────────
// Variants
// ───────────────────────────────────────────────────────────────

/// Commandable boolean: subscribes to a command topic, publishes state.
#[derive(Debug)]
pub struct ToggleDevice {
    core: DeviceCore<bool>,
}

impl ToggleDevice {
    pub const fn new() -> Self {
        Self {
            core: DeviceCore::new(Component::Switch),
        }
    }

    /// Bind identity and topics and subscribe to the command topic.
    pub fn bind(
        &mut self,
        bus: &mut impl BusPort,
        id: &str,
        state_topic: &str,
        command_topic: &str,
    ) -> Result<(), DeviceError> {
        self.core
            .bind(id, state_topic, Some(command_topic), Metadata::default())?;
        bus.subscribe(command_topic);
        Ok(())
    }

    /// Whether `topic` is this device's command topic.
    pub fn accepts(&self, topic: &str) -> bool {
        self.core.command_topic() == Some(topic)
    }

    /// Apply a command payload.  A recognised command always republishes
    /// the state so the sender sees an acknowledgement.  Returns whether
    /// the payload was understood.
    pub fn handle_command(
        &mut self,
        bus: &mut impl BusPort,
        payload: &[u8],
    ) -> Result<bool, DeviceError> {
        let Some(cmd) = SwitchCommand::parse(payload) else {
            warn!(
                "{}: ignoring unrecognised command {:?}",
                self.core.id().unwrap_or("?"),
                String::from_utf8_lossy(payload)
            );
            return Ok(false);
        };
        self.core.set_state(bus, cmd.as_bool(), true)?;
        Ok(true)
    }

    pub fn command_topic(&self) -> Option<&str> {
        self.core.command_topic()
    }
}

impl Default for ToggleDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl_device!(ToggleDevice, bool);

/// Publish-only boolean with a device class.
#[derive(Debug)]
pub struct BinarySensorDevice {
    core: DeviceCore<bool>,
}

impl BinarySensorDevice {
    pub const fn new() -> Self {
        Self {
            core: DeviceCore::new(Component::BinarySensor),
        }
    }

    pub fn bind(
        &mut self,
        id: &str,
        state_topic: &str,
        device_class: &'static str,
    ) -> Result<(), DeviceError> {
        let meta = Metadata {
            device_class: Some(device_class),
            unit: None,
        };
        self.core.bind(id, state_topic, None, meta)
    }
}

impl Default for BinarySensorDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl_device!(BinarySensorDevice, bool);

/// Publish-only scalar with a unit.  The caller decides when to publish.
#[derive(Debug)]
pub struct ContinuousSensorDevice {
    core: DeviceCore<f32>,
}

impl ContinuousSensorDevice {
    pub const fn new() -> Self {
        Self {
            core: DeviceCore::new(Component::Sensor),
        }
    }

    pub fn bind(
        &mut self,
        id: &str,
        state_topic: &str,
        unit: &'static str,
        device_class: Option<&'static str>,
    ) -> Result<(), DeviceError> {
        let meta = Metadata {
            device_class,
            unit: Some(unit),
        };
        self.core.bind(id, state_topic, None, meta)
    }
}

impl Default for ContinuousSensorDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl_device!(ContinuousSensorDevice, f32);
