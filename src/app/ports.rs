//! Port traits: the hexagonal boundary between node logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControllerService / SensorService
//! ```
//!
//! Driven adapters (bus client, configuration store, update agent, GPIO,
//! probe, clock, power) implement these traits.  The services consume them
//! through [`Platform`](super::platform::Platform) generics, so the node
//! logic never touches hardware or the network directly.
//!
//! Collaborator calls are fire-and-forget: the bus, update and actuator
//! ports return nothing and their adapters log failures internally.  The
//! only port that reports errors is [`ConfigPort`], and only for erase.

use crate::config::{NodeConfig, PortalField};

// ───────────────────────────────────────────────────────────────
// Bus port (publish/subscribe transport)
// ───────────────────────────────────────────────────────────────

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: &str, payload: &[u8]) -> Self {
        Self {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        }
    }
}

/// The MQTT client as the node logic sees it.
///
/// Inbound traffic is not delivered through per-topic callbacks: the
/// adapter queues it and [`process_pending`](BusPort::process_pending)
/// hands the queue over once per tick, so the owning node can route each
/// message to the device that subscribed to its topic.
pub trait BusPort {
    /// Apply the node's network settings (broker address, station
    /// credentials) used by the next [`connect`](BusPort::connect).
    fn configure(&mut self, cfg: &NodeConfig);

    /// Start (or restart) the broker session.  Reconnection is the
    /// adapter's business.
    fn connect(&mut self, client_id: &str, user: &str, password: &str);

    /// Publish a payload.  Delivery failures are logged, never surfaced.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool);

    /// Register interest in a topic.
    fn subscribe(&mut self, topic: &str);

    /// Service the client and drain every message received since the
    /// previous call.  Must be called once per tick.
    fn process_pending(&mut self) -> Vec<InboundMessage>;

    /// Whether the broker session is currently up.
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (portal + persistence collaborator)
// ───────────────────────────────────────────────────────────────

/// Loads, persists and erases node configuration.
///
/// Until [`is_ready`](ConfigPort::is_ready) returns `true` the node's core
/// behaviour stays suppressed; readiness is polled on every tick.
pub trait ConfigPort {
    /// Declare a field the portal must collect.
    fn register_field(&mut self, field: PortalField);

    /// Extra route served while the portal is active.  Existence only.
    fn register_diagnostic_route(&mut self, path: &'static str, body: &'static str);

    /// Load stored configuration.  Returns `None` and enters portal mode
    /// when nothing valid is stored.
    fn load_or_enter_portal(&mut self) -> Option<NodeConfig>;

    /// Whether a complete, valid configuration is available.
    fn is_ready(&self) -> bool;

    /// Service the portal.  Called once per tick.
    fn process_pending(&mut self);

    /// Wipe every persisted configuration byte.
    fn erase(&mut self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Update port (firmware update collaborator)
// ───────────────────────────────────────────────────────────────

/// Firmware update agent.  The adapter is constructed with its channel;
/// the device identifier is the node name, known only once configuration
/// is loaded, so it arrives with [`start`](UpdatePort::start).  All failure
/// handling is internal.
pub trait UpdatePort {
    fn start(&mut self, device_id: &str);
    fn process_pending(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Physical I/O ports
// ───────────────────────────────────────────────────────────────

/// Digital inputs.  Polarity is resolved by the adapter.
pub trait InputPort {
    /// Reset-request button is held.
    fn reset_requested(&mut self) -> bool;

    /// Sleep-override jumper is fitted.
    fn sleep_override_active(&mut self) -> bool;
}

/// Digital outputs.
pub trait ActuatorPort {
    /// Energise (true) or release (false) the boiler relay.
    fn set_relay(&mut self, on: bool);

    /// Light (true) or extinguish (false) the status indicator.
    fn set_status_led(&mut self, on: bool);

    /// Power the probe's supply rail.
    fn set_probe_power(&mut self, on: bool);
}

/// The transducer driver.  `None` is the explicit "no reading" sentinel
/// (no presence pulse, CRC failure, bus fault).
pub trait TransducerPort {
    fn request_reading(&mut self) -> Option<f32>;
}

/// Monotonic boot-relative time.
pub trait ClockPort {
    /// Milliseconds since boot.  Wraps at `u32::MAX`; compare with
    /// [`elapsed_ms`](super::timing::elapsed_ms), never with `-`.
    fn now_ms(&self) -> u32;

    /// Blocking delay.  Only used during bring-up.
    fn delay_ms(&mut self, ms: u32);
}

/// Terminal power transitions.  Neither call returns.
pub trait PowerPort {
    /// Enter deep sleep; waking is a cold boot.
    fn deep_sleep(&mut self, duration_ms: u32) -> !;

    /// Restart the process from cold initialisation.
    fn restart(&mut self) -> !;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (node logic → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The services emit structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot or after reset).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
