//! Duty-cycle scheduler for the battery temperature sensor.
//!
//! A wake cycle is one power-on episode.  Each tick the scheduler reads the
//! probe, publishes an accepted reading when the rate limit allows it, and
//! then decides whether the node may drop into deep sleep:
//!
//! ```text
//!   suspend  ⇔  published_valid_reading
//!             ∧ session_settled
//!             ∧ ¬keep_awake_requested
//!             ∧ ¬sleep_forbidden_by_override
//! ```
//!
//! A reading only counts as published when the bus session was up at the
//! time.  `session_settled` holds once the session has been up for
//! [`SESSION_SETTLE_MS`] with at least one drain since, so subscriptions
//! have gone out and retained commands had a chance to land.
//!
//! `keep_awake_requested` is true while the `<name>stayawake` toggle is ON
//! or while other inbound bus traffic arrived inside the grace window.
//! Deep sleep is terminal: nothing here survives it.

use log::{debug, info, warn};

use super::device::{ContinuousSensorDevice, Device, ToggleDevice};
use super::events::AppEvent;
use super::ports::{
    ActuatorPort, BusPort, EventSink, InboundMessage, InputPort, TransducerPort,
};
use super::timing::has_elapsed;
use crate::config::NodeConfig;
use crate::error::{DeviceError, Error};

/// Lowest plausible probe value; readings at or below it are rejected.
/// -127 °C is also the DS18B20 library's "disconnected" sentinel.
pub const VALID_MIN_C: f32 = -127.0;
/// Highest plausible value; 85 °C is the DS18B20 power-on reset value.
pub const VALID_MAX_C: f32 = 85.0;

/// Minimum time the bus session must have been up before sleeping.
pub const SESSION_SETTLE_MS: u32 = 250;

pub const TEMPERATURE_UNIT: &str = "\u{00b0}C";
pub const TEMPERATURE_CLASS: &str = "temperature";

/// Strictly inside `(VALID_MIN_C, VALID_MAX_C)`.  NaN is rejected.
pub fn is_valid_reading(value: f32) -> bool {
    value > VALID_MIN_C && value < VALID_MAX_C
}

/// The raw reading when it is usable, `SensorReadInvalid` otherwise.
pub fn accept_reading(reading: Option<f32>) -> Result<f32, Error> {
    reading
        .filter(|v| is_valid_reading(*v))
        .ok_or(Error::SensorReadInvalid)
}

/// What the runtime should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Awake,
    /// Enter deep sleep for `duration_ms`.  Never resumes.
    Suspend { duration_ms: u32 },
}

/// Timing and calibration, derived from [`NodeConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycleSettings {
    pub sample_interval_ms: u32,
    pub keep_awake_grace_ms: u32,
    pub session_settle_ms: u32,
    pub calibration_offset: f32,
}

impl From<&NodeConfig> for DutyCycleSettings {
    fn from(cfg: &NodeConfig) -> Self {
        Self {
            sample_interval_ms: cfg.sample_interval_ms(),
            keep_awake_grace_ms: cfg.keep_awake_grace_ms(),
            session_settle_ms: SESSION_SETTLE_MS,
            calibration_offset: cfg.calibration_offset(),
        }
    }
}

/// Per-boot wake state.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WakeCycle {
    pub has_published_valid_reading: bool,
    pub last_publish_ms: Option<u32>,
    pub last_bus_activity_ms: Option<u32>,
    pub sleep_forbidden_by_override: bool,
    /// Latest accepted reading not yet published (rate limited or bus down).
    pub held_reading: Option<f32>,
    /// First tick of the current bus session; `None` while disconnected.
    pub session_up_since_ms: Option<u32>,
    /// The bus was drained after `session_up_since_ms` was recorded.
    pub drained_since_session_up: bool,
}

/// Topics for the sensor node's devices.
pub struct SensorTopics {
    pub temperature_id: String,
    pub temperature_state: String,
    pub stay_awake_id: String,
    pub stay_awake_state: String,
    pub stay_awake_command: String,
}

pub fn sensor_topics(name: &str) -> SensorTopics {
    let stay_awake_id = format!("{name}stayawake");
    SensorTopics {
        temperature_id: format!("{name}temperature"),
        temperature_state: format!("temperature/{name}/state"),
        stay_awake_state: format!("switch/{stay_awake_id}/state"),
        stay_awake_command: format!("switch/{stay_awake_id}/set"),
        stay_awake_id,
    }
}

pub struct DutyCycleScheduler {
    settings: DutyCycleSettings,
    cycle: WakeCycle,
    temperature: ContinuousSensorDevice,
    stay_awake: ToggleDevice,
}

impl DutyCycleScheduler {
    pub fn new(settings: DutyCycleSettings) -> Self {
        Self {
            settings,
            cycle: WakeCycle::default(),
            temperature: ContinuousSensorDevice::new(),
            stay_awake: ToggleDevice::new(),
        }
    }

    /// Bind and announce the temperature sensor and the stay-awake toggle.
    ///
    /// The toggle's state is not forced: a retained `ON` on the broker must
    /// survive the reboot that every wake cycle is.
    pub fn bring_up(&mut self, bus: &mut impl BusPort, name: &str) -> Result<(), DeviceError> {
        let t = sensor_topics(name);
        self.temperature.bind(
            &t.temperature_id,
            &t.temperature_state,
            TEMPERATURE_UNIT,
            Some(TEMPERATURE_CLASS),
        )?;
        self.temperature.announce(bus)?;

        self.stay_awake
            .bind(bus, &t.stay_awake_id, &t.stay_awake_state, &t.stay_awake_command)?;
        self.stay_awake.announce(bus)?;
        Ok(())
    }

    /// Drain the bus and route every message.  Returns how many arrived.
    pub fn drain(&mut self, bus: &mut impl BusPort, now_ms: u32) -> Result<usize, DeviceError> {
        let msgs = bus.process_pending();
        for msg in &msgs {
            if !self.route(bus, msg, now_ms)? {
                debug!("duty: traffic on {}", msg.topic);
            }
        }
        if self.cycle.session_up_since_ms.is_some() {
            self.cycle.drained_since_session_up = true;
        }
        Ok(msgs.len())
    }

    /// Apply a stay-awake command, or count any other message as bus
    /// activity.  Returns `true` for a stay-awake command.
    ///
    /// Stay-awake commands do not open the grace window: the toggle state
    /// alone decides, so a retained `OFF` adds no awake time.
    pub fn route(
        &mut self,
        bus: &mut impl BusPort,
        msg: &InboundMessage,
        now_ms: u32,
    ) -> Result<bool, DeviceError> {
        if self.stay_awake.accepts(&msg.topic) {
            self.stay_awake.handle_command(bus, &msg.payload)?;
            return Ok(true);
        }
        self.cycle.last_bus_activity_ms = Some(now_ms);
        Ok(false)
    }

    /// Stay-awake toggle ON, or bus traffic inside the grace window.
    pub fn keep_awake_requested(&self, now_ms: u32) -> bool {
        let toggled = self.stay_awake.state().unwrap_or(false);
        let recent = self
            .cycle
            .last_bus_activity_ms
            .is_some_and(|t| !has_elapsed(now_ms, t, self.settings.keep_awake_grace_ms));
        toggled || recent
    }

    /// Session up for longer than the settle time, drained since.
    pub fn session_settled(&self, now_ms: u32) -> bool {
        self.cycle.drained_since_session_up
            && self
                .cycle
                .session_up_since_ms
                .is_some_and(|t| has_elapsed(now_ms, t, self.settings.session_settle_ms))
    }

    pub fn may_suspend(&self, now_ms: u32) -> bool {
        self.cycle.has_published_valid_reading
            && self.session_settled(now_ms)
            && !self.keep_awake_requested(now_ms)
            && !self.cycle.sleep_forbidden_by_override
    }

    fn observe_session(&mut self, connected: bool, now_ms: u32) {
        match (connected, self.cycle.session_up_since_ms) {
            (true, None) => {
                info!("duty: bus session up");
                self.cycle.session_up_since_ms = Some(now_ms);
                self.cycle.drained_since_session_up = false;
            }
            (false, Some(_)) => {
                warn!("duty: bus session lost");
                self.cycle.session_up_since_ms = None;
                self.cycle.drained_since_session_up = false;
            }
            _ => {}
        }
    }

    /// Read, maybe publish, then decide whether to suspend.
    pub fn tick<H>(
        &mut self,
        bus: &mut impl BusPort,
        hw: &mut H,
        sink: &mut impl EventSink,
        now_ms: u32,
    ) -> Result<TickOutcome, DeviceError>
    where
        H: InputPort + ActuatorPort + TransducerPort,
    {
        let connected = bus.is_connected();
        self.observe_session(connected, now_ms);

        let reading = hw.request_reading();
        match accept_reading(reading) {
            Err(e) => {
                debug!("duty: {} ({:?}), discarding", e, reading);
                sink.emit(&AppEvent::ReadingRejected(reading));
            }
            Ok(raw) => {
                let value = raw + self.settings.calibration_offset;
                let due = self
                    .cycle
                    .last_publish_ms
                    .is_none_or(|t| has_elapsed(now_ms, t, self.settings.sample_interval_ms));
                if due && connected {
                    self.temperature.set_state(bus, value, true)?;
                    self.cycle.last_publish_ms = Some(now_ms);
                    self.cycle.has_published_valid_reading = true;
                    self.cycle.held_reading = None;
                    sink.emit(&AppEvent::ReadingPublished(value));
                } else {
                    if due {
                        debug!("duty: bus down, holding {:.2}", value);
                    }
                    self.cycle.held_reading = Some(value);
                    sink.emit(&AppEvent::ReadingHeld(value));
                }
            }
        }

        self.cycle.sleep_forbidden_by_override = hw.sleep_override_active();

        if self.may_suspend(now_ms) {
            let duration_ms = self.settings.sample_interval_ms;
            info!("duty: suspending for {} ms", duration_ms);
            hw.set_probe_power(false);
            sink.emit(&AppEvent::Suspending { duration_ms });
            return Ok(TickOutcome::Suspend { duration_ms });
        }
        Ok(TickOutcome::Awake)
    }

    pub fn cycle(&self) -> &WakeCycle {
        &self.cycle
    }

    pub fn settings(&self) -> &DutyCycleSettings {
        &self.settings
    }

    pub fn temperature(&self) -> &ContinuousSensorDevice {
        &self.temperature
    }

    pub fn stay_awake(&self) -> &ToggleDevice {
        &self.stay_awake
    }
}
