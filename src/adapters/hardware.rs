//! Hardware adapter: bridges GPIO drivers and the probe to the port traits.
//!
//! Owns the inputs, the role's outputs and the transducer, exposing them
//! through [`InputPort`], [`ActuatorPort`] and [`TransducerPort`].  This is
//! the only module in the system that touches actual hardware.  On
//! non-espidf targets, the underlying drivers use cfg-gated simulation stubs.

use log::debug;

use crate::app::ports::{ActuatorPort, InputPort, TransducerPort};
use crate::drivers::input::ActiveLowInput;
use crate::drivers::output::DigitalOutput;
use crate::sensors::NoProbe;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<T> {
    reset_button: ActiveLowInput,
    sleep_override: ActiveLowInput,
    led: DigitalOutput,
    relay: Option<DigitalOutput>,
    probe_power: Option<DigitalOutput>,
    probe: T,
}

impl HardwareAdapter<NoProbe> {
    /// Controller board: relay, no probe.
    pub fn controller() -> Self {
        Self {
            reset_button: ActiveLowInput::reset_button(),
            sleep_override: ActiveLowInput::sleep_override(),
            led: DigitalOutput::status_led(),
            relay: Some(DigitalOutput::relay()),
            probe_power: None,
            probe: NoProbe,
        }
    }
}

impl<T: TransducerPort> HardwareAdapter<T> {
    /// Sensor board: switched probe supply and the probe itself.
    pub fn sensor(probe: T) -> Self {
        Self {
            reset_button: ActiveLowInput::reset_button(),
            sleep_override: ActiveLowInput::sleep_override(),
            led: DigitalOutput::status_led(),
            relay: None,
            probe_power: Some(DigitalOutput::probe_power()),
            probe,
        }
    }

    pub fn relay_on(&self) -> bool {
        self.relay.as_ref().is_some_and(DigitalOutput::is_on)
    }

    pub fn led_on(&self) -> bool {
        self.led.is_on()
    }

    pub fn probe_powered(&self) -> bool {
        self.probe_power.as_ref().is_some_and(DigitalOutput::is_on)
    }
}

// ── InputPort implementation ──────────────────────────────────

impl<T> InputPort for HardwareAdapter<T> {
    fn reset_requested(&mut self) -> bool {
        self.reset_button.is_asserted()
    }

    fn sleep_override_active(&mut self) -> bool {
        self.sleep_override.is_asserted()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<T> ActuatorPort for HardwareAdapter<T> {
    fn set_relay(&mut self, on: bool) {
        match self.relay.as_mut() {
            Some(relay) => relay.set(on),
            None => debug!("hw: no relay on this board"),
        }
    }

    fn set_status_led(&mut self, on: bool) {
        self.led.set(on);
    }

    fn set_probe_power(&mut self, on: bool) {
        match self.probe_power.as_mut() {
            Some(rail) => rail.set(on),
            None => debug!("hw: no probe supply on this board"),
        }
    }
}

// ── TransducerPort implementation ─────────────────────────────

impl<T: TransducerPort> TransducerPort for HardwareAdapter<T> {
    fn request_reading(&mut self) -> Option<f32> {
        if self.probe_power.as_ref().is_some_and(|rail| !rail.is_on()) {
            debug!("hw: probe unpowered");
            return None;
        }
        self.probe.request_reading()
    }
}
