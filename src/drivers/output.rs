//! Digital output driver for the relay, status LED and probe supply.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: hw_init records the level in the simulated pin bank.

use log::debug;

use crate::drivers::hw_init;
use crate::pins;

pub struct DigitalOutput {
    gpio: i32,
    active_low: bool,
    on: bool,
}

impl DigitalOutput {
    /// A released output on `gpio`.  Nothing is written until [`set`].
    ///
    /// [`set`]: Self::set
    pub const fn new(gpio: i32, active_low: bool) -> Self {
        Self {
            gpio,
            active_low,
            on: false,
        }
    }

    pub const fn relay() -> Self {
        Self::new(pins::RELAY_GPIO, false)
    }

    pub const fn status_led() -> Self {
        Self::new(pins::STATUS_LED_GPIO, true)
    }

    pub const fn probe_power() -> Self {
        Self::new(pins::PROBE_POWER_GPIO, false)
    }

    /// Energise (`true`) or release the load.  The pin is rewritten every
    /// call so a glitched level is corrected on the next tick.
    pub fn set(&mut self, on: bool) {
        if on != self.on {
            debug!("gpio{}: {}", self.gpio, if on { "on" } else { "off" });
        }
        hw_init::gpio_write(self.gpio, on != self.active_low);
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
