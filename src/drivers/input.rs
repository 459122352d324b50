//! Active-low digital inputs: the reset button and the sleep-override jumper.
//!
//! Both idle HIGH through the internal pull-up and read LOW when the button
//! is held or the jumper is fitted.  Sampled directly; the reset sequencer
//! samples twice ten seconds apart, so no debouncing is needed.

use crate::drivers::hw_init;
use crate::pins;

pub struct ActiveLowInput {
    gpio: i32,
}

impl ActiveLowInput {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub const fn reset_button() -> Self {
        Self::new(pins::RESET_GPIO)
    }

    pub const fn sleep_override() -> Self {
        Self::new(pins::SLEEP_OVERRIDE_GPIO)
    }

    /// Pin reads LOW.
    pub fn is_asserted(&self) -> bool {
        !hw_init::gpio_read(self.gpio)
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
