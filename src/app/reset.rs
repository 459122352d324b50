//! Boot-time factory reset sequencer.
//!
//! The reset input is sampled once at boot.  If it is held, the status LED
//! blinks for the confirmation window and the input is sampled again.  Held
//! both times means "erase configuration and restart unconfigured";
//! released in between means "carry on".

use log::{error, info, warn};

use super::events::AppEvent;
use super::ports::{ActuatorPort, ClockPort, ConfigPort, EventSink, InputPort};
use crate::error::{Error, Result};

/// Outcome of the boot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    Proceed,
    /// Configuration was erased; the caller must restart.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSequencer {
    pub window_ms: u32,
    pub blink_half_period_ms: u32,
}

impl Default for ResetSequencer {
    fn default() -> Self {
        Self {
            window_ms: 10_000,
            blink_half_period_ms: 500,
        }
    }
}

impl ResetSequencer {
    pub fn run<H>(
        &self,
        hw: &mut H,
        clock: &mut impl ClockPort,
        config: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> BootDecision
    where
        H: InputPort + ActuatorPort,
    {
        match self.confirm(hw, clock, sink) {
            Ok(()) => BootDecision::Proceed,
            Err(e) => {
                warn!("reset: {}, erasing configuration", e);
                if let Err(e) = config.erase() {
                    error!("reset: erase failed: {}", e);
                }
                sink.emit(&AppEvent::FactoryReset);
                BootDecision::Restart
            }
        }
    }

    /// Sample the input, blink through the window, sample again.
    ///
    /// Held both times is `Err(Error::FactoryResetRequested)`.
    pub fn confirm<H>(
        &self,
        hw: &mut H,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        H: InputPort + ActuatorPort,
    {
        if !hw.reset_requested() {
            return Ok(());
        }

        warn!("reset: request held, confirming for {} ms", self.window_ms);
        let half = self.blink_half_period_ms.max(1);
        blink(hw, clock, self.window_ms / half, half);

        if !hw.reset_requested() {
            info!("reset: released, keeping configuration");
            sink.emit(&AppEvent::FactoryResetAborted);
            return Ok(());
        }
        Err(Error::FactoryResetRequested)
    }
}

/// Alternate the status LED `phases` times, lit first, `half_period_ms`
/// per phase, and leave it off.
pub fn blink(
    hw: &mut impl ActuatorPort,
    clock: &mut impl ClockPort,
    phases: u32,
    half_period_ms: u32,
) {
    for i in 0..phases {
        hw.set_status_led(i % 2 == 0);
        clock.delay_ms(half_period_ms);
    }
    hw.set_status_led(false);
}

/// `times` full on/off pulses.
pub fn pulse(
    hw: &mut impl ActuatorPort,
    clock: &mut impl ClockPort,
    times: u32,
    half_period_ms: u32,
) {
    blink(hw, clock, times * 2, half_period_ms);
}
