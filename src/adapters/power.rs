//! Terminal power transitions: deep sleep and restart.
//!
//! On ESP-IDF deep sleep powers down everything but the RTC timer and the
//! wake is a cold boot, so [`PowerPort::deep_sleep`] never returns.  The
//! host simulation ends the process instead.

use log::info;

use crate::app::ports::PowerPort;

#[derive(Debug, Default)]
pub struct PowerAdapter;

impl PowerAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl PowerPort for PowerAdapter {
    #[cfg(target_os = "espidf")]
    fn deep_sleep(&mut self, duration_ms: u32) -> ! {
        info!("DEEPSLEEP {} ms", duration_ms);
        // SAFETY: esp_deep_sleep does not return; the chip resets on wake.
        unsafe { esp_idf_svc::sys::esp_deep_sleep(u64::from(duration_ms) * 1000) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&mut self, duration_ms: u32) -> ! {
        info!("DEEPSLEEP {} ms (simulation: exiting)", duration_ms);
        std::process::exit(0)
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) -> ! {
        info!("Done - Reboot");
        // SAFETY: esp_restart does not return.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) -> ! {
        info!("Done - Reboot (simulation: exiting)");
        std::process::exit(0)
    }
}
