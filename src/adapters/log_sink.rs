//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the logger
//! (UART on the board, stderr on the host).  Per-tick reading events are
//! logged at debug level so a sensor left awake does not flood the console.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::AwaitingConfiguration => {
                info!("CONFIG | waiting for portal configuration");
            }
            AppEvent::BroughtUp(role) => {
                info!("START | {:?} up", role);
            }
            AppEvent::FactoryReset => {
                warn!("RESET | configuration erased");
            }
            AppEvent::FactoryResetAborted => {
                info!("RESET | aborted, button released");
            }
            AppEvent::DemandChanged(on) => {
                info!("DEMAND | {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::RelayChanged(on) => {
                info!("RELAY | {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::ReadingRejected(value) => {
                debug!("TEMP | rejected {:?}", value);
            }
            AppEvent::ReadingPublished(value) => {
                info!("TEMP | published {:.2}\u{00b0}C", value);
            }
            AppEvent::ReadingHeld(value) => {
                debug!("TEMP | held {:.2}\u{00b0}C", value);
            }
            AppEvent::Suspending { duration_ms } => {
                info!("SLEEP | {} ms", duration_ms);
            }
        }
    }
}
