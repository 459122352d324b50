//! Outbound application events.
//!
//! The node services emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count them in a test,
//! forward them somewhere else.

use crate::config::NodeRole;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Configuration is not ready; core behaviour is suppressed.
    AwaitingConfiguration,

    /// Devices are bound, announced and the bus session is started.
    BroughtUp(NodeRole),

    /// Reset input held across the whole window; configuration erased.
    FactoryReset,

    /// Reset input was released during the window; boot continues.
    FactoryResetAborted,

    /// The aggregated room demand changed.
    DemandChanged(bool),

    /// The relay output changed.
    RelayChanged(bool),

    /// A transducer reading was discarded (`None` = no reading at all).
    ReadingRejected(Option<f32>),

    /// A reading was published on the bus.
    ReadingPublished(f32),

    /// A valid reading arrived inside the rate-limit window and was kept locally.
    ReadingHeld(f32),

    /// The node is about to deep-sleep.
    Suspending { duration_ms: u32 },
}
