//! The bundle of adapters a node runs on.

use super::ports::{
    ActuatorPort, BusPort, ClockPort, ConfigPort, EventSink, InputPort, TransducerPort,
    UpdatePort,
};

/// Every collaborator a node service talks to, owned in one place so the
/// services can borrow disjoint fields (`&mut p.bus` and `&mut p.hw`) in
/// the same call.
pub struct Platform<B, C, U, H, K, S> {
    pub bus: B,
    pub config: C,
    pub update: U,
    pub hw: H,
    pub clock: K,
    pub sink: S,
}

impl<B, C, U, H, K, S> Platform<B, C, U, H, K, S>
where
    B: BusPort,
    C: ConfigPort,
    U: UpdatePort,
    H: InputPort + ActuatorPort + TransducerPort,
    K: ClockPort,
    S: EventSink,
{
    pub fn new(bus: B, config: C, update: U, hw: H, clock: K, sink: S) -> Self {
        Self {
            bus,
            config,
            update,
            hw,
            clock,
            sink,
        }
    }
}
