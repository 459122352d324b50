//! Demand aggregator for the boiler controller.
//!
//! Up to [`MAX_ROOMS`] room toggles report "want heat".  Every tick the
//! aggregator ORs them into the `boilerdemand` binary sensor and, as a
//! separate step, drives the boiler relay from the `boilermaster` toggle.
//!
//! ```text
//!   room 1..N ──OR──▶ boilerdemand (telemetry only)
//!   boilermaster ───▶ relay ───▶ status LED
//! ```
//!
//! The aggregate never reaches the relay.  Automatic demand is reported;
//! whether the boiler may fire is the master switch's decision alone.

use log::{debug, info};

use super::device::{BinarySensorDevice, Device, ToggleDevice};
use super::events::AppEvent;
use super::ports::{ActuatorPort, BusPort, EventSink, InboundMessage};
use crate::error::{DeviceError, Error};

/// Capacity of the room demand set.
pub const MAX_ROOMS: usize = 32;

pub const MASTER_ID: &str = "boilermaster";
pub const MASTER_STATE_TOPIC: &str = "heating/boilermaster/state";
pub const MASTER_COMMAND_TOPIC: &str = "heating/boilermaster/set";

pub const DEMAND_ID: &str = "boilerdemand";
pub const DEMAND_STATE_TOPIC: &str = "heating/boilerdemand/state";
pub const DEMAND_CLASS: &str = "heat";

/// Identity and topics of one room toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTopics {
    pub id: String,
    pub state_topic: String,
    pub command_topic: String,
}

/// Topic naming for the 1-based room `index`.
pub fn room_topics(index: usize) -> RoomTopics {
    let id = format!("boilerdemand{index}");
    RoomTopics {
        state_topic: format!("switch/{id}/state"),
        command_topic: format!("switch/{id}/set"),
        id,
    }
}

/// OR over room states.  Unknown states count as no demand.
pub fn aggregate(states: impl IntoIterator<Item = Option<bool>>) -> bool {
    states.into_iter().any(|s| s.unwrap_or(false))
}

/// A room's demand, or `DeviceReadDegraded` while it has no state.
fn room_reading(room: &ToggleDevice) -> Result<bool, Error> {
    room.state().ok_or(Error::DeviceReadDegraded)
}

pub struct DemandAggregator {
    rooms: heapless::Vec<ToggleDevice, MAX_ROOMS>,
    master: ToggleDevice,
    demand: BinarySensorDevice,
    relay: Option<bool>,
}

impl DemandAggregator {
    /// Room count above [`MAX_ROOMS`] is clamped.
    pub fn new(room_count: usize) -> Self {
        let mut rooms = heapless::Vec::new();
        for _ in 0..room_count.min(MAX_ROOMS) {
            let _ = rooms.push(ToggleDevice::new());
        }
        Self {
            rooms,
            master: ToggleDevice::new(),
            demand: BinarySensorDevice::new(),
            relay: None,
        }
    }

    /// Bind, announce and force every device to `false`.
    ///
    /// Forcing the initial `OFF` overwrites whatever retained state the
    /// broker holds, so the plant always comes up with heating disabled.
    pub fn bring_up(&mut self, bus: &mut impl BusPort) -> Result<(), DeviceError> {
        self.master
            .bind(bus, MASTER_ID, MASTER_STATE_TOPIC, MASTER_COMMAND_TOPIC)?;
        self.master.announce(bus)?;
        self.master.set_state(bus, false, true)?;

        self.demand
            .bind(DEMAND_ID, DEMAND_STATE_TOPIC, DEMAND_CLASS)?;
        self.demand.announce(bus)?;
        self.demand.set_state(bus, false, true)?;

        for (i, room) in self.rooms.iter_mut().enumerate() {
            let t = room_topics(i + 1);
            room.bind(bus, &t.id, &t.state_topic, &t.command_topic)?;
            room.announce(bus)?;
            room.set_state(bus, false, true)?;
        }
        info!("aggregator: {} rooms up", self.rooms.len());
        Ok(())
    }

    /// Deliver a drained bus message to the toggle that owns its topic.
    /// Returns `false` when no toggle owns it.
    pub fn route(
        &mut self,
        bus: &mut impl BusPort,
        msg: &InboundMessage,
    ) -> Result<bool, DeviceError> {
        let target = core::iter::once(&mut self.master)
            .chain(self.rooms.iter_mut())
            .find(|d| d.accepts(&msg.topic));
        match target {
            Some(dev) => {
                dev.handle_command(bus, &msg.payload)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current OR over configured rooms.
    pub fn room_demand(&self) -> bool {
        aggregate(self.rooms.iter().enumerate().map(|(i, room)| {
            match room_reading(room) {
                Ok(on) => Some(on),
                Err(e) => {
                    debug!("aggregator: room {}: {}, counting as off", i + 1, e);
                    None
                }
            }
        }))
    }

    /// One control step: publish the aggregate, then drive the relay and
    /// status LED from the master switch.
    pub fn tick(
        &mut self,
        bus: &mut impl BusPort,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<(), DeviceError> {
        let demand = self.room_demand();
        if self.demand.set_state(bus, demand, false)? {
            sink.emit(&AppEvent::DemandChanged(demand));
        }

        let relay = self.master.state().unwrap_or(false);
        hw.set_relay(relay);
        hw.set_status_led(relay);
        if self.relay != Some(relay) {
            self.relay = Some(relay);
            sink.emit(&AppEvent::RelayChanged(relay));
        }
        Ok(())
    }

    pub fn rooms(&self) -> &[ToggleDevice] {
        &self.rooms
    }

    pub fn master(&self) -> &ToggleDevice {
        &self.master
    }

    pub fn demand(&self) -> &BinarySensorDevice {
        &self.demand
    }

    /// Relay level written by the last tick.
    pub fn relay(&self) -> Option<bool> {
        self.relay
    }
}
