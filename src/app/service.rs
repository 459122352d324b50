//! Node services: the hexagonal core of each firmware image.
//!
//! [`ControllerService`] and [`SensorService`] own their devices and wake
//! state.  Every collaborator is reached through the [`Platform`] passed
//! into each call, so the services run unchanged against ESP-IDF adapters
//! or the mocks in `tests/`.
//!
//! ```text
//!  initialize():  reset check ─▶ portal fields ─▶ load config ─▶ bring-up
//!  tick():        config ─▶ (gate) ─▶ update ─▶ drain bus ─▶ core logic
//!
//! The sensor only sleeps once its bus session has settled; see
//! [`DutyCycleScheduler`].
//! ```
//!
//! Until configuration is ready the tick does nothing but service the
//! portal.  Bring-up happens lazily on the first ready tick.

use log::{debug, info};

use crate::config::{NodeConfig, NodeRole};
use crate::error::{Error, Result};

use super::aggregator::DemandAggregator;
use super::duty_cycle::{DutyCycleScheduler, DutyCycleSettings, TickOutcome};
use super::events::AppEvent;
use super::platform::Platform;
use super::ports::{
    ActuatorPort, BusPort, ClockPort, ConfigPort, EventSink, InputPort, TransducerPort,
    UpdatePort,
};
use super::reset::{pulse, BootDecision, ResetSequencer};

/// Extra route served by the portal, answering with the node banner.
pub const DIAGNOSTIC_ROUTE: &str = "/custom";

/// Boot blink on the sensor node: two pulses of 200 ms.
const BOOT_PULSES: u32 = 2;
const BOOT_PULSE_MS: u32 = 200;

// ───────────────────────────────────────────────────────────────
// Shared bring-up helpers
// ───────────────────────────────────────────────────────────────

/// Suppresses core behaviour until the configuration store is ready.
#[derive(Debug, Default)]
struct ConfigGate {
    waiting_reported: bool,
}

impl ConfigGate {
    /// The stored configuration, or `ConfigurationIncomplete` while the
    /// portal is still collecting it.
    fn poll(&mut self, config: &mut impl ConfigPort, sink: &mut impl EventSink) -> Result<NodeConfig> {
        if config.is_ready() {
            if let Some(cfg) = config.load_or_enter_portal() {
                return Ok(cfg);
            }
        }
        if !self.waiting_reported {
            self.waiting_reported = true;
            sink.emit(&AppEvent::AwaitingConfiguration);
        }
        Err(Error::ConfigurationIncomplete)
    }

    /// `Ok(None)` while configuration is incomplete; any other error
    /// propagates.
    fn ready(&mut self, config: &mut impl ConfigPort, sink: &mut impl EventSink) -> Result<Option<NodeConfig>> {
        match self.poll(config, sink) {
            Ok(cfg) => Ok(Some(cfg)),
            Err(Error::ConfigurationIncomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn register_portal(config: &mut impl ConfigPort, role: NodeRole) {
    for field in role.portal_fields() {
        config.register_field(*field);
    }
    config.register_diagnostic_route(DIAGNOSTIC_ROUTE, role.banner());
}

fn open_session(bus: &mut impl BusPort, cfg: &NodeConfig) {
    info!("MQTT on: {} port: {}", cfg.mqtt_server, cfg.mqtt_port);
    bus.configure(cfg);
    bus.connect(&cfg.name, &cfg.mqtt_user, &cfg.mqtt_password);
}

// ───────────────────────────────────────────────────────────────
// ControllerService
// ───────────────────────────────────────────────────────────────

/// Boiler controller: room demand aggregation plus the master relay.
#[derive(Default)]
pub struct ControllerService {
    gate: ConfigGate,
    aggregator: Option<DemandAggregator>,
}

impl ControllerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset check, portal registration and, when configuration is
    /// already stored, bring-up.
    pub fn initialize<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
    ) -> Result<BootDecision>
    where
        B: BusPort,
        C: ConfigPort,
        U: UpdatePort,
        H: InputPort + ActuatorPort + TransducerPort,
        K: ClockPort,
        S: EventSink,
    {
        info!("{}", NodeRole::BoilerController.banner());
        let decision = ResetSequencer::default().run(&mut p.hw, &mut p.clock, &mut p.config, &mut p.sink);
        if decision == BootDecision::Restart {
            return Ok(decision);
        }

        register_portal(&mut p.config, NodeRole::BoilerController);
        if let Some(cfg) = p.config.load_or_enter_portal() {
            self.bring_up(p, &cfg)?;
        }
        Ok(BootDecision::Proceed)
    }

    pub fn tick<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
    ) -> Result<TickOutcome>
    where
        B: BusPort,
        C: ConfigPort,
        U: UpdatePort,
        H: InputPort + ActuatorPort + TransducerPort,
        K: ClockPort,
        S: EventSink,
    {
        p.config.process_pending();
        if self.aggregator.is_none() {
            let Some(cfg) = self.gate.ready(&mut p.config, &mut p.sink)? else {
                return Ok(TickOutcome::Awake);
            };
            self.bring_up(p, &cfg)?;
        }
        let Some(agg) = self.aggregator.as_mut() else {
            return Ok(TickOutcome::Awake);
        };

        p.update.process_pending();
        for msg in p.bus.process_pending() {
            if !agg.route(&mut p.bus, &msg)? {
                debug!("controller: no device for {}", msg.topic);
            }
        }
        agg.tick(&mut p.bus, &mut p.hw, &mut p.sink)?;
        Ok(TickOutcome::Awake)
    }

    fn bring_up<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
        cfg: &NodeConfig,
    ) -> Result<()>
    where
        B: BusPort,
        U: UpdatePort,
        S: EventSink,
    {
        open_session(&mut p.bus, cfg);
        let mut agg = DemandAggregator::new(cfg.room_count as usize);
        agg.bring_up(&mut p.bus)?;
        p.update.start(&cfg.name);
        self.aggregator = Some(agg);
        p.sink.emit(&AppEvent::BroughtUp(NodeRole::BoilerController));
        Ok(())
    }

    /// `None` until the node has been brought up.
    pub fn aggregator(&self) -> Option<&DemandAggregator> {
        self.aggregator.as_ref()
    }
}

// ───────────────────────────────────────────────────────────────
// SensorService
// ───────────────────────────────────────────────────────────────

/// Battery temperature sensor: publish a reading, then sleep.
#[derive(Default)]
pub struct SensorService {
    gate: ConfigGate,
    scheduler: Option<DutyCycleScheduler>,
}

impl SensorService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
    ) -> Result<BootDecision>
    where
        B: BusPort,
        C: ConfigPort,
        U: UpdatePort,
        H: InputPort + ActuatorPort + TransducerPort,
        K: ClockPort,
        S: EventSink,
    {
        p.hw.set_status_led(false);
        p.hw.set_probe_power(true);
        pulse(&mut p.hw, &mut p.clock, BOOT_PULSES, BOOT_PULSE_MS);
        info!("{}", NodeRole::TemperatureSensor.banner());

        let decision = ResetSequencer::default().run(&mut p.hw, &mut p.clock, &mut p.config, &mut p.sink);
        if decision == BootDecision::Restart {
            return Ok(decision);
        }

        register_portal(&mut p.config, NodeRole::TemperatureSensor);
        if let Some(cfg) = p.config.load_or_enter_portal() {
            self.bring_up(p, &cfg)?;
        }
        Ok(BootDecision::Proceed)
    }

    pub fn tick<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
    ) -> Result<TickOutcome>
    where
        B: BusPort,
        C: ConfigPort,
        U: UpdatePort,
        H: InputPort + ActuatorPort + TransducerPort,
        K: ClockPort,
        S: EventSink,
    {
        p.config.process_pending();
        if self.scheduler.is_none() {
            let Some(cfg) = self.gate.ready(&mut p.config, &mut p.sink)? else {
                return Ok(TickOutcome::Awake);
            };
            self.bring_up(p, &cfg)?;
        }
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Ok(TickOutcome::Awake);
        };

        p.update.process_pending();
        scheduler.drain(&mut p.bus, p.clock.now_ms())?;
        Ok(scheduler.tick(&mut p.bus, &mut p.hw, &mut p.sink, p.clock.now_ms())?)
    }

    fn bring_up<B, C, U, H, K, S>(
        &mut self,
        p: &mut Platform<B, C, U, H, K, S>,
        cfg: &NodeConfig,
    ) -> Result<()>
    where
        B: BusPort,
        U: UpdatePort,
        S: EventSink,
    {
        open_session(&mut p.bus, cfg);
        let mut scheduler = DutyCycleScheduler::new(DutyCycleSettings::from(cfg));
        scheduler.bring_up(&mut p.bus, &cfg.name)?;
        p.update.start(&cfg.name);
        self.scheduler = Some(scheduler);
        p.sink.emit(&AppEvent::BroughtUp(NodeRole::TemperatureSensor));
        Ok(())
    }

    pub fn scheduler(&self) -> Option<&DutyCycleScheduler> {
        self.scheduler.as_ref()
    }
}
