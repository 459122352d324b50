//! Boiler controller entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  MqttBus (BusPort)  NvsConfigStore (ConfigPort)  UpdateAgent │
//! │  HardwareAdapter (Input + Actuator)  MonotonicClock          │
//! │  LogEventSink (EventSink)                                    │
//! │                                                              │
//! │  ───────────────── Port Trait Boundary ─────────────────     │
//! │                                                              │
//! │   ControllerService: 32 room toggles ─▶ demand indicator     │
//! │                      master switch   ─▶ boiler relay         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{anyhow, Result};
use log::{error, info, warn};

use heatbus::adapters::hardware::HardwareAdapter;
use heatbus::adapters::log_sink::LogEventSink;
use heatbus::adapters::mqtt::MqttBus;
use heatbus::adapters::nvs::NvsConfigStore;
use heatbus::adapters::ota::UpdateAgent;
use heatbus::adapters::power::PowerAdapter;
use heatbus::adapters::time::MonotonicClock;
use heatbus::adapters::wifi::WifiLink;
use heatbus::app::platform::Platform;
use heatbus::app::ports::{ClockPort, PowerPort};
use heatbus::app::reset::BootDecision;
use heatbus::app::service::ControllerService;
use heatbus::config::{NodeRole, UPDATE_CHANNEL};
use heatbus::drivers::hw_init;

/// Main loop pacing.
const LOOP_PERIOD_MS: u32 = 10;

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

#[cfg(target_os = "espidf")]
fn network_link() -> Result<WifiLink> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    WifiLink::new(peripherals.modem, sysloop)
}

#[cfg(not(target_os = "espidf"))]
fn network_link() -> Result<WifiLink> {
    Ok(WifiLink::new())
}

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;
    info!("heatbus boiler controller v{}", env!("CARGO_PKG_VERSION"));

    hw_init::init_peripherals(NodeRole::BoilerController)
        .map_err(|e| anyhow!("HAL init failed: {}", e))?;

    // ── 2. Construct adapters ─────────────────────────────────
    let config = NvsConfigStore::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let bus = MqttBus::new(network_link()?);
    #[cfg(not(target_os = "espidf"))]
    bus.injector().feed_from_stdin();

    let mut platform = Platform::new(
        bus,
        config,
        UpdateAgent::new(UPDATE_CHANNEL),
        HardwareAdapter::controller(),
        MonotonicClock::new(),
        LogEventSink::new(),
    );
    let mut power = PowerAdapter::new();

    // ── 3. Boot check and bring-up ────────────────────────────
    let mut service = ControllerService::new();
    match service.initialize(&mut platform) {
        Ok(BootDecision::Restart) => power.restart(),
        Ok(BootDecision::Proceed) => {}
        Err(e) => error!("bring-up failed: {}", e),
    }

    // ── 4. Main loop ──────────────────────────────────────────
    loop {
        if let Err(e) = service.tick(&mut platform) {
            warn!("tick: {}", e);
        }
        platform.clock.delay_ms(LOOP_PERIOD_MS);
    }
}
