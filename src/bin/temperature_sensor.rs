//! Battery temperature sensor entry point.
//!
//! Each boot is one wake cycle: read the DS18B20, publish an accepted
//! reading, then deep sleep for the sample interval.  Waking from deep
//! sleep is a cold boot back into `main`.
//!
//! ```text
//!  boot ─▶ blink ─▶ reset check ─▶ config ─▶ tick … ─▶ publish ─▶ deep sleep
//!                                                ▲                    │
//!                                                └──── stay-awake ────┘
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
use heatbus::app::duty_cycle::TickOutcome;
use heatbus::app::platform::Platform;
use heatbus::app::ports::{ClockPort, PowerPort};
use heatbus::app::reset::BootDecision;
use heatbus::app::service::SensorService;
use heatbus::config::{NodeRole, UPDATE_CHANNEL};
use heatbus::drivers::hw_init;

/// Main loop pacing while awake.
const LOOP_PERIOD_MS: u32 = 10;

#[cfg(target_os = "espidf")]
type Probe = heatbus::sensors::ds18b20::Ds18b20<
    heatbus::drivers::onewire::GpioOneWire<
        esp_idf_svc::hal::gpio::PinDriver<
            'static,
            esp_idf_svc::hal::gpio::Gpio4,
            esp_idf_svc::hal::gpio::InputOutput,
        >,
        esp_idf_svc::hal::delay::Ets,
    >,
    esp_idf_svc::hal::delay::Ets,
>;

#[cfg(not(target_os = "espidf"))]
type Probe = heatbus::sensors::ds18b20::SimProbe;

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

/// Network link and probe, both carved out of the chip peripherals.
#[cfg(target_os = "espidf")]
fn board() -> Result<(WifiLink, Probe)> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::delay::Ets;
    use esp_idf_svc::hal::gpio::PinDriver;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use heatbus::drivers::onewire::GpioOneWire;
    use heatbus::sensors::ds18b20::Ds18b20;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let data_pin = PinDriver::input_output_od(peripherals.pins.gpio4)?;
    let probe = Ds18b20::new(GpioOneWire::new(data_pin, Ets), Ets);
    Ok((WifiLink::new(peripherals.modem, sysloop)?, probe))
}

#[cfg(not(target_os = "espidf"))]
fn board() -> Result<(WifiLink, Probe)> {
    if let Ok(raw) = std::env::var("HEATBUS_SIM_TEMP") {
        let celsius = raw.parse::<f32>().ok();
        heatbus::sensors::ds18b20::sim_set_temperature(celsius);
    }
    Ok((WifiLink::new(), Probe::default()))
}

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;
    info!("heatbus temperature sensor v{}", env!("CARGO_PKG_VERSION"));

    hw_init::init_peripherals(NodeRole::TemperatureSensor)
        .map_err(|e| anyhow!("HAL init failed: {}", e))?;

    // ── 2. Construct adapters ─────────────────────────────────
    let config = NvsConfigStore::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let (link, probe) = board()?;
    let bus = MqttBus::new(link);
    #[cfg(not(target_os = "espidf"))]
    bus.injector().feed_from_stdin();

    let mut platform = Platform::new(
        bus,
        config,
        UpdateAgent::new(UPDATE_CHANNEL),
        HardwareAdapter::sensor(probe),
        MonotonicClock::new(),
        LogEventSink::new(),
    );
    let mut power = PowerAdapter::new();

    // ── 3. Boot check and bring-up ────────────────────────────
    let mut service = SensorService::new();
    match service.initialize(&mut platform) {
        Ok(BootDecision::Restart) => power.restart(),
        Ok(BootDecision::Proceed) => {}
        Err(e) => error!("bring-up failed: {}", e),
    }

    // ── 4. Wake cycle ─────────────────────────────────────────
    loop {
        match service.tick(&mut platform) {
            Ok(TickOutcome::Suspend { duration_ms }) => power.deep_sleep(duration_ms),
            Ok(TickOutcome::Awake) => {}
            Err(e) => warn!("tick: {}", e),
        }
        platform.clock.delay_ms(LOOP_PERIOD_MS);
    }
}
