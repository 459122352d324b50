//! Integration tests for the temperature sensor wake cycle: boot blink,
//! validity filtering, rate limiting, stay-awake and the sleep decision,
//! including a bus session that comes up late.

use crate::mock_hw::{platform, sensor_config, MockHw, MockPlatform};

use heatbus::app::duty_cycle::{TickOutcome, SESSION_SETTLE_MS};
use heatbus::app::events::AppEvent;
use heatbus::app::reset::BootDecision;
use heatbus::app::service::SensorService;
use heatbus::config::NodeConfig;

const TEMP_STATE: &str = "temperature/kitchen/state";
const STAY_AWAKE_SET: &str = "switch/kitchenstayawake/set";
const STAY_AWAKE_STATE: &str = "switch/kitchenstayawake/state";

fn booted_with(cfg: NodeConfig, hw: MockHw) -> (SensorService, MockPlatform) {
    let mut p = platform(Some(cfg), hw);
    let mut svc = SensorService::new();
    assert_eq!(svc.initialize(&mut p).unwrap(), BootDecision::Proceed);
    (svc, p)
}

fn booted(hw: MockHw) -> (SensorService, MockPlatform) {
    booted_with(sensor_config("kitchen"), hw)
}

/// Publish on the first tick, then tick again once the session settled.
fn publish_and_settle(svc: &mut SensorService, p: &mut MockPlatform) -> TickOutcome {
    assert_eq!(svc.tick(p).unwrap(), TickOutcome::Awake);
    p.clock.advance(SESSION_SETTLE_MS + 1);
    svc.tick(p).unwrap()
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_powers_sensor_and_blinks_twice() {
    let (_svc, p) = booted(MockHw::reading(21.5));
    assert_eq!(p.hw.probe_power, Some(true));
    // Forced off, two on/off pulses, then left off.
    assert_eq!(p.hw.led_history, vec![false, true, false, true, false, false]);
    assert_eq!(p.clock.slept_ms, 800);
}

#[test]
fn bring_up_announces_sensor_and_stay_awake_toggle() {
    let (_svc, p) = booted(MockHw::reading(21.5));
    let doc = p
        .bus
        .last_on("homeassistant/sensor/kitchentemperature/config")
        .expect("temperature discovery");
    let json: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(json["unit_of_measurement"], "\u{00b0}C");
    assert_eq!(json["device_class"], "temperature");
    assert_eq!(json["state_topic"], TEMP_STATE);

    assert_eq!(
        p.bus.count_prefixed("homeassistant/switch/kitchenstayawake/config"),
        1
    );
    assert!(p.bus.subscriptions.contains(&STAY_AWAKE_SET.to_owned()));
    assert!(
        p.bus.payloads_on(STAY_AWAKE_STATE).is_empty(),
        "stay-awake state is not forced at bring-up"
    );
}

// ── Publish and suspend ───────────────────────────────────────

#[test]
fn first_valid_reading_publishes_then_suspends() {
    let (mut svc, mut p) = booted(MockHw::reading(21.5));
    let out = publish_and_settle(&mut svc, &mut p);

    assert_eq!(out, TickOutcome::Suspend { duration_ms: 5000 });
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["21.50"]);
    assert_eq!(p.hw.probe_power, Some(false));
    assert!(p.sink.contains(&AppEvent::ReadingPublished(21.5)));
    assert!(p.sink.contains(&AppEvent::Suspending { duration_ms: 5000 }));
}

#[test]
fn sample_interval_sets_sleep_duration() {
    let mut cfg = sensor_config("kitchen");
    cfg.sample_interval_secs = 300;
    let (mut svc, mut p) = booted_with(cfg, MockHw::reading(19.0));
    assert_eq!(
        publish_and_settle(&mut svc, &mut p),
        TickOutcome::Suspend { duration_ms: 300_000 }
    );
}

#[test]
fn invalid_readings_keep_node_awake() {
    let mut hw = MockHw::default();
    hw.script_readings(&[None, Some(85.0), Some(-127.0), Some(f32::NAN), Some(4.0)]);
    let (mut svc, mut p) = booted(hw);

    for _ in 0..4 {
        assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
        p.clock.advance(100);
    }
    assert!(p.bus.payloads_on(TEMP_STATE).is_empty());
    assert_eq!(p.hw.probe_power, Some(true));
    assert_eq!(
        p.sink.count(|e| matches!(e, AppEvent::ReadingRejected(_))),
        4
    );

    assert_eq!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { duration_ms: 5000 }
    );
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["4.00"]);
}

#[test]
fn calibration_applies_to_accepted_readings() {
    let mut cfg = sensor_config("kitchen");
    cfg.calibration_tenths = -15;
    let (mut svc, mut p) = booted_with(cfg, MockHw::reading(21.5));
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["20.00"]);
}

#[test]
fn calibration_does_not_rescue_invalid_reading() {
    let mut cfg = sensor_config("kitchen");
    cfg.calibration_tenths = -20;
    let mut hw = MockHw::default();
    hw.script_readings(&[Some(85.0), Some(84.0)]);
    let (mut svc, mut p) = booted_with(cfg, hw);

    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert!(p.bus.payloads_on(TEMP_STATE).is_empty());

    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["82.00"]);
}

// ── Sleep override and rate limiting ──────────────────────────

#[test]
fn override_jumper_forbids_sleep_and_rate_limits_publishes() {
    let mut hw = MockHw::reading(22.0);
    hw.override_fitted = true;
    let (mut svc, mut p) = booted(hw);

    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(TEMP_STATE).len(), 1);

    p.hw.steady_reading = Some(22.5);
    p.clock.advance(5000);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(TEMP_STATE).len(), 1, "interval not yet exceeded");
    assert!(p.sink.contains(&AppEvent::ReadingHeld(22.5)));

    p.clock.advance(1);
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["22.00", "22.50"]);
    assert_eq!(p.hw.probe_power, Some(true));
}

#[test]
fn removing_override_allows_suspend() {
    let mut hw = MockHw::reading(22.0);
    hw.override_fitted = true;
    let (mut svc, mut p) = booted(hw);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);

    p.hw.override_fitted = false;
    p.clock.advance(SESSION_SETTLE_MS + 1);
    assert_eq!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { duration_ms: 5000 }
    );
}

// ── Stay-awake ────────────────────────────────────────────────

#[test]
fn retained_stay_awake_survives_wake_cycle() {
    let mut p = platform(Some(sensor_config("kitchen")), MockHw::reading(20.0));
    p.bus.retain(STAY_AWAKE_SET, "ON");
    let mut svc = SensorService::new();
    svc.initialize(&mut p).unwrap();

    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(STAY_AWAKE_STATE), vec!["ON"]);
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["20.00"]);

    p.clock.advance(60_000);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
}

#[test]
fn stay_awake_off_suspends_without_grace() {
    let mut p = platform(Some(sensor_config("kitchen")), MockHw::reading(20.0));
    p.bus.retain(STAY_AWAKE_SET, "ON");
    let mut svc = SensorService::new();
    svc.initialize(&mut p).unwrap();
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);

    p.bus.inject(STAY_AWAKE_SET, "OFF");
    p.clock.advance(1000);
    assert_eq!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { duration_ms: 5000 }
    );
    assert_eq!(p.bus.payloads_on(STAY_AWAKE_STATE), vec!["ON", "OFF"]);
}

#[test]
fn any_bus_traffic_extends_wake() {
    let (mut svc, mut p) = booted(MockHw::reading(20.0));
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["20.00"]);

    p.bus.inject("unrelated/topic", "x");
    p.clock.advance(1000);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake, "traffic just arrived");

    p.clock.advance(10_000);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake, "grace is inclusive");

    p.clock.advance(1);
    assert!(matches!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { .. }
    ));
}

// ── Late bus session ──────────────────────────────────────────

fn late_booted(retained_stay_awake: Option<&str>) -> (SensorService, MockPlatform) {
    let mut p = platform(Some(sensor_config("kitchen")), MockHw::reading(20.0));
    if let Some(payload) = retained_stay_awake {
        p.bus.retain(STAY_AWAKE_SET, payload);
    }
    p.bus.late_session(2);
    let mut svc = SensorService::new();
    assert_eq!(svc.initialize(&mut p).unwrap(), BootDecision::Proceed);
    assert!(!p.bus.connected);
    (svc, p)
}

#[test]
fn late_session_holds_reading_until_connected() {
    let (mut svc, mut p) = late_booted(None);

    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert!(!p.bus.connected);
    assert!(p.bus.payloads_on(TEMP_STATE).is_empty());
    assert!(p.sink.contains(&AppEvent::ReadingHeld(20.0)));

    p.clock.advance(100);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake, "session just came up");
    assert!(p.bus.connected);
    assert_eq!(p.bus.payloads_on(TEMP_STATE), vec!["20.00"]);

    p.clock.advance(100);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake, "still settling");

    p.clock.advance(SESSION_SETTLE_MS - 100 + 1);
    assert_eq!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { duration_ms: 5000 }
    );
}

#[test]
fn late_retained_stay_awake_prevents_suspend() {
    let (mut svc, mut p) = late_booted(Some("ON"));

    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    p.clock.advance(100);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert!(p.bus.connected);
    assert!(
        p.bus.payloads_on(STAY_AWAKE_STATE).is_empty(),
        "retained command still in flight"
    );

    p.clock.advance(100);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(STAY_AWAKE_STATE), vec!["ON"]);

    p.clock.advance(60_000);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert!(!p
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Suspending { .. })));
}

#[test]
fn late_retained_stay_awake_off_adds_no_wake_time() {
    let (mut svc, mut p) = late_booted(Some("OFF"));

    svc.tick(&mut p).unwrap();
    p.clock.advance(100);
    svc.tick(&mut p).unwrap();
    p.clock.advance(100);
    assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    assert_eq!(p.bus.payloads_on(STAY_AWAKE_STATE), vec!["OFF"]);

    p.clock.advance(SESSION_SETTLE_MS);
    assert_eq!(
        svc.tick(&mut p).unwrap(),
        TickOutcome::Suspend { duration_ms: 5000 }
    );
}

// ── Unconfigured ──────────────────────────────────────────────

#[test]
fn unconfigured_sensor_never_reads_or_sleeps() {
    let mut p = platform(None, MockHw::reading(20.0));
    let mut svc = SensorService::new();
    svc.initialize(&mut p).unwrap();
    for _ in 0..3 {
        assert_eq!(svc.tick(&mut p).unwrap(), TickOutcome::Awake);
    }
    assert_eq!(p.hw.readings_taken, 0);
    assert!(p.bus.published.is_empty());
    assert_eq!(p.config.fields.len(), 10);
    assert!(svc.scheduler().is_none());
}
