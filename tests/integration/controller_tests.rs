//! Integration tests for the boiler controller: portal gating, bring-up,
//! room demand aggregation and the master relay.

use crate::mock_hw::{controller_config, platform, MockHw, MockPlatform};

use heatbus::app::aggregator::{
    DEMAND_STATE_TOPIC, MASTER_COMMAND_TOPIC, MASTER_STATE_TOPIC,
};
use heatbus::app::device::Device;
use heatbus::app::events::AppEvent;
use heatbus::app::reset::BootDecision;
use heatbus::app::service::{ControllerService, DIAGNOSTIC_ROUTE};
use heatbus::config::NodeRole;

fn room_set(n: usize) -> String {
    format!("switch/boilerdemand{n}/set")
}

fn room_state(n: usize) -> String {
    format!("switch/boilerdemand{n}/state")
}

fn booted(rooms: u8) -> (ControllerService, MockPlatform) {
    let mut p = platform(Some(controller_config(rooms)), MockHw::default());
    let mut svc = ControllerService::new();
    assert_eq!(svc.initialize(&mut p).unwrap(), BootDecision::Proceed);
    (svc, p)
}

// ── Configuration gate ────────────────────────────────────────

#[test]
fn unconfigured_node_only_serves_portal() {
    let mut p = platform(None, MockHw::default());
    let mut svc = ControllerService::new();

    assert_eq!(svc.initialize(&mut p).unwrap(), BootDecision::Proceed);
    for _ in 0..5 {
        svc.tick(&mut p).unwrap();
    }

    assert_eq!(p.config.fields.len(), 8);
    assert!(p.config.fields.iter().any(|f| f.name == "rooms"));
    assert_eq!(
        p.config.route(DIAGNOSTIC_ROUTE),
        Some(NodeRole::BoilerController.banner())
    );
    assert_eq!(p.config.portal_entries, 1);
    assert_eq!(p.config.process_calls, 5);
    assert!(p.bus.published.is_empty());
    assert!(!p.bus.connected);
    assert!(p.update.started_as.is_empty());
    assert_eq!(p.update.polls, 0);
    assert_eq!(p.hw.relay, None);
    assert!(svc.aggregator().is_none());
    assert_eq!(
        p.sink.count(|e| *e == AppEvent::AwaitingConfiguration),
        1,
        "waiting is reported once, not every tick"
    );
}

#[test]
fn portal_submission_brings_node_up_without_reboot() {
    let mut p = platform(None, MockHw::default());
    let mut svc = ControllerService::new();
    svc.initialize(&mut p).unwrap();
    svc.tick(&mut p).unwrap();

    p.config.submit(controller_config(4));
    svc.tick(&mut p).unwrap();

    assert_eq!(p.bus.broker, Some(("192.168.1.10".to_owned(), 1883)));
    assert_eq!(p.bus.client_id.as_deref(), Some("boiler"));
    assert_eq!(p.update.started_as, vec!["boiler".to_owned()]);
    assert!(p.sink.contains(&AppEvent::BroughtUp(NodeRole::BoilerController)));
    assert_eq!(svc.aggregator().map(|a| a.rooms().len()), Some(4));
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn bring_up_announces_every_device_and_forces_off() {
    let (_svc, p) = booted(32);

    // 32 rooms + master + demand indicator.
    assert_eq!(p.bus.count_prefixed("homeassistant/"), 34);
    assert!(p
        .bus
        .published
        .iter()
        .filter(|(t, _, _)| t.starts_with("homeassistant/"))
        .all(|(_, _, retain)| *retain));

    assert_eq!(p.bus.payloads_on(MASTER_STATE_TOPIC), vec!["OFF"]);
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["OFF"]);
    for n in 1..=32 {
        assert_eq!(p.bus.payloads_on(&room_state(n)), vec!["OFF"], "room {n}");
        assert!(p.bus.subscriptions.contains(&room_set(n)));
    }
    assert!(p.bus.subscriptions.contains(&MASTER_COMMAND_TOPIC.to_owned()));
}

#[test]
fn discovery_document_describes_switch() {
    let (_svc, p) = booted(1);
    let doc = p
        .bus
        .last_on("homeassistant/switch/boilerdemand1/config")
        .expect("room discovery published");
    let json: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(json["unique_id"], "boilerdemand1");
    assert_eq!(json["state_topic"], "switch/boilerdemand1/state");
    assert_eq!(json["command_topic"], "switch/boilerdemand1/set");
    assert_eq!(json["payload_on"], "ON");

    let demand = p
        .bus
        .last_on("homeassistant/binary_sensor/boilerdemand/config")
        .expect("demand discovery published");
    let json: serde_json::Value = serde_json::from_str(&demand).unwrap();
    assert_eq!(json["device_class"], "heat");
    assert!(json.get("command_topic").is_none());
}

// ── Demand aggregation ────────────────────────────────────────

#[test]
fn any_room_on_raises_demand_without_touching_relay() {
    let (mut svc, mut p) = booted(32);
    svc.tick(&mut p).unwrap();
    p.bus.clear_log();

    p.bus.inject(&room_set(17), "ON");
    svc.tick(&mut p).unwrap();

    assert_eq!(p.bus.payloads_on(&room_state(17)), vec!["ON"]);
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["ON"]);
    assert_eq!(p.hw.relay, Some(false));
    assert_eq!(p.hw.led, Some(false));
    assert!(p.sink.contains(&AppEvent::DemandChanged(true)));

    p.bus.inject(&room_set(3), "on");
    p.bus.inject(&room_set(17), "OFF");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["ON"], "still demanded by room 3");

    p.bus.inject(&room_set(3), "0");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["ON", "OFF"]);
}

#[test]
fn steady_demand_is_not_republished() {
    let (mut svc, mut p) = booted(2);
    p.bus.inject(&room_set(1), "ON");
    for _ in 0..10 {
        svc.tick(&mut p).unwrap();
    }
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["OFF", "ON"]);
}

#[test]
fn master_switch_alone_drives_relay_and_led() {
    let (mut svc, mut p) = booted(32);

    p.bus.inject(MASTER_COMMAND_TOPIC, "ON");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.hw.relay, Some(true));
    assert_eq!(p.hw.led, Some(true));
    assert_eq!(p.bus.last_on(DEMAND_STATE_TOPIC).as_deref(), Some("OFF"));
    assert_eq!(p.bus.last_on(MASTER_STATE_TOPIC).as_deref(), Some("ON"));

    p.bus.inject(MASTER_COMMAND_TOPIC, "false");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.hw.relay, Some(false));
    assert_eq!(p.hw.led, Some(false));
    assert_eq!(
        p.sink.count(|e| matches!(e, AppEvent::RelayChanged(_))),
        2,
        "ON, then OFF"
    );
}

#[test]
fn repeated_command_is_acknowledged() {
    let (mut svc, mut p) = booted(2);
    p.bus.inject(&room_set(2), "ON");
    p.bus.inject(&room_set(2), "ON");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.payloads_on(&room_state(2)), vec!["OFF", "ON", "ON"]);
}

#[test]
fn unrecognised_payloads_and_topics_are_ignored() {
    let (mut svc, mut p) = booted(2);
    svc.tick(&mut p).unwrap();
    p.bus.clear_log();

    p.bus.inject(&room_set(1), "toggle");
    p.bus.inject(&room_set(9), "ON");
    p.bus.inject("some/other/topic", "ON");
    svc.tick(&mut p).unwrap();

    assert!(p.bus.published.is_empty());
    let agg = svc.aggregator().expect("brought up");
    assert_eq!(agg.rooms()[0].state(), Some(false));
}

#[test]
fn zero_rooms_never_demands() {
    let (mut svc, mut p) = booted(0);
    p.bus.inject(&room_set(1), "ON");
    svc.tick(&mut p).unwrap();
    assert_eq!(p.bus.count_prefixed("homeassistant/"), 2);
    assert_eq!(p.bus.payloads_on(DEMAND_STATE_TOPIC), vec!["OFF"]);
}

#[test]
fn update_agent_serviced_every_configured_tick() {
    let (mut svc, mut p) = booted(1);
    for _ in 0..3 {
        svc.tick(&mut p).unwrap();
    }
    assert_eq!(p.update.polls, 3);
    assert_eq!(p.config.process_calls, 3);
}
