//! Mock adapters for integration tests.
//!
//! Records every bus, actuator and event call so tests can assert on the
//! full history without touching GPIO, flash or a broker.

use std::collections::{HashMap, VecDeque};

use heatbus::app::events::AppEvent;
use heatbus::app::platform::Platform;
use heatbus::app::ports::{
    ActuatorPort, BusPort, ClockPort, ConfigError, ConfigPort, EventSink, InboundMessage,
    InputPort, TransducerPort, UpdatePort,
};
use heatbus::config::{NodeConfig, PortalField};

// ── MockBus ───────────────────────────────────────────────────

/// Broker stand-in: keeps retained payloads and redelivers them on
/// subscribe, like a real broker does.
///
/// By default the session comes up inside `connect` and retained payloads
/// land in the inbox at subscribe time.  [`MockBus::late_session`] makes
/// both asynchronous: the session comes up after a number of drains, and
/// retained payloads arrive one drain after their subscription goes out.
#[derive(Debug, Default)]
pub struct MockBus {
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub subscriptions: Vec<String>,
    pub inbox: VecDeque<InboundMessage>,
    pub retained: HashMap<String, Vec<u8>>,
    pub broker: Option<(String, u16)>,
    pub client_id: Option<String>,
    pub connected: bool,
    /// Drains after `connect` before the session is up; 0 connects at once.
    pub connect_after_drains: usize,
    pub deferred_retained: bool,
    session_requested: bool,
    /// Subscriptions sent but not yet answered with their retained payload.
    in_flight: Vec<String>,
}

#[allow(dead_code)]
impl MockBus {
    /// Session up on the `drains`-th drain after `connect`, retained
    /// delivery deferred.
    pub fn late_session(&mut self, drains: usize) {
        self.connect_after_drains = drains;
        self.deferred_retained = true;
    }

    fn redeliver(&mut self, topic: &str) {
        if let Some(payload) = self.retained.get(topic) {
            self.inbox
                .push_back(InboundMessage::new(topic, payload));
        }
    }

    /// A retained message already sitting on the broker.
    pub fn retain(&mut self, topic: &str, payload: &str) {
        self.retained
            .insert(topic.to_owned(), payload.as_bytes().to_vec());
    }

    /// Deliver a message on the next drain.
    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.inbox
            .push_back(InboundMessage::new(topic, payload.as_bytes()));
    }

    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, p, _)| String::from_utf8_lossy(p).into_owned())
            .collect()
    }

    pub fn last_on(&self, topic: &str) -> Option<String> {
        self.payloads_on(topic).pop()
    }

    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.published
            .iter()
            .filter(|(t, _, _)| t.starts_with(prefix))
            .count()
    }

    pub fn clear_log(&mut self) {
        self.published.clear();
    }
}

impl BusPort for MockBus {
    fn configure(&mut self, cfg: &NodeConfig) {
        self.broker = Some((cfg.mqtt_server.to_string(), cfg.mqtt_port));
    }

    fn connect(&mut self, client_id: &str, _user: &str, _password: &str) {
        self.client_id = Some(client_id.to_owned());
        if self.connect_after_drains == 0 {
            self.connected = true;
        } else {
            self.session_requested = true;
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        if retain {
            self.retained.insert(topic.to_owned(), payload.to_vec());
        }
        self.published
            .push((topic.to_owned(), payload.to_vec(), retain));
    }

    fn subscribe(&mut self, topic: &str) {
        self.subscriptions.push(topic.to_owned());
        // Offline subscriptions go out when the session comes up.
        if !self.connected {
            return;
        }
        if self.deferred_retained {
            self.in_flight.push(topic.to_owned());
        } else {
            self.redeliver(topic);
        }
    }

    fn process_pending(&mut self) -> Vec<InboundMessage> {
        for topic in std::mem::take(&mut self.in_flight) {
            self.redeliver(&topic);
        }
        if self.session_requested && !self.connected {
            self.connect_after_drains = self.connect_after_drains.saturating_sub(1);
            if self.connect_after_drains == 0 {
                self.connected = true;
                self.in_flight = self.subscriptions.clone();
            }
        }
        self.inbox.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── MockConfig ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockConfig {
    pub stored: Option<NodeConfig>,
    pub fields: Vec<PortalField>,
    pub routes: Vec<(&'static str, &'static str)>,
    pub portal_entries: usize,
    pub erase_calls: usize,
    pub process_calls: usize,
    pub fail_erase: bool,
}

#[allow(dead_code)]
impl MockConfig {
    pub fn with(cfg: Option<NodeConfig>) -> Self {
        Self {
            stored: cfg,
            ..Self::default()
        }
    }

    /// The portal user submits the form.
    pub fn submit(&mut self, cfg: NodeConfig) {
        self.stored = Some(cfg);
    }

    pub fn route(&self, path: &str) -> Option<&'static str> {
        self.routes
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, body)| *body)
    }
}

impl ConfigPort for MockConfig {
    fn register_field(&mut self, field: PortalField) {
        self.fields.push(field);
    }

    fn register_diagnostic_route(&mut self, path: &'static str, body: &'static str) {
        self.routes.push((path, body));
    }

    fn load_or_enter_portal(&mut self) -> Option<NodeConfig> {
        if self.stored.is_none() {
            self.portal_entries += 1;
        }
        self.stored.clone()
    }

    fn is_ready(&self) -> bool {
        self.stored.is_some()
    }

    fn process_pending(&mut self) {
        self.process_calls += 1;
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        self.erase_calls += 1;
        if self.fail_erase {
            return Err(ConfigError::IoError);
        }
        self.stored = None;
        Ok(())
    }
}

// ── MockUpdate ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockUpdate {
    pub started_as: Vec<String>,
    pub polls: usize,
}

impl UpdatePort for MockUpdate {
    fn start(&mut self, device_id: &str) {
        self.started_as.push(device_id.to_owned());
    }

    fn process_pending(&mut self) {
        self.polls += 1;
    }
}

// ── MockHw ────────────────────────────────────────────────────

/// Inputs are scripted, outputs recorded.
#[derive(Debug, Default)]
pub struct MockHw {
    /// Successive reset-button samples; `reset_held` once exhausted.
    pub reset_samples: VecDeque<bool>,
    pub reset_held: bool,
    pub override_fitted: bool,
    /// Successive probe readings; `steady_reading` once exhausted.
    pub readings: VecDeque<Option<f32>>,
    pub steady_reading: Option<f32>,
    pub relay: Option<bool>,
    pub led: Option<bool>,
    pub led_history: Vec<bool>,
    pub probe_power: Option<bool>,
    pub readings_taken: usize,
}

#[allow(dead_code)]
impl MockHw {
    pub fn reading(value: f32) -> Self {
        Self {
            steady_reading: Some(value),
            ..Self::default()
        }
    }

    pub fn script_readings(&mut self, readings: &[Option<f32>]) {
        self.readings.extend(readings.iter().copied());
    }
}

impl InputPort for MockHw {
    fn reset_requested(&mut self) -> bool {
        self.reset_samples.pop_front().unwrap_or(self.reset_held)
    }

    fn sleep_override_active(&mut self) -> bool {
        self.override_fitted
    }
}

impl ActuatorPort for MockHw {
    fn set_relay(&mut self, on: bool) {
        self.relay = Some(on);
    }

    fn set_status_led(&mut self, on: bool) {
        self.led = Some(on);
        self.led_history.push(on);
    }

    fn set_probe_power(&mut self, on: bool) {
        self.probe_power = Some(on);
    }
}

impl TransducerPort for MockHw {
    fn request_reading(&mut self) -> Option<f32> {
        self.readings_taken += 1;
        self.readings.pop_front().unwrap_or(self.steady_reading)
    }
}

// ── MockClock ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockClock {
    pub now: u32,
    pub slept_ms: u64,
}

#[allow(dead_code)]
impl MockClock {
    pub fn starting_at(now: u32) -> Self {
        Self { now, slept_ms: 0 }
    }

    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u32 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.slept_ms += u64::from(ms);
        self.advance(ms);
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Platform helpers ──────────────────────────────────────────

pub type MockPlatform = Platform<MockBus, MockConfig, MockUpdate, MockHw, MockClock, RecordingSink>;

pub fn platform(stored: Option<NodeConfig>, hw: MockHw) -> MockPlatform {
    Platform::new(
        MockBus::default(),
        MockConfig::with(stored),
        MockUpdate::default(),
        hw,
        MockClock::default(),
        RecordingSink::default(),
    )
}

#[allow(dead_code)]
pub fn controller_config(rooms: u8) -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.mqtt_server.push_str("192.168.1.10").unwrap();
    cfg.name.push_str("boiler").unwrap();
    cfg.room_count = rooms;
    cfg
}

#[allow(dead_code)]
pub fn sensor_config(name: &str) -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.mqtt_server.push_str("192.168.1.10").unwrap();
    cfg.name.push_str(name).unwrap();
    cfg
}
