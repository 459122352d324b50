//! MQTT bus adapter.
//!
//! Implements [`BusPort`].  Inbound messages are queued by the receiver
//! and drained by [`BusPort::process_pending`] once per tick, so routing
//! happens on the node's own loop rather than in a client callback.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` over the [`WifiLink`].  A
//!   receiver thread pumps the connection, queues complete payloads and
//!   flags a re-subscribe whenever the session (re)connects.
//! - **all other targets**: an in-process broker that keeps retained
//!   messages, records every publish and accepts injected traffic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use super::time::MonotonicClock;
use super::wifi::WifiLink;
use crate::app::ports::{BusPort, ClockPort, InboundMessage};
use crate::config::NodeConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

/// Payloads above this size are dropped on receipt.
pub const MAX_PAYLOAD_BYTES: usize = 256;

type Inbox = Arc<Mutex<VecDeque<InboundMessage>>>;

fn push_inbound(inbox: &Inbox, topic: &str, data: &[u8]) {
    if data.len() > MAX_PAYLOAD_BYTES {
        warn!("mqtt: dropping oversized payload on {} ({} bytes)", topic, data.len());
        return;
    }
    inbox
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(InboundMessage::new(topic, data));
}

pub struct MqttBus {
    link: WifiLink,
    clock: MonotonicClock,
    host: heapless::String<15>,
    port: u16,
    subscriptions: Vec<String>,
    inbox: Inbox,
    connected: Arc<AtomicBool>,
    resubscribe: Arc<AtomicBool>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    broker: SimBroker,
}

impl MqttBus {
    pub fn new(link: WifiLink) -> Self {
        Self {
            link,
            clock: MonotonicClock::new(),
            host: heapless::String::new(),
            port: crate::config::DEFAULT_MQTT_PORT,
            subscriptions: Vec::new(),
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            connected: Arc::new(AtomicBool::new(false)),
            resubscribe: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            broker: SimBroker::default(),
        }
    }

    pub fn broker_url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    fn resubscribe_all(&mut self) {
        for topic in self.subscriptions.clone() {
            self.platform_subscribe(&topic);
        }
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, client_id: &str, user: &str, password: &str) {
        let url = self.broker_url();
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: if user.is_empty() { None } else { Some(user) },
            password: if password.is_empty() { None } else { Some(password) },
            ..Default::default()
        };
        match EspMqttClient::new(url.as_str(), &conf) {
            Ok((client, conn)) => {
                self.client = Some(client);
                self.spawn_receiver(conn);
                info!("mqtt: session to {} started", url);
            }
            Err(e) => warn!("mqtt: client for {} failed: {:?}", url, e),
        }
    }

    #[cfg(target_os = "espidf")]
    fn spawn_receiver(&self, mut conn: EspMqttConnection) {
        let inbox = Arc::clone(&self.inbox);
        let connected = Arc::clone(&self.connected);
        let resubscribe = Arc::clone(&self.resubscribe);
        let spawned = std::thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(8 * 1024)
            .spawn(move || loop {
                match conn.next() {
                    Ok(event) => match event.payload() {
                        EventPayload::Connected(_) => {
                            info!("mqtt: connected");
                            // Flag the resubscribe first: once the node sees
                            // the session up, the next drain must send them.
                            resubscribe.store(true, Ordering::Release);
                            connected.store(true, Ordering::Release);
                        }
                        EventPayload::Disconnected => {
                            warn!("mqtt: disconnected");
                            connected.store(false, Ordering::Relaxed);
                        }
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            details,
                            ..
                        } => {
                            if matches!(details, Details::Complete) {
                                push_inbound(&inbox, topic, data);
                            }
                        }
                        _ => {}
                    },
                    Err(e) => {
                        connected.store(false, Ordering::Relaxed);
                        warn!("mqtt: receive loop error: {:?}", e);
                        std::thread::sleep(std::time::Duration::from_secs(2));
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("mqtt: receiver thread failed to start: {}", e);
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        let Some(client) = self.client.as_mut() else {
            warn!("mqtt: publish on {} before connect", topic);
            return;
        };
        if let Err(e) = client.enqueue(topic, QoS::AtMostOnce, retain, payload) {
            warn!("mqtt: publish on {} failed: {:?}", topic, e);
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) {
        if !self.connected.load(Ordering::Relaxed) {
            return;
        }
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.subscribe(topic, QoS::AtMostOnce) {
                warn!("mqtt: subscribe {} failed: {:?}", topic, e);
            }
        }
    }

    // ── Platform: host simulation ─────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, client_id: &str, _user: &str, _password: &str) {
        info!("mqtt(sim): '{}' connected to {}", client_id, self.broker_url());
        self.connected.store(true, Ordering::Release);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        self.broker.publish(topic, payload, retain);
        if self.subscriptions.iter().any(|t| t == topic) {
            push_inbound(&self.inbox, topic, payload);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) {
        if let Some(payload) = self.broker.retained(topic) {
            push_inbound(&self.inbox, topic, &payload);
        }
    }

    /// Handle for feeding traffic into the simulated broker from another
    /// thread (the host binaries read it from stdin).
    #[cfg(not(target_os = "espidf"))]
    pub fn injector(&self) -> Injector {
        Injector {
            inbox: Arc::clone(&self.inbox),
        }
    }

    /// Every publish so far, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, Vec<u8>, bool)] {
        &self.broker.log
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.broker.retained(topic)
    }
}

impl BusPort for MqttBus {
    fn configure(&mut self, cfg: &NodeConfig) {
        self.host.clone_from(&cfg.mqtt_server);
        self.port = cfg.mqtt_port;
        if let Err(e) = self.link.set_credentials(&cfg.wifi_ssid, &cfg.wifi_password) {
            warn!("mqtt: WiFi credentials rejected: {}", e);
        }
    }

    fn connect(&mut self, client_id: &str, user: &str, password: &str) {
        if let Err(e) = self.link.join(self.clock.now_ms()) {
            warn!("mqtt: network not up ({}), opening session anyway", e);
        }
        self.platform_connect(client_id, user, password);
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        self.platform_publish(topic, payload, retain);
    }

    fn subscribe(&mut self, topic: &str) {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_owned());
        }
        self.platform_subscribe(topic);
    }

    fn process_pending(&mut self) -> Vec<InboundMessage> {
        self.link.poll(self.clock.now_ms());
        if self.resubscribe.swap(false, Ordering::Acquire) {
            self.resubscribe_all();
        }
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// The broker session is up.  A dropped WiFi link surfaces here as a
    /// session disconnect.
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ── Host simulation broker ────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimBroker {
    retained: HashMap<String, Vec<u8>>,
    log: Vec<(String, Vec<u8>, bool)>,
}

#[cfg(not(target_os = "espidf"))]
impl SimBroker {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        if retain {
            self.retained.insert(topic.to_owned(), payload.to_vec());
        }
        self.log.push((topic.to_owned(), payload.to_vec(), retain));
    }

    fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.retained.get(topic).cloned()
    }
}

/// Cloneable sender into the simulated broker's delivery queue.
#[cfg(not(target_os = "espidf"))]
#[derive(Clone)]
pub struct Injector {
    inbox: Inbox,
}

#[cfg(not(target_os = "espidf"))]
impl Injector {
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        push_inbound(&self.inbox, topic, payload);
    }

    /// Read `<topic> <payload>` lines from stdin on a background thread
    /// and deliver each one.
    pub fn feed_from_stdin(self) {
        let spawned = std::thread::Builder::new()
            .name("mqtt-stdin".into())
            .spawn(move || {
                for line in std::io::stdin().lines().map_while(Result::ok) {
                    match line.trim().split_once(' ') {
                        Some((topic, payload)) => self.inject(topic, payload.trim().as_bytes()),
                        None => warn!("mqtt(sim): expected '<topic> <payload>', got '{}'", line),
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("mqtt(sim): stdin feed failed to start: {}", e);
        }
    }
}
