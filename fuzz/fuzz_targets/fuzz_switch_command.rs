//! Fuzz target: `SwitchCommand::parse` and toggle routing
//!
//! Feeds arbitrary payloads to a brought-up aggregator on a room command
//! topic and asserts that the room either takes the decoded state or
//! keeps its previous one, and that routing never panics.
//!
//! cargo fuzz run fuzz_switch_command

#![no_main]

use heatbus::app::aggregator::{room_topics, DemandAggregator};
use heatbus::app::commands::SwitchCommand;
use heatbus::app::device::Device;
use heatbus::app::ports::{BusPort, InboundMessage};
use heatbus::config::NodeConfig;
use libfuzzer_sys::fuzz_target;

struct NullBus;

impl BusPort for NullBus {
    fn configure(&mut self, _cfg: &NodeConfig) {}
    fn connect(&mut self, _client_id: &str, _user: &str, _password: &str) {}
    fn publish(&mut self, _topic: &str, _payload: &[u8], _retain: bool) {}
    fn subscribe(&mut self, _topic: &str) {}
    fn process_pending(&mut self) -> Vec<InboundMessage> {
        Vec::new()
    }
    fn is_connected(&self) -> bool {
        true
    }
}

fuzz_target!(|data: &[u8]| {
    let mut bus = NullBus;
    let mut agg = DemandAggregator::new(1);
    agg.bring_up(&mut bus).expect("bring-up on a fresh aggregator");

    let msg = InboundMessage::new(&room_topics(1).command_topic, data);
    assert!(agg.route(&mut bus, &msg).expect("room is bound"));

    let expected = SwitchCommand::parse(data).map_or(false, SwitchCommand::as_bool);
    assert_eq!(agg.rooms()[0].state(), Some(expected));
});
