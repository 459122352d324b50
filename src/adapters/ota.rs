//! Firmware update agent: backed by the `esp-ota` crate.
//!
//! Image delivery happens out of band on the agent's channel.  What the
//! node itself owes the update system is confirmation: once the node is
//! configured and on the bus, the running image is marked valid so the
//! bootloader does not roll back to the previous slot.

use log::{info, warn};

use crate::app::ports::UpdatePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Started,
}

pub struct UpdateAgent {
    channel: &'static str,
    device_id: heapless::String<32>,
    state: AgentState,
}

impl UpdateAgent {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            device_id: heapless::String::new(),
            state: AgentState::Idle,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn channel(&self) -> &str {
        self.channel
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(target_os = "espidf")]
fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("update: running image marked valid"),
        Err(e) => warn!("update: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
fn confirm_running_image() {
    info!("update: image confirmation (simulation) skipped");
}

impl UpdatePort for UpdateAgent {
    fn start(&mut self, device_id: &str) {
        if self.state == AgentState::Started {
            return;
        }
        self.device_id.clear();
        if self.device_id.push_str(device_id).is_err() {
            warn!("update: device id '{}' truncated", device_id);
            for c in device_id.chars() {
                if self.device_id.push(c).is_err() {
                    break;
                }
            }
        }
        confirm_running_image();
        self.state = AgentState::Started;
        info!("update: agent on channel '{}' as '{}'", self.channel, self.device_id);
    }

    fn process_pending(&mut self) {}
}
