//! WiFi station-mode link under the bus client.
//!
//! The node joins the network named in its stored configuration before
//! the broker session is opened.  [`MqttBus`](super::mqtt::MqttBus) owns
//! the link and drives it from `configure`/`connect`/`process_pending`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` from `esp_idf_svc::wifi`.
//! - **all other targets**: the host already has a network; the link only
//!   tracks state.
//!
//! ## Reconnection policy
//!
//! On a failed join or a dropped link the adapter waits an exponential
//! backoff (2 s → 4 s → 8 s … capped at 60 s) before retrying.

use core::fmt;
use log::{error, info, warn};

use crate::app::timing;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    JoinFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::JoinFailed => write!(f, "WiFi join failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
    Retrying { attempt: u32 },
}

const MIN_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

pub struct WifiLink {
    state: LinkState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    retry_since_ms: u32,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl WifiLink {
    #[cfg(target_os = "espidf")]
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> anyhow::Result<Self> {
        let wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), None)?, sysloop)?;
        Ok(Self::with_driver(wifi))
    }

    #[cfg(target_os = "espidf")]
    fn with_driver(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: MIN_BACKOFF_SECS,
            retry_since_ms: 0,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: MIN_BACKOFF_SECS,
            retry_since_ms: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up && self.platform_is_connected()
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| LinkError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| LinkError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Join the configured network.  Blocks until the interface is up or
    /// the attempt fails; a failure arms the retry backoff.
    pub fn join(&mut self, now_ms: u32) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        if self.is_up() {
            return Ok(());
        }
        info!("WiFi: joining '{}'", self.ssid);
        match self.platform_join() {
            Ok(()) => {
                self.state = LinkState::Up;
                self.backoff_secs = MIN_BACKOFF_SECS;
                info!("WiFi: up");
                Ok(())
            }
            Err(e) => {
                error!("WiFi: join failed: {}", e);
                self.state = LinkState::Retrying { attempt: 0 };
                self.retry_since_ms = now_ms;
                Err(e)
            }
        }
    }

    /// Watch the link.  Returns `true` when the link came (back) up
    /// during this call.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        match self.state {
            LinkState::Up if !self.platform_is_connected() => {
                warn!("WiFi: link lost, retrying");
                self.state = LinkState::Retrying { attempt: 0 };
                self.retry_since_ms = now_ms;
                false
            }
            LinkState::Retrying { attempt }
                if timing::has_elapsed(now_ms, self.retry_since_ms, self.backoff_secs * 1000) =>
            {
                info!("WiFi: retry {} (backoff {}s)", attempt, self.backoff_secs);
                match self.platform_join() {
                    Ok(()) => {
                        self.state = LinkState::Up;
                        self.backoff_secs = MIN_BACKOFF_SECS;
                        info!("WiFi: back up");
                        true
                    }
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.state = LinkState::Retrying { attempt: attempt + 1 };
                        self.retry_since_ms = now_ms;
                        false
                    }
                }
            }
            _ => false,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_join(&mut self) -> Result<(), LinkError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let cfg = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            auth_method,
            ..Default::default()
        });
        self.start_station(&cfg).map_err(|e| {
            warn!("WiFi(espidf): {:?}", e);
            LinkError::JoinFailed
        })
    }

    #[cfg(target_os = "espidf")]
    fn start_station(&mut self, cfg: &Configuration) -> Result<(), esp_idf_svc::sys::EspError> {
        self.wifi.set_configuration(cfg)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        self.wifi.wait_netif_up()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_join(&mut self) -> Result<(), LinkError> {
        info!("WiFi(sim): joined '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        true
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiLink {
    fn default() -> Self {
        Self::new()
    }
}
