//! NVS (Non-Volatile Storage) configuration adapter.
//!
//! Implements [`ConfigPort`] for both node roles.  The whole [`NodeConfig`]
//! is one postcard blob under `heatbus::nodecfg`.
//!
//! - Blobs are validated on load and before persisting; an invalid blob is
//!   treated as missing and the node enters portal mode.
//! - While in portal mode the store is re-read every
//!   [`PORTAL_POLL_TICKS`] ticks, so a provisioning tool that writes the
//!   blob brings the node up without a reboot.
//! - Host builds keep the blob in memory and can be seeded from a JSON
//!   file named by `HEATBUS_CONFIG`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{NodeConfig, PortalField};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "heatbus";
#[cfg_attr(target_os = "espidf", allow(dead_code))]
const CONFIG_KEY: &str = "nodecfg";

/// Largest blob accepted from flash.
const MAX_BLOB_SIZE: usize = 512;

/// Ticks between store re-reads while waiting for configuration.
pub const PORTAL_POLL_TICKS: u32 = 100;

/// Environment variable naming a JSON config file (host only).
pub const CONFIG_ENV: &str = "HEATBUS_CONFIG";

pub struct NvsConfigStore {
    fields: Vec<PortalField>,
    routes: Vec<(&'static str, &'static str)>,
    loaded: Option<NodeConfig>,
    portal_active: bool,
    poll_countdown: u32,
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsConfigStore {
    /// Create the store and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        #[allow(unused_mut)]
        let mut this = Self {
            fields: Vec::new(),
            routes: Vec::new(),
            loaded: None,
            portal_active: false,
            poll_countdown: 0,
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        };

        #[cfg(not(target_os = "espidf"))]
        this.seed_from_env();

        Ok(this)
    }

    /// Validate and persist a configuration, as the portal does on submit.
    pub fn provision(&mut self, cfg: &NodeConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        let bytes = postcard::to_allocvec(cfg).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.write_blob(&bytes)?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }

    /// Fields registered by the node, in registration order.
    pub fn fields(&self) -> &[PortalField] {
        &self.fields
    }

    pub fn diagnostic_route(&self, path: &str) -> Option<&'static str> {
        self.routes
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, body)| *body)
    }

    pub fn portal_active(&self) -> bool {
        self.portal_active
    }

    fn load(&self) -> Result<NodeConfig, ConfigError> {
        let bytes = self.read_blob()?;
        let cfg: NodeConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(not(target_os = "espidf"))]
    fn seed_from_env(&mut self) {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return;
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("NvsConfigStore: cannot read {}: {}", path, e);
                return;
            }
        };
        match serde_json::from_str::<NodeConfig>(&text) {
            Ok(cfg) => match self.provision(&cfg) {
                Ok(()) => info!("NvsConfigStore: seeded from {}", path),
                Err(e) => warn!("NvsConfigStore: {} rejected: {}", path, e),
            },
            Err(e) => warn!("NvsConfigStore: {} is not valid config JSON: {}", path, e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    // ── Backend: simulation ───────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        self.store
            .get(&Self::composite_key())
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store.insert(Self::composite_key(), bytes.to_vec());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase_blob(&mut self) -> Result<(), ConfigError> {
        self.store.remove(&Self::composite_key());
        Ok(())
    }

    /// Store raw bytes under the config key, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&mut self, bytes: &[u8]) {
        self.store.insert(Self::composite_key(), bytes.to_vec());
    }

    // ── Backend: ESP-IDF NVS ──────────────────────────────────

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns = CONFIG_NAMESPACE.as_bytes();
        ns_buf[..ns.len()].copy_from_slice(ns);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        let key = b"nodecfg\0";
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_INVALID_SIZE);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(buf),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(ConfigError::NotFound),
            Err(e) if e == ESP_ERR_INVALID_SIZE => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsConfigStore: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        let key = b"nodecfg\0";
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsConfigStore: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(target_os = "espidf")]
    fn erase_blob(&mut self) -> Result<(), ConfigError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe { nvs_erase_all(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsConfigStore: NVS erase error {}", e);
            ConfigError::IoError
        })
    }
}

impl ConfigPort for NvsConfigStore {
    fn register_field(&mut self, field: PortalField) {
        if !self.fields.iter().any(|f| f.name == field.name) {
            self.fields.push(field);
        }
    }

    fn register_diagnostic_route(&mut self, path: &'static str, body: &'static str) {
        self.routes.retain(|(p, _)| *p != path);
        self.routes.push((path, body));
    }

    fn load_or_enter_portal(&mut self) -> Option<NodeConfig> {
        match self.load() {
            Ok(cfg) => {
                info!("NvsConfigStore: loaded config for '{}'", cfg.name);
                self.portal_active = false;
                self.loaded = Some(cfg.clone());
                Some(cfg)
            }
            Err(e) => {
                if !self.portal_active {
                    info!(
                        "NvsConfigStore: {}; portal collecting {} fields",
                        e,
                        self.fields.len()
                    );
                }
                self.portal_active = true;
                self.loaded = None;
                None
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    fn process_pending(&mut self) {
        if !self.portal_active {
            return;
        }
        if self.poll_countdown > 0 {
            self.poll_countdown -= 1;
            return;
        }
        self.poll_countdown = PORTAL_POLL_TICKS;

        #[cfg(not(target_os = "espidf"))]
        if std::env::var_os(CONFIG_ENV).is_some() && self.read_blob().is_err() {
            self.seed_from_env();
        }

        if let Ok(cfg) = self.load() {
            info!("NvsConfigStore: configuration arrived for '{}'", cfg.name);
            self.portal_active = false;
            self.loaded = Some(cfg);
        }
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        self.loaded = None;
        self.erase_blob()?;
        info!("NvsConfigStore: configuration erased");
        Ok(())
    }
}
