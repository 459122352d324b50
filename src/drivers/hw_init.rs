//! One-shot GPIO initialization and raw pin access.
//!
//! Configures the digital inputs and the role's outputs using raw ESP-IDF
//! sys calls.  Called once from `main()` before the service starts.
//!
//! On the host every pin is a bit in [`SIM_LEVELS`]; inputs idle HIGH like
//! the pulled-up hardware, and tests can drive them with [`sim_set_level`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU64, Ordering};

use log::info;

use crate::config::NodeRole;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

/// Output pins driven by `role`.
pub fn output_pins(role: NodeRole) -> &'static [i32] {
    match role {
        NodeRole::BoilerController => &[pins::STATUS_LED_GPIO, pins::RELAY_GPIO],
        NodeRole::TemperatureSensor => &[pins::STATUS_LED_GPIO, pins::PROBE_POWER_GPIO],
    }
}

#[cfg(target_os = "espidf")]
const INPUT_PINS: [i32; 2] = [pins::RESET_GPIO, pins::SLEEP_OVERRIDE_GPIO];

#[cfg(target_os = "espidf")]
pub fn init_peripherals(role: NodeRole) -> Result<(), HwInitError> {
    // SAFETY: called once from main() before the service loop starts.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs(role)?;
    }
    info!("hw_init: {:?} GPIO configured", role);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(role: NodeRole) -> Result<(), HwInitError> {
    for &pin in output_pins(role) {
        gpio_write(pin, pin == pins::STATUS_LED_GPIO);
    }
    info!("hw_init(sim): {:?} pins reset", role);
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for &pin in &INPUT_PINS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: AtomicU64 = AtomicU64::new(u64::MAX);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    SIM_LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
}

/// Drive a simulated pin level (inputs or outputs).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_level(pin: i32, high: bool) {
    let bit = 1u64 << pin;
    if high {
        SIM_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs(role: NodeRole) -> Result<(), HwInitError> {
    for &pin in output_pins(role) {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        // LED idles dark (HIGH); relay and probe rail idle off (LOW).
        unsafe { gpio_set_level(pin, u32::from(pin == pins::STATUS_LED_GPIO)) };
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim_set_level(pin, high);
}
