//! GPIO pin assignments shared by both heatbus boards.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Both boards use the same header layout; pins a
//! role does not use are left unconfigured.

// ---------------------------------------------------------------------------
// Inputs (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Factory-reset push-button.  LOW while held.
pub const RESET_GPIO: i32 = 14;
/// Sleep-override jumper.  LOW while fitted; the sensor never sleeps.
pub const SLEEP_OVERRIDE_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// On-board status LED.  Active-low: driving the pin LOW lights it.
pub const STATUS_LED_GPIO: i32 = 2;
/// Boiler relay coil driver (controller).  Active-high.
pub const RELAY_GPIO: i32 = 5;
/// Supply rail for the temperature probe (sensor).  Active-high.
pub const PROBE_POWER_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// 1-Wire bus (sensor)
// ---------------------------------------------------------------------------

/// DS18B20 data line, open-drain with external 4.7 kΩ pull-up.
pub const ONE_WIRE_GPIO: i32 = 4;
