//! Unified error types for the heatbus firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the top-level tick handling uniform.  All variants are `Copy` so they
//! can be passed through the services and sinks without allocation.
//!
//! The first four variants are raised by the check that detects them and
//! absorbed one level up: the config gate, the reading filter, the room
//! read and the reset confirmation each return them, and their caller logs
//! the error and carries on (or restarts, for a factory reset).  Only
//! `Device` and `Config` reach the binaries.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No usable configuration yet.  Runtime behaviour stays suppressed and
    /// readiness is polled again on the next tick.
    ConfigurationIncomplete,
    /// The transducer returned a sentinel or out-of-range value.
    SensorReadInvalid,
    /// A room device had no readable state this tick.
    DeviceReadDegraded,
    /// Both reset samples were asserted.  Configuration is erased and the
    /// node restarts; there is no recovery path.
    FactoryResetRequested,
    /// A device operation was called in the wrong lifecycle state.
    Device(DeviceError),
    /// Configuration storage or validation failed.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationIncomplete => write!(f, "configuration incomplete"),
            Self::SensorReadInvalid => write!(f, "sensor reading invalid"),
            Self::DeviceReadDegraded => write!(f, "device read degraded"),
            Self::FactoryResetRequested => write!(f, "factory reset requested"),
            Self::Device(e) => write!(f, "device: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Device errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Operation requires a bound device (e.g. `set_state` before `bind`).
    InvalidState,
    /// `bind` was called on a device that is already bound.
    AlreadyBound,
    /// An identifier or topic does not fit the device's fixed buffers.
    TooLong,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "device not bound"),
            Self::AlreadyBound => write!(f, "device already bound"),
            Self::TooLong => write!(f, "identifier or topic too long"),
        }
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
