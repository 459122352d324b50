//! Application core: node logic with all I/O behind ports.
//!
//! The demand aggregator (controller), the duty-cycle scheduler (sensor),
//! the device model both are built on, and the boot-time reset sequencer.
//! Hardware, the bus and the configuration store are reached only through
//! the **port traits** in [`ports`], so every rule here runs on the host.

pub mod aggregator;
pub mod commands;
pub mod device;
pub mod duty_cycle;
pub mod events;
pub mod platform;
pub mod ports;
pub mod reset;
pub mod service;
pub mod timing;
