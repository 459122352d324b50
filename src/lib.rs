//! Heatbus firmware library.
//!
//! Two node images share this crate: the boiler controller and the
//! battery temperature sensor (see `src/bin/`).  The node logic in [`app`]
//! is pure and runs on the host; everything ESP-IDF-specific is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;
