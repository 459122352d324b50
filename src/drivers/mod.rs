//! Low-level drivers: raw GPIO, active-low inputs, outputs and 1-Wire.

pub mod hw_init;
pub mod input;
pub mod onewire;
pub mod output;
