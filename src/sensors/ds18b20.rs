//! DS18B20 digital thermometer on a single-drop 1-Wire bus.
//!
//! One conversion per request: reset → Skip ROM → Convert T → wait for
//! the 12-bit conversion → reset → Skip ROM → Read Scratchpad.  The
//! scratchpad is CRC-checked before the temperature word is trusted.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`Ds18b20`] over [`GpioOneWire`](crate::drivers::onewire::GpioOneWire).
//! On host/test: [`SimProbe`] reads from a static for injection.

use core::sync::atomic::{AtomicI32, Ordering};

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::TransducerPort;
use crate::drivers::onewire::{crc8, OneWire, OneWireError};

const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Worst-case 12-bit conversion time.
pub const CONVERSION_MS: u32 = 750;

/// Decode a 9-byte scratchpad.  Bytes 0–1 are the signed temperature in
/// 1/16 °C, byte 8 is the CRC over bytes 0–7.
///
/// An all-zero scratchpad carries a valid CRC (the CRC of zeros is zero),
/// but a live DS18B20 never returns one: byte 4 always has its reserved
/// bits set.  It is what a line held low reads as.
pub fn decode_scratchpad(sp: &[u8; 9]) -> Result<f32, OneWireError> {
    if sp.iter().all(|b| *b == 0) {
        return Err(OneWireError::BusStuckLow);
    }
    if crc8(&sp[..8]) != sp[8] {
        return Err(OneWireError::Crc);
    }
    let raw = i16::from_le_bytes([sp[0], sp[1]]);
    Ok(f32::from(raw) / 16.0)
}

pub struct Ds18b20<W, D> {
    bus: W,
    delay: D,
}

impl<W, D> Ds18b20<W, D>
where
    W: OneWire,
    D: DelayNs,
{
    pub fn new(bus: W, delay: D) -> Self {
        Self { bus, delay }
    }

    /// Run one conversion and return °C.
    pub fn read_celsius(&mut self) -> Result<f32, OneWireError> {
        self.bus.reset()?;
        self.bus.write_byte(CMD_SKIP_ROM)?;
        self.bus.write_byte(CMD_CONVERT_T)?;
        self.delay.delay_ms(CONVERSION_MS);

        self.bus.reset()?;
        self.bus.write_byte(CMD_SKIP_ROM)?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD)?;
        let mut sp = [0u8; 9];
        for b in &mut sp {
            *b = self.bus.read_byte()?;
        }
        decode_scratchpad(&sp)
    }
}

impl<W, D> TransducerPort for Ds18b20<W, D>
where
    W: OneWire,
    D: DelayNs,
{
    fn request_reading(&mut self) -> Option<f32> {
        match self.read_celsius() {
            Ok(c) => Some(c),
            Err(e) => {
                debug!("ds18b20: {}", e);
                None
            }
        }
    }
}

// ── Simulation ────────────────────────────────────────────────

const SIM_ABSENT: i32 = i32::MIN;

/// Simulated probe temperature in milli-degrees; `SIM_ABSENT` = unplugged.
static SIM_TEMP_MILLI: AtomicI32 = AtomicI32::new(21_500);

/// Set the simulated reading.  `None` unplugs the probe.
pub fn sim_set_temperature(celsius: Option<f32>) {
    let v = celsius.map_or(SIM_ABSENT, |c| (c * 1000.0) as i32);
    SIM_TEMP_MILLI.store(v, Ordering::Relaxed);
}

/// Host stand-in for the DS18B20.
#[derive(Debug, Default)]
pub struct SimProbe;

impl TransducerPort for SimProbe {
    fn request_reading(&mut self) -> Option<f32> {
        match SIM_TEMP_MILLI.load(Ordering::Relaxed) {
            SIM_ABSENT => None,
            milli => Some(milli as f32 / 1000.0),
        }
    }
}
