//! Bit-banged Dallas 1-Wire master over embedded-hal pins.
//!
//! The data line is an open-drain GPIO with an external pull-up.  Driving
//! it LOW pulls the bus down; driving it HIGH releases it.  Slot timings are
//! the standard-speed values from the DS18B20 datasheet.
//!
//! ```text
//!  reset:   ▔▔\_____480µs_____/▔▔70µs▔▔(sample presence)▔▔410µs▔▔
//!  write 1: ▔▔\_6µs_/▔▔▔▔▔▔▔▔64µs▔▔▔▔▔▔
//!  write 0: ▔▔\______60µs______/▔10µs▔
//!  read:    ▔▔\_6µs_/▔9µs▔(sample)▔55µs▔
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireError {
    /// No device answered the reset pulse.
    NoPresence,
    /// The data line could not be driven or sampled.
    Pin,
    /// Scratchpad CRC mismatch.
    Crc,
    /// Every scratchpad byte read as zero: the line is held low.
    BusStuckLow,
}

impl core::fmt::Display for OneWireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoPresence => write!(f, "no presence pulse"),
            Self::Pin => write!(f, "pin error"),
            Self::Crc => write!(f, "CRC mismatch"),
            Self::BusStuckLow => write!(f, "bus stuck low (all-zero scratchpad)"),
        }
    }
}

/// Byte-level 1-Wire master.  Bit-level timing is the implementor's job.
pub trait OneWire {
    /// Reset pulse.  `Ok(())` only if a device answered with presence.
    fn reset(&mut self) -> Result<(), OneWireError>;
    fn write_bit(&mut self, bit: bool) -> Result<(), OneWireError>;
    fn read_bit(&mut self) -> Result<bool, OneWireError>;

    /// LSB first.
    fn write_byte(&mut self, byte: u8) -> Result<(), OneWireError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    /// LSB first.
    fn read_byte(&mut self) -> Result<u8, OneWireError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected 0x8C).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// 1-Wire master on a single open-drain pin.
pub struct GpioOneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> GpioOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    fn low(&mut self) -> Result<(), OneWireError> {
        self.pin.set_low().map_err(|_| OneWireError::Pin)
    }

    fn release(&mut self) -> Result<(), OneWireError> {
        self.pin.set_high().map_err(|_| OneWireError::Pin)
    }

    fn sample(&mut self) -> Result<bool, OneWireError> {
        self.pin.is_high().map_err(|_| OneWireError::Pin)
    }
}

impl<P, D> OneWire for GpioOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn reset(&mut self) -> Result<(), OneWireError> {
        self.low()?;
        self.delay.delay_us(480);
        self.release()?;
        self.delay.delay_us(70);
        let present = !self.sample()?;
        self.delay.delay_us(410);
        if present { Ok(()) } else { Err(OneWireError::NoPresence) }
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), OneWireError> {
        self.low()?;
        if bit {
            self.delay.delay_us(6);
            self.release()?;
            self.delay.delay_us(64);
        } else {
            self.delay.delay_us(60);
            self.release()?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, OneWireError> {
        self.low()?;
        self.delay.delay_us(6);
        self.release()?;
        self.delay.delay_us(9);
        let bit = self.sample()?;
        self.delay.delay_us(55);
        Ok(bit)
    }
}
