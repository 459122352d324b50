//! Transducers behind [`TransducerPort`].

pub mod ds18b20;

use crate::app::ports::TransducerPort;

/// Boards without a probe (the boiler controller).
#[derive(Debug, Default)]
pub struct NoProbe;

impl TransducerPort for NoProbe {
    fn request_reading(&mut self) -> Option<f32> {
        None
    }
}
