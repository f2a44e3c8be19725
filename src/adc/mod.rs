//! Bit-banged driver for the HX711 24-bit load cell converter.
//!
//! The converter pulls the data line low when a conversion is ready. The
//! host then clocks out 24 bits MSB first, followed by one to three extra
//! pulses that pick the gain/channel for the *next* conversion.

use std::time::{Duration, Instant};

use log::trace;
use serde::{Deserialize, Serialize};

mod gpio;
#[cfg(test)]
pub(crate) mod testing;

pub use gpio::{open_gpio, GpioLines};

/// A single signed conversion result, widened from 24 bits.
pub type RawSample = i32;

pub const DATA_BITS: u32 = 24;
const SIGN_BIT: u32 = 1 << (DATA_BITS - 1);
const DATA_MASK: u32 = (1 << DATA_BITS) - 1;

/// Minimum time each clock phase is held. Holding the clock high for more
/// than 60us puts the converter to sleep, so this is a spin, not a sleep.
const PULSE_HOLD: Duration = Duration::from_micros(1);

/// Gain and input channel latched for the next conversion. The
/// discriminant is the number of extra clock pulses after the data bits.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    #[default]
    A128 = 1,
    B32 = 2,
    A64 = 3,
}

impl Gain {
    pub fn pulses(self) -> u8 {
        self as u8
    }
}

/// The two wires the converter is driven over. Implementations own the
/// lines exclusively.
pub trait AdcLines: Send {
    fn set_clock(&mut self, high: bool);

    fn data_is_high(&self) -> bool;
}

pub struct Hx711<L> {
    lines: L,
    gain: Gain,
}

impl<L: AdcLines> Hx711<L> {
    pub fn new(mut lines: L, gain: Gain) -> Self {
        lines.set_clock(false);
        Self { lines, gain }
    }

    /// True when a conversion is waiting to be clocked out.
    pub fn is_ready(&self) -> bool {
        !self.lines.data_is_high()
    }

    /// Blocks until the converter is ready, then clocks out one sample.
    ///
    /// There is no timeout: a converter that never asserts ready stalls the
    /// caller forever. Run this on a blocking task that can be abandoned.
    pub fn read_raw(&mut self) -> RawSample {
        while !self.is_ready() {
            std::thread::yield_now();
        }

        let mut value: u32 = 0;
        for _ in 0..DATA_BITS {
            self.pulse();
            value = (value << 1) | u32::from(self.lines.data_is_high());
        }

        for _ in 0..self.gain.pulses() {
            self.pulse();
        }

        let sample = sign_extend(value);
        trace!("hx711 raw read {:#08x} -> {}", value, sample);
        sample
    }

    #[cfg(test)]
    pub(crate) fn lines(&self) -> &L {
        &self.lines
    }

    fn pulse(&mut self) {
        self.lines.set_clock(true);
        hold(PULSE_HOLD);
        self.lines.set_clock(false);
        hold(PULSE_HOLD);
    }
}

/// Widens a 24-bit two's-complement code to a full `i32`.
pub fn sign_extend(raw: u32) -> RawSample {
    let raw = raw & DATA_MASK;
    if raw & SIGN_BIT != 0 {
        (raw | !DATA_MASK) as i32
    } else {
        raw as i32
    }
}

fn hold(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
