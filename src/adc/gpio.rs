use log::info;

#[cfg(feature = "pi")]
use rppal::gpio::{Gpio, InputPin, OutputPin};

use super::{AdcLines, Hx711};
use crate::{config::AdcConfig, error::HardwareInitError};

#[cfg(feature = "pi")]
pub struct GpioLines {
    clock: OutputPin,
    data: InputPin,
}

/// Stand-in when GPIO support is not compiled in. It has no values, so
/// `open_gpio` can never hand one out.
#[cfg(not(feature = "pi"))]
pub enum GpioLines {}

#[cfg(feature = "pi")]
impl AdcLines for GpioLines {
    fn set_clock(&mut self, high: bool) {
        match high {
            true => self.clock.set_high(),
            false => self.clock.set_low(),
        }
    }

    fn data_is_high(&self) -> bool {
        self.data.is_high()
    }
}

#[cfg(not(feature = "pi"))]
impl AdcLines for GpioLines {
    fn set_clock(&mut self, _high: bool) {
        match *self {}
    }

    fn data_is_high(&self) -> bool {
        match *self {}
    }
}

/// Claims the clock and data lines for the lifetime of the returned driver.
pub fn open_gpio(config: &AdcConfig) -> Result<Hx711<GpioLines>, HardwareInitError> {
    let clock = config.clock.bcm();
    let data = config.data.bcm();
    info!("HX711: clock on GPIO {}, data on GPIO {}", clock, data);

    let lines = claim(clock, data)?;
    Ok(Hx711::new(lines, config.gain))
}

#[cfg(feature = "pi")]
fn claim(clock: u8, data: u8) -> Result<GpioLines, HardwareInitError> {
    let gpio = Gpio::new()?;
    Ok(GpioLines {
        clock: gpio.get(clock)?.into_output_low(),
        data: gpio.get(data)?.into_input(),
    })
}

#[cfg(not(feature = "pi"))]
fn claim(_clock: u8, _data: u8) -> Result<GpioLines, HardwareInitError> {
    Err(HardwareInitError::Unsupported)
}
