//! Output side of the transmitter: drive the IR LED and wait.

use std::fmt;
use std::io;
use std::sync::Arc;

use embedded_hal::digital::v2::OutputPin;
use thiserror::Error;

use crate::clock::Clock;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("gpio pin: {0}")]
    Pin(String),
    #[error("vcd output: {0}")]
    Vcd(#[from] io::Error),
}

fn pin_error<E: fmt::Debug>(e: E) -> EmitterError {
    EmitterError::Pin(format!("{:?}", e))
}

/// What the transmitter needs from the hardware
pub trait PulseEmitter {
    fn set_output(&mut self, level: Level) -> Result<(), EmitterError>;

    fn delay_us(&mut self, us: u32);

    fn now_us(&self) -> u64;
}

/// Emitter on top of any embedded-hal output pin
pub struct GpioEmitter<P> {
    pin: P,
    clock: Arc<dyn Clock>,
}

impl<P> GpioEmitter<P>
where
    P: OutputPin,
    P::Error: fmt::Debug,
{
    /// Takes the pin and drives it low
    pub fn new(mut pin: P, clock: Arc<dyn Clock>) -> Result<Self, EmitterError> {
        pin.set_low().map_err(pin_error)?;
        Ok(GpioEmitter { pin, clock })
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> PulseEmitter for GpioEmitter<P>
where
    P: OutputPin,
    P::Error: fmt::Debug,
{
    fn set_output(&mut self, level: Level) -> Result<(), EmitterError> {
        match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        }
        .map_err(pin_error)
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.delay_us(us)
    }

    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }
}

/// Export a sysfs gpio and configure it as an output, initially low
#[cfg(target_os = "linux")]
pub fn sysfs_pin(number: u64) -> Result<linux_embedded_hal::SysfsPin, EmitterError> {
    use linux_embedded_hal::sysfs_gpio::Direction;

    let pin = linux_embedded_hal::SysfsPin::new(number);
    pin.export().map_err(pin_error)?;
    pin.set_direction(Direction::Low).map_err(pin_error)?;

    log::debug!("Exported gpio {}", number);

    Ok(pin)
}
