use std::convert::TryFrom;

use legoirc_shared::{Channel, Mode, Timing};
use log::LevelFilter;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("IR channel must be 1-4, got {0}")]
    Channel(u8),
    #[error("IR mode must be 1-4, got {0}")]
    Mode(u8),
}

/// Settings fixed at startup
#[derive(Debug, Clone)]
pub struct SessionConfig {
    port: u16,
    channel: Channel,
    mode: Mode,
    gpio_pin: u64,
    debug_level: u8,
}

impl SessionConfig {
    pub fn new(
        port: u16,
        channel: u8,
        mode: u8,
        gpio_pin: u64,
        debug_level: u8,
    ) -> Result<Self, ConfigError> {
        Ok(SessionConfig {
            port,
            channel: Channel::try_from(channel).map_err(ConfigError::Channel)?,
            mode: Mode::try_from(mode).map_err(ConfigError::Mode)?,
            gpio_pin,
            debug_level,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gpio_pin(&self) -> u64 {
        self.gpio_pin
    }

    pub fn timing(&self) -> Timing {
        Timing::for_channel(self.channel)
    }

    pub fn log_level(&self) -> LevelFilter {
        log_level(self.debug_level)
    }
}

/// Debug level 0-3 as a log filter
pub fn log_level(debug_level: u8) -> LevelFilter {
    match debug_level {
        0 => LevelFilter::Info,
        1 | 2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
