//! Pulse and burst timing, in microseconds.
//!
//! Bit timings are multiples of the 38 kHz carrier period (`1000 / 38` µs).
//! They are truncated to whole microseconds the same way the delay
//! primitive truncates them.

use crate::protocol::Channel;

/// Carrier periods per pulse and per pause
const PULSE_PERIODS: u32 = 6;
const LOW_BIT_PERIODS: u32 = 10;
const HIGH_BIT_PERIODS: u32 = 21;
const START_STOP_PERIODS: u32 = 39;

/// Carrier frequency in kHz
const CARRIER_KHZ: u32 = 38;

/// Longest possible frame
pub const MAX_MSG_LEN: u32 = 16_000;

/// Number of times each frame is sent
pub const BURST_LEN: usize = 5;

/// How often the command slot is polled when idle
pub const COMMAND_POLL_INTERVAL: u32 = 100_000;

const fn carrier_periods(n: u32) -> u32 {
    n * 1000 / CARRIER_KHZ
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timing {
    /// LED on-time of every pulse
    pub pulse_len: u32,
    pub low_bit_wait: u32,
    pub high_bit_wait: u32,
    pub start_bit_wait: u32,
    pub stop_bit_wait: u32,

    /// Before the first send
    pub channel_wait_1: u32,
    /// Before the second and third
    pub channel_wait_2_3: u32,
    /// Before the fourth and fifth
    pub channel_wait_4_5: u32,
}

impl Timing {
    pub fn for_channel(channel: Channel) -> Self {
        let ch = u32::from(channel.number());
        let start_bit_wait = carrier_periods(START_STOP_PERIODS);

        Timing {
            pulse_len: carrier_periods(PULSE_PERIODS),
            low_bit_wait: carrier_periods(LOW_BIT_PERIODS),
            high_bit_wait: carrier_periods(HIGH_BIT_PERIODS),
            start_bit_wait,
            stop_bit_wait: start_bit_wait,

            channel_wait_1: (4 - ch) * MAX_MSG_LEN,
            channel_wait_2_3: 5 * MAX_MSG_LEN,
            channel_wait_4_5: (6 + 2 * ch) * MAX_MSG_LEN,
        }
    }

    /// Spacing before the send at `repeat` (0-based) within a burst
    pub fn wait_before(&self, repeat: usize) -> u32 {
        match repeat {
            0 => self.channel_wait_1,
            1 | 2 => self.channel_wait_2_3,
            _ => self.channel_wait_4_5,
        }
    }

    /// Nominal time between frames as seen by the receiver over a full burst
    pub fn message_period(&self) -> u32 {
        self.channel_wait_1 + 2 * self.channel_wait_2_3 + 2 * self.channel_wait_4_5
    }
}
