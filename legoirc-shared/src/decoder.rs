//! Recover frames from a pulse train.
//!
//! Every pulse has the same width, so a bit is told apart by the distance
//! between the rising edges of its own pulse and the next one.

use crate::protocol::Message;

/// Rising edge to rising edge, receiver tolerances in µs
const LOW_BIT: (u64, u64) = (316, 526);
const HIGH_BIT: (u64, u64) = (527, 947);
const START_STOP: (u64, u64) = (948, 1579);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Interval {
    Low,
    High,
    StartStop,
    Invalid,
}

impl Interval {
    fn classify(dt: u64) -> Self {
        let within = |(min, max): (u64, u64)| dt >= min && dt <= max;

        if within(LOW_BIT) {
            Interval::Low
        } else if within(HIGH_BIT) {
            Interval::High
        } else if within(START_STOP) {
            Interval::StartStop
        } else {
            Interval::Invalid
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Bits { count: usize, raw: u16 },
}

#[derive(Debug)]
pub struct Decoder {
    state: State,
    prev_edge: Option<u64>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            state: State::Idle,
            prev_edge: None,
        }
    }

    /// Feed the timestamp of a rising edge. Returns a frame when the
    /// sixteenth bit completes and the checksum verifies.
    pub fn event(&mut self, rising_edge: u64) -> Option<Message> {
        let prev = self.prev_edge.replace(rising_edge)?;
        let interval = Interval::classify(rising_edge.saturating_sub(prev));

        match (self.state, interval) {
            (_, Interval::StartStop) => {
                self.state = State::Bits { count: 0, raw: 0 };
                None
            }
            (_, Interval::Invalid) | (State::Idle, _) => {
                self.state = State::Idle;
                None
            }
            (State::Bits { count, raw }, bit) => {
                let raw = raw << 1 | (bit == Interval::High) as u16;
                let count = count + 1;

                if count == Message::BITS {
                    self.state = State::Idle;
                    let msg = Message::from_raw(raw);
                    if msg.is_none() {
                        log::debug!("Dropping frame {:016b}, bad checksum", raw);
                    }
                    msg
                } else {
                    self.state = State::Bits { count, raw };
                    None
                }
            }
        }
    }
}
