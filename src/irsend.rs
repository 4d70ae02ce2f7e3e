//! Frame and burst transmission.
//!
//! The pulse on-time is compensated by however long switching the LED on
//! took. The pause after it is not. Whether the receiver would prefer the
//! pause corrected too has not been measured.

use legoirc_shared::timing::{Timing, BURST_LEN};
use legoirc_shared::Message;

use crate::channel::CommandChannel;
use crate::emitter::{EmitterError, Level, PulseEmitter};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BurstOutcome {
    Completed,
    /// The command changed after `sent` frames
    Abandoned { sent: usize },
}

pub struct Transmitter<E> {
    emitter: E,
    timing: Timing,
}

impl<E: PulseEmitter> Transmitter<E> {
    pub fn new(emitter: E, timing: Timing) -> Self {
        Transmitter { emitter, timing }
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut E {
        &mut self.emitter
    }

    /// One LED pulse followed by `pause`
    pub fn pulse(&mut self, pause: u32) -> Result<(), EmitterError> {
        let before = self.emitter.now_us();
        self.emitter.set_output(Level::High)?;
        let setup = self.emitter.now_us().saturating_sub(before);

        let pulse_len = u64::from(self.timing.pulse_len);
        if pulse_len > setup {
            self.emitter.delay_us((pulse_len - setup) as u32);
        }

        self.emitter.set_output(Level::Low)?;
        self.emitter.delay_us(pause);

        Ok(())
    }

    /// Start marker, 16 bits and stop marker
    pub fn send_message(&mut self, msg: &Message) -> Result<(), EmitterError> {
        log::trace!("START");
        self.pulse(self.timing.start_bit_wait)?;

        for bit in msg.bits() {
            log::trace!("{}", bit as u8);
            let pause = if bit {
                self.timing.high_bit_wait
            } else {
                self.timing.low_bit_wait
            };
            self.pulse(pause)?;
        }

        log::trace!("STOP");
        self.pulse(self.timing.stop_bit_wait)
    }

    /// Send `msg` up to five times with channel spacing. Gives up as soon as
    /// the command slot no longer holds `code`.
    pub fn send_burst(
        &mut self,
        msg: &Message,
        code: u8,
        channel: &CommandChannel,
    ) -> Result<BurstOutcome, EmitterError> {
        for n in 0..BURST_LEN {
            if channel.read().code != code {
                return Ok(self.abandon(n));
            }

            let wait = self.timing.wait_before(n);
            log::trace!("{}. MSG, waiting {} us", n + 1, wait);
            self.emitter.delay_us(wait);

            if channel.read().code != code {
                return Ok(self.abandon(n));
            }

            self.send_message(msg)?;
        }

        Ok(BurstOutcome::Completed)
    }

    fn abandon(&self, sent: usize) -> BurstOutcome {
        log::debug!("Breaking the burst after {} frames because of a new command", sent);
        BurstOutcome::Abandoned { sent }
    }
}
