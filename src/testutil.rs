use std::sync::Arc;

use legoirc_shared::{Decoder, Message};

use crate::channel::CommandChannel;
use crate::clock::{Clock, ManualClock};
use crate::emitter::{EmitterError, Level, PulseEmitter};

/// Level changes of one frame: start, 16 bits, stop, each on and off
const CHANGES_PER_FRAME: usize = 2 * (Message::BITS + 2);

/// Records level changes on a virtual clock. Switching on costs `setup` µs.
pub struct Recorder {
    pub clock: Arc<ManualClock>,
    pub setup: u64,
    pub changes: Vec<(u64, Level)>,
    /// Publish a code once this many frames went out
    pub interrupt: Option<(usize, u8, Arc<CommandChannel>)>,
}

impl Recorder {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Recorder {
            clock,
            setup: 0,
            changes: Vec::new(),
            interrupt: None,
        }
    }

    pub fn rising_edges(&self) -> Vec<u64> {
        self.changes
            .iter()
            .filter(|(_, l)| *l == Level::High)
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn frames(&self) -> Vec<Message> {
        let mut decoder = Decoder::new();
        self.rising_edges()
            .into_iter()
            .filter_map(|t| decoder.event(t))
            .collect()
    }
}

impl PulseEmitter for Recorder {
    fn set_output(&mut self, level: Level) -> Result<(), EmitterError> {
        self.changes.push((self.clock.now_us(), level));
        if level == Level::High {
            self.clock.advance(self.setup);
        }

        let frames = self.changes.len() / CHANGES_PER_FRAME;
        if let Some((after, code, channel)) = &self.interrupt {
            if frames >= *after {
                channel.publish(*code);
            }
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.delay_us(us)
    }

    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }
}
