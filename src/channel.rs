//! Single-slot command mailbox between the network handlers and the sender.
//!
//! The code and its timestamp are packed into one `AtomicU64`
//! (`timestamp << 8 | code`), so a publish is one store and a read is one
//! load. Readers never see a code paired with another command's timestamp.
//! Later publishes overwrite earlier ones, nothing is queued.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;

const CODE_BITS: u32 = 8;
const TIMESTAMP_MASK: u64 = (1 << (64 - CODE_BITS)) - 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Command {
    pub code: u8,
    /// Arrival time, µs on the channel's clock
    pub timestamp: u64,
}

impl Command {
    /// Slot content before anything is published
    pub const NONE: Command = Command {
        code: 0,
        timestamp: 0,
    };

    fn pack(self) -> u64 {
        (self.timestamp & TIMESTAMP_MASK) << CODE_BITS | u64::from(self.code)
    }

    fn unpack(v: u64) -> Self {
        Command {
            code: v as u8,
            timestamp: v >> CODE_BITS,
        }
    }
}

pub struct CommandChannel {
    slot: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl CommandChannel {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        CommandChannel {
            slot: AtomicU64::new(Command::NONE.pack()),
            clock,
        }
    }

    /// Store `code` stamped with the current time
    pub fn publish(&self, code: u8) -> Command {
        self.publish_at(code, self.clock.now_us())
    }

    pub fn publish_at(&self, code: u8, timestamp: u64) -> Command {
        let cmd = Command { code, timestamp };
        self.slot.store(cmd.pack(), Ordering::Release);
        cmd
    }

    pub fn read(&self) -> Command {
        Command::unpack(self.slot.load(Ordering::Acquire))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChannel")
            .field("command", &self.read())
            .finish()
    }
}
