//! Monotonic microsecond time and delays.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Delays longer than this sleep first, then spin to the deadline
const SPIN_THRESHOLD_US: u32 = 450;
/// Spun, not slept, at the end of a long delay
const SLEEP_MARGIN_US: u32 = 200;

pub trait Clock: Send + Sync {
    /// Microseconds since the clock's origin
    fn now_us(&self) -> u64;

    fn delay_us(&self, us: u32);
}

/// Wall clock backed by [`Instant`]
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn delay_us(&self, us: u32) {
        let deadline = Instant::now() + Duration::from_micros(u64::from(us));

        if us > SPIN_THRESHOLD_US {
            thread::sleep(Duration::from_micros(u64::from(us - SLEEP_MARGIN_US)));
        }

        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Virtual clock. Delays advance time instantly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        ManualClock {
            now: AtomicU64::new(start_us),
        }
    }

    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_us(&self, us: u32) {
        self.advance(u64::from(us));
    }
}
