//! The transmission loop.
//!
//! Watches the command slot and turns fresh commands into bursts. A new
//! burst is started when the command arrived more than
//! [`COMMAND_POLL_INTERVAL`] after the last handled one, or when it is a STOP
//! that has not been sent yet. STOP therefore always gets through, and only
//! once per occurrence.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use legoirc_shared::protocol::KEYCODE_STOP;
use legoirc_shared::timing::COMMAND_POLL_INTERVAL;
use legoirc_shared::{encode, Mode, Unsupported};

use crate::channel::{Command, CommandChannel};
use crate::clock::Clock;
use crate::emitter::{EmitterError, PulseEmitter};
use crate::irsend::{BurstOutcome, Transmitter};

/// What one pass of the loop did
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// Nothing new, waited one poll interval
    Idle,
    /// New command, but too soon after the last handled one
    Pending,
    Skipped(Unsupported),
    Sent(BurstOutcome),
}

pub struct Scheduler<E> {
    channel: Arc<CommandChannel>,
    clock: Arc<dyn Clock>,
    transmitter: Transmitter<E>,
    mode: Mode,

    last_handled: Option<u64>,
    last_seen: u64,
    stop_sent: bool,
}

impl<E: PulseEmitter> Scheduler<E> {
    pub fn new(channel: Arc<CommandChannel>, transmitter: Transmitter<E>, mode: Mode) -> Self {
        let clock = channel.clock().clone();

        Scheduler {
            channel,
            clock,
            transmitter,
            mode,
            last_handled: None,
            last_seen: Command::NONE.timestamp,
            stop_sent: false,
        }
    }

    pub fn stop_sent(&self) -> bool {
        self.stop_sent
    }

    pub fn transmitter(&self) -> &Transmitter<E> {
        &self.transmitter
    }

    pub fn transmitter_mut(&mut self) -> &mut Transmitter<E> {
        &mut self.transmitter
    }

    /// Microseconds between `cmd` and the last handled command
    fn elapsed(&self, cmd: &Command) -> i64 {
        match self.last_handled {
            Some(last) => cmd.timestamp as i64 - last as i64,
            None if *cmd == Command::NONE => 0,
            None => i64::MAX,
        }
    }

    pub fn step(&mut self) -> Result<Cycle, EmitterError> {
        let cmd = self.channel.read();
        let elapsed = self.elapsed(&cmd);
        let fresh = cmd.timestamp != self.last_seen;
        self.last_seen = cmd.timestamp;

        let stop_pending = cmd.code == KEYCODE_STOP && !self.stop_sent;

        if elapsed > i64::from(COMMAND_POLL_INTERVAL) || stop_pending {
            let cycle = self.handle(cmd)?;

            self.stop_sent = cmd.code == KEYCODE_STOP;
            self.last_handled = Some(cmd.timestamp);

            return Ok(cycle);
        }

        if elapsed == 0 || !fresh {
            self.clock.delay_us(COMMAND_POLL_INTERVAL);
            return Ok(Cycle::Idle);
        }

        Ok(Cycle::Pending)
    }

    fn handle(&mut self, cmd: Command) -> Result<Cycle, EmitterError> {
        match encode(cmd.code, self.mode) {
            Ok(msg) => {
                log::debug!("Sending {} for keycode {}", msg, cmd.code);
                let outcome = self.transmitter.send_burst(&msg, cmd.code, &self.channel)?;
                Ok(Cycle::Sent(outcome))
            }
            Err(reason) => {
                match reason {
                    Unsupported::ModeNotImplemented(_) => log::info!("{}", reason),
                    _ => log::debug!("Not sending: {}", reason),
                }
                Ok(Cycle::Skipped(reason))
            }
        }
    }

    /// Loop until `stop` is set or the emitter fails
    pub fn run(mut self, stop: &AtomicBool) -> Result<(), EmitterError> {
        while !stop.load(Ordering::Relaxed) {
            self.step()?;
        }

        Ok(())
    }
}

impl<E: PulseEmitter + Send + 'static> Scheduler<E> {
    /// Run on a dedicated thread. An emitter fault is logged and raises
    /// `stop` so the rest of the process winds down too.
    pub fn spawn(self, stop: Arc<AtomicBool>) -> io::Result<JoinHandle<Result<(), EmitterError>>> {
        thread::Builder::new()
            .name("ir-scheduler".into())
            .spawn(move || {
                let res = self.run(&stop);
                if let Err(e) = &res {
                    log::error!("Transmission stopped: {}", e);
                }
                stop.store(true, Ordering::SeqCst);
                res
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    use legoirc_shared::{Channel, Message, Steering, Throttle, Timing};

    use crate::clock::ManualClock;
    use crate::emitter::Level;
    use crate::testutil::Recorder;

    const START: u64 = 1_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        channel: Arc<CommandChannel>,
        scheduler: Scheduler<Recorder>,
    }

    fn fixture(mode: Mode) -> Fixture {
        let clock = Arc::new(ManualClock::new(START));
        let channel = Arc::new(CommandChannel::new(clock.clone()));
        let timing = Timing::for_channel(Channel::try_from(1).unwrap());
        let tx = Transmitter::new(Recorder::new(clock.clone()), timing);
        let scheduler = Scheduler::new(channel.clone(), tx, mode);

        Fixture {
            clock,
            channel,
            scheduler,
        }
    }

    fn frames(f: &Fixture) -> Vec<Message> {
        f.scheduler.transmitter().emitter().frames()
    }

    #[test]
    fn idles_without_commands() {
        let mut f = fixture(Mode::ComboPwm);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Idle);
        assert_eq!(f.clock.now_us(), START + u64::from(COMMAND_POLL_INTERVAL));
        assert!(frames(&f).is_empty());
    }

    #[test]
    fn first_command_is_sent() {
        let mut f = fixture(Mode::ComboPwm);
        f.channel.publish(b'8');

        assert_eq!(f.scheduler.step().unwrap(), Cycle::Sent(BurstOutcome::Completed));
        let fwd = Message::new(Steering::Null, Throttle::Forward);
        assert_eq!(frames(&f), vec![fwd; 5]);

        // same command again: nothing new
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Idle);
        assert_eq!(frames(&f).len(), 5);
    }

    #[test]
    fn rapid_repeat_waits_for_poll_interval() {
        let mut f = fixture(Mode::ComboPwm);
        f.channel.publish_at(b'8', START);
        f.scheduler.step().unwrap();

        f.channel.publish_at(b'8', START + 50_000);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Pending);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Idle);

        f.channel.publish_at(b'8', START + 150_000);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Sent(BurstOutcome::Completed));
        assert_eq!(frames(&f).len(), 10);
    }

    #[test]
    fn stop_is_never_starved_and_sent_once() {
        let mut f = fixture(Mode::ComboPwm);
        f.channel.publish_at(b'8', START);
        f.scheduler.step().unwrap();
        assert!(!f.scheduler.stop_sent());

        // within the poll interval, but STOP goes through anyway
        f.channel.publish_at(b'5', START + 10_000);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Sent(BurstOutcome::Completed));
        assert!(f.scheduler.stop_sent());

        // a second STOP right after is not resent
        f.channel.publish_at(b'5', START + 20_000);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Pending);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Idle);
        assert!(f.scheduler.stop_sent());

        // another direction clears the flag, the next STOP is sent again
        f.channel.publish_at(b'4', START + 200_000);
        f.scheduler.step().unwrap();
        assert!(!f.scheduler.stop_sent());
        f.channel.publish_at(b'5', START + 210_000);
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Sent(BurstOutcome::Completed));

        let stop = Message::new(Steering::Stop, Throttle::Stop);
        let stops = frames(&f).into_iter().filter(|m| *m == stop).count();
        assert_eq!(stops, 10);
    }

    #[test]
    fn unsupported_codes_are_skipped() {
        let mut f = fixture(Mode::ComboPwm);
        f.channel.publish(b'q');
        assert_eq!(f.scheduler.step().unwrap(), Cycle::Skipped(Unsupported::Quit));
        assert!(f.scheduler.transmitter().emitter().changes.is_empty());
    }

    #[test]
    fn unimplemented_mode_skips() {
        let mut f = fixture(Mode::Extended);
        f.channel.publish(b'8');
        assert_eq!(
            f.scheduler.step().unwrap(),
            Cycle::Skipped(Unsupported::ModeNotImplemented(Mode::Extended))
        );
        assert!(frames(&f).is_empty());
    }

    #[test]
    fn changed_command_abandons_burst() {
        let mut f = fixture(Mode::ComboPwm);
        f.channel.publish(b'8');
        f.scheduler.transmitter.emitter_mut().interrupt = Some((1, b'2', f.channel.clone()));

        assert_eq!(
            f.scheduler.step().unwrap(),
            Cycle::Sent(BurstOutcome::Abandoned { sent: 1 })
        );

        let fwd = Message::new(Steering::Null, Throttle::Forward);
        assert_eq!(frames(&f), vec![fwd]);
    }

    #[test]
    fn run_stops_on_flag() {
        let f = fixture(Mode::ComboPwm);
        let stop = AtomicBool::new(true);
        f.scheduler.run(&stop).unwrap();
    }

    #[test]
    fn emitter_fault_ends_loop() {
        struct Broken;

        impl PulseEmitter for Broken {
            fn set_output(&mut self, _: Level) -> Result<(), EmitterError> {
                Err(EmitterError::Pin("gone".into()))
            }
            fn delay_us(&mut self, _: u32) {}
            fn now_us(&self) -> u64 {
                0
            }
        }

        let clock = Arc::new(ManualClock::new(START));
        let channel = Arc::new(CommandChannel::new(clock));
        channel.publish(b'8');
        let timing = Timing::for_channel(Channel::try_from(4).unwrap());
        let scheduler = Scheduler::new(channel, Transmitter::new(Broken, timing), Mode::ComboPwm);

        let stop = Arc::new(AtomicBool::new(false));
        let handle = scheduler.spawn(stop.clone()).unwrap();
        assert!(handle.join().unwrap().is_err());
        assert!(stop.load(Ordering::SeqCst));
    }
}
