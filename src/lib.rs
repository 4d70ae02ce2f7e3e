//! Remote control for LEGO Power Functions infrared receivers.
//!
//! Peers send keypad keys over tcp ([`server`]). The latest key sits in a
//! single slot ([`channel`]) which the transmission loop ([`scheduler`])
//! watches, encodes and sends as bursts of timed pulses ([`irsend`]) on a
//! gpio or into a vcd file ([`emitter`], [`vcdutils`]).

pub mod channel;
pub mod client;
pub mod clock;
pub mod config;
pub mod decode;
pub mod emitter;
pub mod irsend;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod vcdutils;

#[cfg(test)]
mod testutil;

pub use legoirc_shared as protocol;
