//! LEGO Power Functions "Combo PWM" frames.
//!
//! A frame is 16 bits sent most significant bit first:
//!
//! ```text
//!  15..12   11..8      7..4       3..0
//! [ Mode | Steering | Throttle | Checksum ]
//! ```
//!
//! `Checksum = 0b1111 ^ Mode ^ Steering ^ Throttle`.

use core::convert::TryFrom;
use core::fmt;

pub const KEYCODE_BACKWARD_LEFT: u8 = b'1';
pub const KEYCODE_BACKWARD: u8 = b'2';
pub const KEYCODE_BACKWARD_RIGHT: u8 = b'3';
pub const KEYCODE_LEFT: u8 = b'4';
pub const KEYCODE_STOP: u8 = b'5';
pub const KEYCODE_RIGHT: u8 = b'6';
pub const KEYCODE_FORWARD_LEFT: u8 = b'7';
pub const KEYCODE_FORWARD: u8 = b'8';
pub const KEYCODE_FORWARD_RIGHT: u8 = b'9';
pub const KEYCODE_QUIT: u8 = b'q';

/// Vector the checksum is xor'ed against
pub const FIXED_VECTOR: u8 = 0b1111;
/// Mode nibble of this protocol version
pub const MODE_NIBBLE: u8 = 0b0100;

/// Infrared protocol mode, numbered as on the command line
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Extended = 1,
    ComboDirect = 2,
    SingleOutput = 3,
    ComboPwm = 4,
}

impl TryFrom<u8> for Mode {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Mode::Extended),
            2 => Ok(Mode::ComboDirect),
            3 => Ok(Mode::SingleOutput),
            4 => Ok(Mode::ComboPwm),
            other => Err(other),
        }
    }
}

/// Receiver channel, 1 to 4
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Channel(u8);

impl Channel {
    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1..=4 => Ok(Channel(v)),
            other => Err(other),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Steering {
    Null,
    Stop,
    Left,
    Right,
}

impl Steering {
    pub const fn nibble(self) -> u8 {
        match self {
            Steering::Null => 0b0000,
            Steering::Stop => 0b1000,
            Steering::Left => 0b0111,
            Steering::Right => 0b1001,
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0b0000 => Some(Steering::Null),
            0b1000 => Some(Steering::Stop),
            0b0111 => Some(Steering::Left),
            0b1001 => Some(Steering::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Throttle {
    Null,
    Stop,
    Forward,
    Backward,
}

impl Throttle {
    pub const fn nibble(self) -> u8 {
        match self {
            Throttle::Null => 0b0000,
            Throttle::Stop => 0b1000,
            Throttle::Forward => 0b0111,
            Throttle::Backward => 0b1001,
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0b0000 => Some(Throttle::Null),
            0b1000 => Some(Throttle::Stop),
            0b0111 => Some(Throttle::Forward),
            0b1001 => Some(Throttle::Backward),
            _ => None,
        }
    }
}

/// Keypad directions
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    BackwardLeft,
    Backward,
    BackwardRight,
    Left,
    Stop,
    Right,
    ForwardLeft,
    Forward,
    ForwardRight,
}

impl Direction {
    pub fn from_keycode(keycode: u8) -> Option<Self> {
        use Direction::*;
        match keycode {
            KEYCODE_BACKWARD_LEFT => Some(BackwardLeft),
            KEYCODE_BACKWARD => Some(Backward),
            KEYCODE_BACKWARD_RIGHT => Some(BackwardRight),
            KEYCODE_LEFT => Some(Left),
            KEYCODE_STOP => Some(Stop),
            KEYCODE_RIGHT => Some(Right),
            KEYCODE_FORWARD_LEFT => Some(ForwardLeft),
            KEYCODE_FORWARD => Some(Forward),
            KEYCODE_FORWARD_RIGHT => Some(ForwardRight),
            _ => None,
        }
    }

    pub fn steering(self) -> Steering {
        use Direction::*;
        match self {
            BackwardLeft | Left | ForwardLeft => Steering::Left,
            BackwardRight | Right | ForwardRight => Steering::Right,
            Backward | Forward => Steering::Null,
            Stop => Steering::Stop,
        }
    }

    pub fn throttle(self) -> Throttle {
        use Direction::*;
        match self {
            BackwardLeft | Backward | BackwardRight => Throttle::Backward,
            ForwardLeft | Forward | ForwardRight => Throttle::Forward,
            Left | Right => Throttle::Null,
            Stop => Throttle::Stop,
        }
    }

    pub fn message(self) -> Message {
        Message::new(self.steering(), self.throttle())
    }
}

/// One encoded frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Message {
    steering: Steering,
    throttle: Throttle,
}

impl Message {
    pub const BITS: usize = 16;

    pub fn new(steering: Steering, throttle: Throttle) -> Self {
        Message { steering, throttle }
    }

    /// Parse a raw frame. Fails unless mode and checksum verify and both
    /// direction nibbles are known constants.
    pub fn from_raw(raw: u16) -> Option<Self> {
        let nibble = |shift: u16| ((raw >> shift) & 0xf) as u8;

        if nibble(12) != MODE_NIBBLE {
            return None;
        }

        let msg = Message {
            steering: Steering::from_nibble(nibble(8))?,
            throttle: Throttle::from_nibble(nibble(4))?,
        };

        if msg.checksum() != nibble(0) {
            return None;
        }

        Some(msg)
    }

    pub fn mode(&self) -> u8 {
        MODE_NIBBLE
    }

    pub fn steering(&self) -> Steering {
        self.steering
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    pub fn checksum(&self) -> u8 {
        FIXED_VECTOR ^ MODE_NIBBLE ^ self.steering.nibble() ^ self.throttle.nibble()
    }

    pub fn raw(&self) -> u16 {
        u16::from(MODE_NIBBLE) << 12
            | u16::from(self.steering.nibble()) << 8
            | u16::from(self.throttle.nibble()) << 4
            | u16::from(self.checksum())
    }

    /// Frame bits, most significant first
    pub fn bits(&self) -> impl Iterator<Item = bool> {
        let raw = self.raw();
        (0..Self::BITS).rev().map(move |i| raw & (1 << i) != 0)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        write!(
            f,
            "{:04b} {:04b} {:04b} {:04b}",
            raw >> 12,
            (raw >> 8) & 0xf,
            (raw >> 4) & 0xf,
            raw & 0xf
        )
    }
}

/// Reasons a keycode produces no frame. Not an error: the sender skips the cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Unsupported {
    Quit,
    UnknownKeycode(u8),
    ModeNotImplemented(Mode),
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsupported::Quit => write!(f, "quit"),
            Unsupported::UnknownKeycode(code) => write!(f, "unknown keycode {}", code),
            Unsupported::ModeNotImplemented(mode) => write!(f, "{:?} mode is not implemented yet", mode),
        }
    }
}

/// Encode `keycode` for `mode`
pub fn encode(keycode: u8, mode: Mode) -> Result<Message, Unsupported> {
    if mode != Mode::ComboPwm {
        return Err(Unsupported::ModeNotImplemented(mode));
    }

    if keycode == KEYCODE_QUIT {
        return Err(Unsupported::Quit);
    }

    let direction = Direction::from_keycode(keycode).ok_or(Unsupported::UnknownKeycode(keycode))?;
    log::debug!("Direction: {:?}", direction);

    Ok(direction.message())
}
