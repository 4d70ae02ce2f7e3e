//! Interactive keyboard client: every key press becomes a one-character line.

use std::io::{self, Write};
use std::net::TcpStream;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

pub const QUIT_KEY: char = 'q';

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Send(u8),
    Quit,
    Interrupt,
    Ignore,
}

impl KeyAction {
    pub fn from_key(key: &KeyEvent) -> Self {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                KeyAction::Interrupt
            }
            KeyCode::Char(QUIT_KEY) => KeyAction::Quit,
            KeyCode::Char(c) if c.is_ascii() => KeyAction::Send(c as u8),
            _ => KeyAction::Ignore,
        }
    }

    /// Bytes put on the wire
    pub fn line(self) -> Option<Vec<u8>> {
        match self {
            KeyAction::Send(code) => Some(vec![code, b'\n']),
            KeyAction::Quit => Some(vec![b'\n']),
            KeyAction::Interrupt | KeyAction::Ignore => None,
        }
    }
}

/// Restores the terminal when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

pub fn run(host: &str, port: u16) -> io::Result<()> {
    println!("Connecting to {}:{}", host, port);
    let mut stream = TcpStream::connect((host, port))?;

    let _raw = RawModeGuard::new()?;
    // raw mode, no implicit carriage return
    print!("Quit by pressing '{}' key.\r\n", QUIT_KEY);
    io::stdout().flush()?;

    loop {
        let key = match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => key,
            _ => continue,
        };

        let action = KeyAction::from_key(&key);
        if let Some(line) = action.line() {
            stream.write_all(&line)?;
        }

        match action {
            KeyAction::Quit => {
                print!("Closing connection\r\n");
                return Ok(());
            }
            KeyAction::Interrupt => {
                print!("Interruption caught\r\n");
                return Ok(());
            }
            _ => (),
        }
    }
}
