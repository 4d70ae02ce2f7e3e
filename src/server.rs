//! Line based command server.
//!
//! Every connection gets its own thread. Each line is one command: its first
//! byte is published as the keycode, the rest is ignored. `X` asks for a
//! system shutdown and ends the server. An empty line or a closed socket
//! ends only that connection.

use std::io::{self, BufReader, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::channel::CommandChannel;
use crate::shutdown::ShutdownAction;

/// Longest accepted line, excluding the terminator
pub const MAX_LINE: usize = 128;

/// Shutdown control command
pub const CONTROL_SHUTDOWN: u8 = b'X';

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Reads `\n` terminated lines into a bounded buffer
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: heapless::Vec<u8, MAX_LINE>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        LineReader {
            reader: BufReader::new(inner),
            buf: heapless::Vec::new(),
        }
    }

    /// Next line without its terminator, `\r\n` included. `None` once the
    /// peer closed; a partial last line is dropped.
    pub fn read_line(&mut self) -> io::Result<Option<&[u8]>> {
        self.buf.clear();
        let mut byte = [0u8; 1];

        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            if byte[0] == b'\n' {
                break;
            }

            self.buf
                .push(byte[0])
                .map_err(|_| io::Error::new(ErrorKind::InvalidData, "line too long"))?;
        }

        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        Ok(Some(&self.buf[..]))
    }
}

struct Peer {
    addr: SocketAddr,
    channel: Arc<CommandChannel>,
    shutdown: Arc<dyn ShutdownAction>,
    stop: Arc<AtomicBool>,
}

impl Peer {
    fn serve<R: Read>(&self, stream: R) -> io::Result<()> {
        let mut lines = LineReader::new(stream);

        loop {
            let line = match lines.read_line()? {
                Some(line) => line,
                None => {
                    log::debug!("Client {} closed connection", self.addr);
                    return Ok(());
                }
            };

            match line {
                [CONTROL_SHUTDOWN] => {
                    log::info!("Shutdown requested by {}", self.addr);
                    self.shutdown.request_shutdown();
                    self.stop.store(true, Ordering::SeqCst);
                    return Ok(());
                }
                [] => {
                    log::debug!("Client {} quit", self.addr);
                    return Ok(());
                }
                [code, ..] => {
                    log::debug!("Here is the message: >{}<", String::from_utf8_lossy(line));
                    self.channel.publish(*code);
                }
            }
        }
    }
}

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        Ok(Server { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept peers until `stop` is raised. Only accept failures are fatal,
    /// a failing connection is logged and dropped.
    pub fn run(
        &self,
        channel: Arc<CommandChannel>,
        shutdown: Arc<dyn ShutdownAction>,
        stop: Arc<AtomicBool>,
    ) -> io::Result<()> {
        log::info!("Server is up on {}", self.local_addr()?);

        while !stop.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("New connection from {}", addr.ip());

                    let peer = Peer {
                        addr,
                        channel: channel.clone(),
                        shutdown: shutdown.clone(),
                        stop: stop.clone(),
                    };

                    if let Err(e) = spawn_peer(stream, peer) {
                        log::warn!("Dropping connection from {}: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(ref e)
                    if e.kind() == ErrorKind::Interrupted
                        || e.kind() == ErrorKind::ConnectionAborted
                        || e.kind() == ErrorKind::ConnectionReset =>
                {
                    log::warn!("accept: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        log::info!("Server stopped");
        Ok(())
    }
}

fn spawn_peer(stream: TcpStream, peer: Peer) -> io::Result<()> {
    stream.set_nonblocking(false)?;

    thread::Builder::new()
        .name(format!("peer-{}", peer.addr))
        .spawn(move || {
            if let Err(e) = peer.serve(stream) {
                log::warn!("Error reading from {}: {}", peer.addr, e);
            }
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    use crate::channel::Command;
    use crate::clock::ManualClock;

    #[derive(Default)]
    struct CountingShutdown(AtomicUsize);

    impl ShutdownAction for CountingShutdown {
        fn request_shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lines(input: &[u8]) -> Vec<io::Result<Vec<u8>>> {
        let mut reader = LineReader::new(Cursor::new(input.to_vec()));
        let mut out = Vec::new();
        loop {
            match reader.read_line() {
                Ok(Some(line)) => out.push(Ok(line.to_vec())),
                Ok(None) => break,
                Err(e) => {
                    out.push(Err(e));
                    break;
                }
            }
        }
        out
    }

    #[test]
    fn splits_lines_and_strips_cr() {
        let got: Vec<_> = lines(b"8\r\n55\n\nabc")
            .into_iter()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(got, vec![b"8".to_vec(), b"55".to_vec(), b"".to_vec()]);
    }

    #[test]
    fn overlong_line_is_an_error() {
        let mut input = vec![b'8'; MAX_LINE + 1];
        input.push(b'\n');
        let got = lines(&input);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].as_ref().unwrap_err().kind(), ErrorKind::InvalidData);

        let mut input = vec![b'8'; MAX_LINE];
        input.push(b'\n');
        assert_eq!(lines(&input)[0].as_ref().unwrap().len(), MAX_LINE);
    }

    fn peer(shutdown: Arc<CountingShutdown>) -> Peer {
        Peer {
            addr: "127.0.0.1:5001".parse().unwrap(),
            channel: Arc::new(CommandChannel::new(Arc::new(ManualClock::new(7)))),
            shutdown,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn publishes_first_byte() {
        let p = peer(Arc::default());
        p.serve(Cursor::new(b"8\n4xyz\n".to_vec())).unwrap();
        assert_eq!(p.channel.read(), Command { code: b'4', timestamp: 7 });
        assert!(!p.stop.load(Ordering::SeqCst));
    }

    #[test]
    fn empty_line_ends_connection() {
        let p = peer(Arc::default());
        p.serve(Cursor::new(b"8\n\n2\n".to_vec())).unwrap();
        assert_eq!(p.channel.read().code, b'8');
    }

    #[test]
    fn control_command_requests_shutdown() {
        let shutdown = Arc::new(CountingShutdown::default());
        let p = peer(shutdown.clone());
        p.serve(Cursor::new(b"X\r\n8\n".to_vec())).unwrap();

        assert_eq!(shutdown.0.load(Ordering::SeqCst), 1);
        assert!(p.stop.load(Ordering::SeqCst));
        assert_eq!(p.channel.read(), Command::NONE);
    }

    #[test]
    fn x_with_trailing_bytes_is_a_keycode() {
        let shutdown = Arc::new(CountingShutdown::default());
        let p = peer(shutdown.clone());
        p.serve(Cursor::new(b"Xy\n".to_vec())).unwrap();

        assert_eq!(shutdown.0.load(Ordering::SeqCst), 0);
        assert_eq!(p.channel.read().code, b'X');
    }
}
