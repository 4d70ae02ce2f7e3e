use std::io::{self, ErrorKind::InvalidInput, Read, Write};
use std::sync::Arc;

use vcd::{self, SimulationCommand, TimescaleUnit, Value};

use crate::clock::Clock;
use crate::emitter::{EmitterError, Level, PulseEmitter};

const MODULE: &str = "top";
const WIRE: &str = "ir";

/// Records the LED waveform to a vcd file instead of driving a pin
pub struct VcdEmitter<W: Write> {
    vcd: vcd::Writer<W>,
    wire_id: vcd::IdCode,
    clock: Arc<dyn Clock>,
    origin: u64,
    last_ts: Option<u64>,
}

impl<W: Write> VcdEmitter<W> {
    /// Write the header. Timestamps in the file are relative to now.
    pub fn new(out: W, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let mut writer = vcd::Writer::new(out);

        writer.timescale(1, TimescaleUnit::US)?;
        writer.add_module(MODULE)?;
        let wire_id = writer.add_wire(1, WIRE)?;
        writer.upscope()?;
        writer.enddefinitions()?;

        // Initial value
        writer.begin(SimulationCommand::Dumpvars)?;
        writer.change_scalar(wire_id, Value::V0)?;
        writer.end()?;

        let origin = clock.now_us();

        Ok(Self {
            vcd: writer,
            wire_id,
            clock,
            origin,
            last_ts: None,
        })
    }
}

impl<W: Write> PulseEmitter for VcdEmitter<W> {
    fn set_output(&mut self, level: Level) -> Result<(), EmitterError> {
        let ts = self.clock.now_us().saturating_sub(self.origin);

        if self.last_ts != Some(ts) {
            self.vcd.timestamp(ts)?;
            self.last_ts = Some(ts);
        }

        let value = match level {
            Level::High => Value::V1,
            Level::Low => Value::V0,
        };
        self.vcd.change_scalar(self.wire_id, value)?;

        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.delay_us(us)
    }

    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }
}

/// Read back the level changes of `top.ir`, timestamps in µs
pub fn read_vcd<R: Read>(reader: R) -> io::Result<Vec<(u64, bool)>> {
    let mut parser = vcd::Parser::new(reader);

    let header = parser.parse_header()?;
    let wire = header
        .find_var(&[MODULE, WIRE])
        .ok_or_else(|| io::Error::new(InvalidInput, "no wire top.ir"))?
        .code;

    let scale = match header.timescale {
        Some((n, TimescaleUnit::US)) => u64::from(n),
        Some((n, TimescaleUnit::MS)) => u64::from(n) * 1_000,
        Some((n, TimescaleUnit::S)) => u64::from(n) * 1_000_000,
        None => 1,
        Some(other) => {
            return Err(io::Error::new(
                InvalidInput,
                format!("unsupported timescale {:?}", other),
            ))
        }
    };

    let mut current_ts = 0;
    let mut res = Vec::new();

    for command_result in parser {
        use vcd::Command::*;
        match command_result? {
            ChangeScalar(id, v) if id == wire => res.push((current_ts * scale, v == Value::V1)),
            Timestamp(ts) => current_ts = ts,
            _ => (),
        }
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn waveform_roundtrip() {
        let clock = Arc::new(ManualClock::new(5_000));
        let mut buf = Vec::new();

        {
            let mut emitter = VcdEmitter::new(&mut buf, clock.clone()).unwrap();
            emitter.set_output(Level::High).unwrap();
            emitter.delay_us(157);
            emitter.set_output(Level::Low).unwrap();
            emitter.delay_us(263);
            emitter.set_output(Level::High).unwrap();
        }

        let changes = read_vcd(&buf[..]).unwrap();
        assert_eq!(changes, vec![(0, false), (0, true), (157, false), (420, true)]);
    }

    #[test]
    fn missing_wire_is_an_error() {
        let mut buf = Vec::new();
        {
            let mut w = vcd::Writer::new(&mut buf);
            w.timescale(1, TimescaleUnit::US).unwrap();
            w.add_module("top").unwrap();
            w.add_wire(1, "data").unwrap();
            w.upscope().unwrap();
            w.enddefinitions().unwrap();
        }

        let err = read_vcd(&buf[..]).unwrap_err();
        assert_eq!(err.kind(), InvalidInput);
    }
}
