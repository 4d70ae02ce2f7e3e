use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use legoirc_shared::{Decoder, Message};

use crate::vcdutils::read_vcd;

/// Decode frames from level changes `(timestamp_us, high)`
pub fn decode_changes(changes: &[(u64, bool)]) -> Vec<Message> {
    let mut decoder = Decoder::new();
    let mut level = false;
    let mut res = Vec::new();

    for &(ts, high) in changes {
        if high && !level {
            if let Some(msg) = decoder.event(ts) {
                res.push(msg);
            }
        }
        level = high;
    }

    res
}

pub fn command_decode(path: &Path) -> io::Result<()> {
    let changes = read_vcd(BufReader::new(File::open(path)?))?;
    log::debug!("{} level changes in {}", changes.len(), path.display());

    let msgs = decode_changes(&changes);

    if msgs.is_empty() {
        println!("No frame decoded");
    }

    for msg in msgs {
        println!(
            "{}\tSteering: {:?}\tThrottle: {:?}",
            msg,
            msg.steering(),
            msg.throttle(),
        );
    }

    Ok(())
}
