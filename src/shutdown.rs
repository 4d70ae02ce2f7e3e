use std::process::Command;

/// Invoked when a peer sends the shutdown control command. Fire and forget.
pub trait ShutdownAction: Send + Sync {
    fn request_shutdown(&self);
}

/// Halts the machine
#[derive(Debug, Default)]
pub struct SystemHalt;

impl ShutdownAction for SystemHalt {
    fn request_shutdown(&self) {
        log::info!("Shutting down the system");

        match Command::new("/sbin/shutdown").args(&["-h", "now"]).spawn() {
            Ok(child) => log::debug!("shutdown running as pid {}", child.id()),
            Err(e) => log::error!("Could not run shutdown: {}", e),
        }
    }
}

/// Only stops the server
#[derive(Debug, Default)]
pub struct NoHalt;

impl ShutdownAction for NoHalt {
    fn request_shutdown(&self) {
        log::info!("Shutdown requested, not halting the system");
    }
}
