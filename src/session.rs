//! Scoped serial sessions
//!
//! A [`Session`] owns the open port for exactly one operation. Dropping it
//! closes the port, so every exit path (success, error, Ctrl+C) releases the
//! device.

use crate::config::SerialSettings;
use crate::error::ProbeError;
use crate::serial::channel::{Clock, LineChannel};
use crate::serial::port::{self, PortConfig, SerialConnection};
use colored::Colorize;
use std::io;

pub struct Session {
    connection: SerialConnection,
    port: String,
}

impl Session {
    /// Resolve the port, open it and wait out the board's reset.
    ///
    /// An explicit `settings.port` is used as-is; otherwise the first port
    /// whose description matches `settings.match_patterns` is chosen.
    pub fn open<K: Clock + ?Sized>(settings: &SerialSettings, clock: &K) -> Result<Self, ProbeError> {
        let port = resolve_port(settings)?;

        println!(
            "{} Connecting to device on {}...",
            "[*]".cyan().bold(),
            port.white().bold()
        );
        let connection = SerialConnection::open(PortConfig::from_settings(&port, settings))?;
        log::info!("Opened {} at {} baud", port, settings.baud_rate);

        // Opening the port resets most boards; give the firmware time to boot
        clock.sleep(settings.settle_delay());

        println!("{} Connected", "[OK]".green().bold());
        Ok(Self { connection, port })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.connection.config().baud_rate
    }
}

impl LineChannel for Session {
    fn has_input(&mut self) -> io::Result<bool> {
        self.connection.has_input()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.connection.read_line()
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.connection.send_line(line)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::info!("Closed {}", self.port);
    }
}

/// The port a session would use, without opening it
pub fn resolve_port(settings: &SerialSettings) -> Result<String, ProbeError> {
    match settings.port {
        Some(ref explicit) => {
            log::debug!("Using configured port {}", explicit);
            Ok(explicit.clone())
        }
        None => Ok(port::locate_device_port(&settings.match_patterns)?.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_port_skips_discovery() {
        let settings = SerialSettings {
            port: Some("/dev/ttyACM3".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_port(&settings).unwrap(), "/dev/ttyACM3");
    }

    #[test]
    fn test_open_failure_is_reported_not_panicked() {
        let settings = SerialSettings {
            port: Some("/definitely/not/a/serial/port".to_string()),
            settle_ms: 0,
            ..Default::default()
        };
        let clock = crate::serial::testing::ManualClock::new();

        match Session::open(&settings, &clock) {
            Err(ProbeError::Open { port, .. }) => assert_eq!(port, "/definitely/not/a/serial/port"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a nonexistent port"),
        }
    }
}
