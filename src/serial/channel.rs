//! Line channel and clock capabilities, and the bounded command/response
//! exchange built on them.

use crate::config::ExchangeSettings;
use crate::device::DeviceCommand;
use std::io;
use std::time::{Duration, Instant};

/// A bidirectional, newline-delimited text channel
pub trait LineChannel {
    /// Whether a read would find data already waiting
    fn has_input(&mut self) -> io::Result<bool>;

    /// Read one line without its terminator, `None` when nothing arrived
    /// before the read timeout
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Write one line, appending `\n` if missing
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    fn send_command(&mut self, command: DeviceCommand) -> io::Result<()> {
        log::debug!("TX {}", command);
        self.send_line(&command.to_line())
    }
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
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
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounds for one command/response exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangePolicy {
    /// Give up waiting after this long
    pub window: Duration,
    /// Pause between checks while the device is silent
    pub poll_interval: Duration,
    /// Stop after this many response lines
    pub max_lines: usize,
    /// End at the first silent check once a response has started
    pub early_exit: bool,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self::from(&ExchangeSettings::default())
    }
}

impl From<&ExchangeSettings> for ExchangePolicy {
    fn from(settings: &ExchangeSettings) -> Self {
        Self {
            window: Duration::from_millis(settings.window_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_lines: settings.max_lines,
            early_exit: true,
        }
    }
}

impl ExchangePolicy {
    /// Same bounds, but keep listening until the window or the line cap ends
    /// the exchange
    pub fn full_window(self) -> Self {
        Self {
            early_exit: false,
            ..self
        }
    }
}

/// Send `command` and hand each response line to `on_line`.
///
/// Lines are read back-to-back while input is waiting; each silent check
/// sleeps one poll interval. With `early_exit`, the first silent check after
/// a line has arrived ends the exchange. The window and the line cap bound it
/// either way. Returns the number of lines received.
pub fn exchange<C, K, F>(
    channel: &mut C,
    clock: &K,
    command: DeviceCommand,
    policy: &ExchangePolicy,
    mut on_line: F,
) -> io::Result<usize>
where
    C: LineChannel + ?Sized,
    K: Clock + ?Sized,
    F: FnMut(&str),
{
    channel.send_command(command)?;

    let deadline = clock.now() + policy.window;
    let mut received = 0;

    while received < policy.max_lines && clock.now() < deadline {
        if channel.has_input()? {
            if let Some(line) = channel.read_line()? {
                let line = line.trim();
                if !line.is_empty() {
                    received += 1;
                    on_line(line);
                }
            }
            continue;
        }

        if received > 0 && policy.early_exit {
            log::debug!("{} answered with {} line(s)", command, received);
            return Ok(received);
        }
        clock.sleep(policy.poll_interval);
    }

    if received == 0 {
        log::warn!("No response to {} within {:?}", command, policy.window);
    }
    Ok(received)
}
