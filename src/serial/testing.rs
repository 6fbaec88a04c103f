//! In-memory channel and clock for exercising the polling loops without
//! hardware or real sleeps.

use crate::serial::channel::{Clock, LineChannel};
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

/// Clock that only moves when slept on. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Channel fed from a script of lines, each released at a point in time
pub struct ScriptedChannel {
    clock: ManualClock,
    incoming: VecDeque<(Duration, String)>,
    sent: Vec<String>,
    fail_reads: bool,
}

impl ScriptedChannel {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            incoming: VecDeque::new(),
            sent: Vec::new(),
            fail_reads: false,
        }
    }

    /// Queue a line that is available immediately
    pub fn push(&mut self, line: &str) {
        self.push_at(Duration::ZERO, line);
    }

    /// Queue a line that becomes readable once the clock reaches `at`.
    /// Lines must be queued in time order.
    pub fn push_at(&mut self, at: Duration, line: &str) {
        self.incoming.push_back((at, line.to_string()));
    }

    /// Make every subsequent availability check fail
    pub fn fail_reads(&mut self) {
        self.fail_reads = true;
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }
}

impl LineChannel for ScriptedChannel {
    fn has_input(&mut self) -> io::Result<bool> {
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(self
            .incoming
            .front()
            .map_or(false, |(at, _)| *at <= self.clock.now()))
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.has_input()? {
            Ok(self.incoming.pop_front().map(|(_, line)| line))
        } else {
            Ok(None)
        }
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut line = line.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.sent.push(line);
        Ok(())
    }
}
