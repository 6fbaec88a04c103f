//! Live monitor for the sensor's reading stream
//!
//! Provides:
//! - Decoding of JSON readings into formatted status lines
//! - A rolling sample buffer for the post-session plot
//! - Optional timestamped session log
//! - Stop on Ctrl+C with a summary

use crate::config::MonitorSettings;
use crate::device::{classify_line, DeviceReading, LineKind};
use crate::error::ProbeError;
use crate::interrupt::Interrupt;
use crate::samples::{Sample, SampleBuffer};
use crate::serial::channel::{Clock, LineChannel};
use chrono::Local;
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Back-off after a failed read
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Give up after this many failed reads in a row; a vanished port never
/// comes back on its own.
const MAX_CONSECUTIVE_ERRORS: u32 = 50;

/// What one received line produced
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Reading { sample: Sample, reading: DeviceReading },
    /// JSON-shaped but undecodable
    Malformed(String),
    /// Plain device text
    Text(String),
}

impl MonitorEvent {
    /// The line as shown to the user, without color
    pub fn render(&self) -> String {
        match self {
            MonitorEvent::Reading { sample, reading } => format_status(sample.time, reading),
            MonitorEvent::Malformed(line) => format!("Non-JSON: {}", line),
            MonitorEvent::Text(line) => format!("Arduino: {}", line),
        }
    }

    fn print(&self) {
        match self {
            MonitorEvent::Reading { reading, .. } if reading.activated => {
                println!("{}", self.render().green())
            }
            MonitorEvent::Reading { .. } => println!("{}", self.render()),
            MonitorEvent::Malformed(line) => println!("{} {}", "Non-JSON:".yellow(), line),
            MonitorEvent::Text(line) => println!("{} {}", "Arduino:".cyan(), line),
        }
    }
}

/// Fixed-width status line for one reading
pub fn format_status(elapsed_secs: f64, reading: &DeviceReading) -> String {
    format!(
        "Time: {:.1}s | EMG: {:4} | Activity: {:5.1}% | Fatigue: {:5.1}% | Active: {}",
        elapsed_secs,
        reading.emg,
        reading.muscle_activity,
        reading.fatigue,
        if reading.activated { "YES" } else { "NO" }
    )
}

/// Line counters for the summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStats {
    pub lines: usize,
    pub readings: usize,
    pub malformed: usize,
    pub text: usize,
    pub read_errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    ReadFailure,
}

/// Everything the monitor collected, handed back when it stops
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub samples: SampleBuffer,
    pub stats: MonitorStats,
    pub stopped_by: StopReason,
}

/// Stream monitor state
pub struct StreamMonitor {
    samples: SampleBuffer,
    stats: MonitorStats,
    poll_interval: Duration,
    log_writer: Option<BufWriter<File>>,
    started_at: Option<Duration>,
}

impl StreamMonitor {
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            samples: SampleBuffer::new(settings.buffer_capacity),
            stats: MonitorStats::default(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            log_writer: None,
            started_at: None,
        }
    }

    /// Append every received line, timestamped, to `path`
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProbeError::io("open monitor log file", e))?;
        self.log_writer = Some(BufWriter::new(file));
        println!(
            "{} Logging to: {}",
            "[LOG]".cyan().bold(),
            path.display().to_string().white()
        );
        Ok(self)
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Decode one received line. `now` is the clock reading at receipt;
    /// the first call fixes the session start if `start` was not called.
    pub fn process_line(&mut self, raw: &str, now: Duration) -> Option<MonitorEvent> {
        let started_at = *self.started_at.get_or_insert(now);

        let event = match classify_line(raw) {
            LineKind::Empty => return None,
            LineKind::Reading(reading) => {
                let sample = Sample {
                    time: now.saturating_sub(started_at).as_secs_f64(),
                    emg: reading.emg,
                    activity: reading.muscle_activity,
                };
                self.samples.push(sample);
                self.stats.readings += 1;
                MonitorEvent::Reading { sample, reading }
            }
            LineKind::Malformed(line) => {
                self.stats.malformed += 1;
                MonitorEvent::Malformed(line)
            }
            LineKind::Text(line) => {
                self.stats.text += 1;
                MonitorEvent::Text(line)
            }
        };
        self.stats.lines += 1;

        let log_failure = self.log_writer.as_mut().and_then(|writer| {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(writer, "[{}] {}", timestamp, raw.trim())
                .and_then(|_| writer.flush())
                .err()
        });
        if let Some(e) = log_failure {
            log::warn!("Dropping monitor log output: {}", e);
            self.log_writer = None;
        }

        Some(event)
    }

    /// Mark the session start; elapsed times are measured from here
    pub fn start(&mut self, now: Duration) {
        self.started_at = Some(now);
    }

    /// Poll the channel until `interrupt` is raised
    pub fn run<C, K>(self, channel: &mut C, clock: &K, interrupt: &Interrupt) -> MonitorReport
    where
        C: LineChannel + ?Sized,
        K: Clock + ?Sized,
    {
        self.run_until(channel, clock, || interrupt.is_set())
    }

    /// Poll the channel until `should_stop` returns true. Every iteration
    /// sleeps one poll interval whether or not a line was read.
    pub fn run_until<C, K, S>(mut self, channel: &mut C, clock: &K, should_stop: S) -> MonitorReport
    where
        C: LineChannel + ?Sized,
        K: Clock + ?Sized,
        S: Fn() -> bool,
    {
        self.start(clock.now());
        let mut consecutive_errors = 0u32;
        let mut stopped_by = StopReason::Interrupted;

        while !should_stop() {
            let polled = match channel.has_input() {
                Ok(true) => channel.read_line(),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            };

            match polled {
                Ok(line) => {
                    consecutive_errors = 0;
                    if let Some(line) = line {
                        if let Some(event) = self.process_line(&line, clock.now()) {
                            event.print();
                        }
                    }
                }
                Err(e) => {
                    self.stats.read_errors += 1;
                    consecutive_errors += 1;
                    eprintln!("{} Read error: {}", "[ERROR]".red().bold(), e);
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        log::error!("Giving up after {} failed reads", consecutive_errors);
                        stopped_by = StopReason::ReadFailure;
                        break;
                    }
                    clock.sleep(ERROR_BACKOFF);
                    continue;
                }
            }

            clock.sleep(self.poll_interval);
        }

        if let Some(ref mut writer) = self.log_writer {
            let _ = writer.flush();
        }

        MonitorReport {
            samples: self.samples,
            stats: self.stats,
            stopped_by,
        }
    }
}

/// Print monitor header
pub fn print_header(port: &str, baud_rate: u32) {
    println!("{}", "=".repeat(70).dimmed());
    println!("{}: {}", "Port".cyan(), port.white());
    println!("{}: {}", "Baud".cyan(), baud_rate.to_string().white());
    println!("{}", "=".repeat(70).dimmed());
    println!("{}", "Press Ctrl+C to stop\n".yellow());
}

/// Print summary statistics
pub fn print_summary(report: &MonitorReport) {
    let stats = &report.stats;
    println!("\n{}", "=".repeat(70).dimmed());
    println!("{}", "--- Monitor Summary ---".cyan().bold());
    println!("Total lines: {}", stats.lines);
    println!("Readings: {}", stats.readings);
    println!(
        "Malformed payloads: {}",
        if stats.malformed > 0 {
            stats.malformed.to_string().yellow().to_string()
        } else {
            stats.malformed.to_string()
        }
    );
    println!("Device messages: {}", stats.text);
    if stats.read_errors > 0 {
        println!("Read errors: {}", stats.read_errors.to_string().red().bold());
    }
    println!(
        "Buffered samples: {} (capacity {})",
        report.samples.len(),
        report.samples.capacity()
    );
    println!("{}", "=".repeat(70).dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::testing::{ManualClock, ScriptedChannel};

    const READING: &str =
        r#"{"emg": 512, "muscleActivity": 40.0, "fatigue": 5.0, "activated": true}"#;

    fn monitor() -> StreamMonitor {
        StreamMonitor::new(&MonitorSettings::default())
    }

    #[test]
    fn test_reading_produces_status_and_sample() {
        let mut monitor = monitor();
        monitor.start(Duration::ZERO);

        let event = monitor.process_line(READING, Duration::from_millis(1500)).unwrap();
        let rendered = event.render();

        assert!(rendered.contains("Time: 1.5s"));
        assert!(rendered.contains("EMG:  512"));
        assert!(rendered.contains("Activity:  40.0%"));
        assert!(rendered.contains("Fatigue:   5.0%"));
        assert!(rendered.contains("Active: YES"));

        let samples: Vec<&Sample> = monitor.samples().iter().collect();
        assert_eq!(
            samples,
            vec![&Sample { time: 1.5, emg: 512, activity: 40.0 }]
        );
    }

    #[test]
    fn test_missing_fields_render_defaults() {
        let mut monitor = monitor();
        let event = monitor.process_line("{}", Duration::ZERO).unwrap();
        assert_eq!(
            event.render(),
            "Time: 0.0s | EMG:    0 | Activity:   0.0% | Fatigue:   0.0% | Active: NO"
        );
    }

    #[test]
    fn test_text_line_is_tagged_and_not_buffered() {
        let mut monitor = monitor();
        let event = monitor.process_line("not json", Duration::ZERO).unwrap();

        assert_eq!(event, MonitorEvent::Text("not json".to_string()));
        assert_eq!(event.render(), "Arduino: not json");
        assert!(monitor.samples().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_tagged_and_not_buffered() {
        let mut monitor = monitor();
        let event = monitor.process_line("{emg=12}", Duration::ZERO).unwrap();

        assert_eq!(event.render(), "Non-JSON: {emg=12}");
        assert!(monitor.samples().is_empty());
        assert_eq!(monitor.stats().malformed, 1);
    }

    #[test]
    fn test_one_event_per_line() {
        let lines = [
            READING,
            "EMG Sensor Ready",
            r#"{"emg": 100}"#,
            "{broken",
            "{broken}",
            "",
            r#"{"emg": 90, "activated": false}"#,
        ];
        let mut monitor = monitor();
        let mut appends = 0;
        let mut raw = 0;

        for (i, line) in lines.iter().enumerate() {
            let before = monitor.samples().len();
            match monitor.process_line(line, Duration::from_millis(i as u64 * 100)) {
                Some(MonitorEvent::Reading { .. }) => {
                    assert_eq!(monitor.samples().len(), before + 1);
                    appends += 1;
                }
                Some(_) => {
                    assert_eq!(monitor.samples().len(), before);
                    raw += 1;
                }
                None => assert!(line.is_empty()),
            }
        }

        assert_eq!(appends, 3);
        assert_eq!(raw, 3);
        assert_eq!(monitor.stats().lines, 6);
    }

    #[test]
    fn test_buffer_respects_configured_capacity() {
        let settings = MonitorSettings {
            buffer_capacity: 5,
            ..Default::default()
        };
        let mut monitor = StreamMonitor::new(&settings);
        for i in 0..12 {
            monitor.process_line(&format!(r#"{{"emg": {}}}"#, i), Duration::from_millis(i * 10));
        }

        let emg: Vec<i64> = monitor.samples().emg_values().collect();
        assert_eq!(emg, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_run_collects_until_stopped() {
        let clock = ManualClock::new();
        let mut channel = ScriptedChannel::new(clock.clone());
        channel.push("EMG Sensor Ready");
        channel.push_at(Duration::from_millis(20), r#"{"emg": 300, "muscleActivity": 12.5}"#);
        channel.push_at(Duration::from_millis(40), r#"{"emg": 310}"#);
        channel.push_at(Duration::from_secs(10), r#"{"emg": 999}"#);

        let stop_clock = clock.clone();
        let report = monitor().run_until(&mut channel, &clock, move || {
            stop_clock.now() >= Duration::from_secs(1)
        });

        assert_eq!(report.stopped_by, StopReason::Interrupted);
        assert_eq!(report.stats.readings, 2);
        assert_eq!(report.stats.text, 1);
        assert_eq!(report.samples.emg_values().collect::<Vec<_>>(), vec![300, 310]);
        assert_eq!(report.samples.timestamps().next(), Some(0.02));
        assert_eq!(channel.pending(), 1);
    }

    #[test]
    fn test_run_gives_up_on_dead_port() {
        let clock = ManualClock::new();
        let mut channel = ScriptedChannel::new(clock.clone());
        channel.fail_reads();

        let report = monitor().run_until(&mut channel, &clock, || false);

        assert_eq!(report.stopped_by, StopReason::ReadFailure);
        assert_eq!(report.stats.read_errors, MAX_CONSECUTIVE_ERRORS as usize);
    }

    #[test]
    fn test_session_log_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        {
            let mut monitor = monitor().with_log_file(&path).unwrap();
            monitor.process_line("EMG Sensor Ready", Duration::ZERO);
            monitor.process_line(READING, Duration::ZERO);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().ends_with("] EMG Sensor Ready"));
    }

    #[test]
    fn test_unopenable_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("session.log");

        assert!(matches!(
            monitor().with_log_file(&path),
            Err(ProbeError::Io { .. })
        ));
    }
}
