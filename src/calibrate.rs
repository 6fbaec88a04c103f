//! Guided two-phase threshold calibration
//!
//! Rest: the user relaxes while the board captures its baseline on
//! `CALIBRATE`; the whole exchange window is waited out.
//! Contraction: the user contracts hard for a fixed window while the peak
//! raw value is tracked. Half the peak becomes the activation threshold.

use crate::config::CalibrationSettings;
use crate::device::{parse_measurement, DeviceCommand};
use crate::error::ProbeError;
use crate::interrupt::Interrupt;
use crate::serial::channel::{exchange, Clock, ExchangePolicy, LineChannel};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Blocks until the user confirms they are ready
pub trait Acknowledge {
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()>;
}

/// Prompt on stdout, wait for one line from `input`. The line's content is
/// ignored.
///
/// Takes the caller's reader so the interactive menu and the wizard share a
/// single handle on stdin.
pub struct ReaderAcknowledge<R> {
    input: R,
}

impl<R: BufRead> ReaderAcknowledge<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> Acknowledge for ReaderAcknowledge<R> {
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()> {
        print!("{} ", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for confirmation",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    AwaitingRestAck,
    /// Device capturing the resting baseline
    Calibrating,
    AwaitingContractAck,
    /// Time-boxed peak tracking
    Measuring,
    ThresholdSent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationResult {
    /// Peak raw value seen while contracting, 0 if nothing arrived
    pub max_emg: i64,
    pub threshold: i64,
    /// Readings decoded during the contraction window
    pub readings: usize,
}

/// Threshold for a contraction peak: half of it, rounded down
pub fn recommended_threshold(max_emg: i64) -> i64 {
    max_emg.div_euclid(2)
}

pub struct CalibrationWizard<'a, K: Clock + ?Sized> {
    clock: &'a K,
    interrupt: &'a Interrupt,
    exchange: ExchangePolicy,
    measure_window: Duration,
    poll_interval: Duration,
    phase: CalibrationPhase,
}

impl<'a, K: Clock + ?Sized> CalibrationWizard<'a, K> {
    pub fn new(
        clock: &'a K,
        interrupt: &'a Interrupt,
        exchange: ExchangePolicy,
        settings: &CalibrationSettings,
    ) -> Self {
        Self {
            clock,
            interrupt,
            exchange: exchange.full_window(),
            measure_window: Duration::from_millis(settings.measure_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            phase: CalibrationPhase::Idle,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    fn enter(&mut self, phase: CalibrationPhase) {
        log::debug!("Calibration: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn check_interrupt(&self) -> Result<(), ProbeError> {
        if self.interrupt.is_set() {
            Err(ProbeError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Run both phases and write the derived threshold to the device.
    ///
    /// A silent device is not an error: the peak stays 0 and `THRESHOLD=0`
    /// is sent. Interruption aborts before anything further is sent.
    pub fn run<C, A>(&mut self, channel: &mut C, ack: &mut A) -> Result<CalibrationResult, ProbeError>
    where
        C: LineChannel + ?Sized,
        A: Acknowledge + ?Sized,
    {
        println!("{}", "Starting calibration...".cyan().bold());
        println!("1. Relax your muscle completely");
        self.enter(CalibrationPhase::AwaitingRestAck);
        ack.acknowledge("Press Enter when ready...")
            .map_err(|e| ProbeError::io("read confirmation", e))?;
        self.check_interrupt()?;

        self.enter(CalibrationPhase::Calibrating);
        let baseline_lines = exchange(
            channel,
            self.clock,
            DeviceCommand::Calibrate,
            &self.exchange,
            |line| println!("{} {}", "Calibration:".cyan(), line),
        )
        .map_err(|e| ProbeError::io("baseline capture", e))?;
        log::debug!("Baseline phase produced {} line(s)", baseline_lines);
        self.check_interrupt()?;

        println!("\n2. Now contract your muscle strongly");
        self.enter(CalibrationPhase::AwaitingContractAck);
        ack.acknowledge("Press Enter to test activation...")
            .map_err(|e| ProbeError::io("read confirmation", e))?;
        self.check_interrupt()?;

        self.enter(CalibrationPhase::Measuring);
        println!(
            "Monitoring activation for {} seconds...",
            self.measure_window.as_secs_f64()
        );
        let (max_emg, readings) = self.measure_peak(channel)?;

        let threshold = recommended_threshold(max_emg);
        println!("\n{}", "Calibration complete!".green().bold());
        println!("Maximum EMG value detected: {}", max_emg);
        println!("Recommended threshold: {}", threshold);

        let command = DeviceCommand::Threshold(threshold);
        channel
            .send_command(command)
            .map_err(|e| ProbeError::io("send threshold", e))?;
        println!("{} {}", "[TX]".cyan().bold(), command);
        self.enter(CalibrationPhase::ThresholdSent);

        Ok(CalibrationResult {
            max_emg,
            threshold,
            readings,
        })
    }

    /// Track the largest `emg` for one measurement window. Lines that fail to
    /// decode are skipped without a word.
    fn measure_peak<C>(&self, channel: &mut C) -> Result<(i64, usize), ProbeError>
    where
        C: LineChannel + ?Sized,
    {
        let started = self.clock.now();
        let mut max_emg = 0i64;
        let mut readings = 0usize;

        while self.clock.now().saturating_sub(started) < self.measure_window {
            self.check_interrupt()?;

            if channel.has_input().map_err(|e| ProbeError::io("poll device", e))? {
                let line = channel
                    .read_line()
                    .map_err(|e| ProbeError::io("read measurement", e))?;
                if let Some(reading) = line.as_deref().and_then(parse_measurement) {
                    readings += 1;
                    max_emg = max_emg.max(reading.emg);
                    println!("EMG: {}, Max: {}", reading.emg, max_emg);
                }
            }
            self.clock.sleep(self.poll_interval);
        }

        Ok((max_emg, readings))
    }
}
