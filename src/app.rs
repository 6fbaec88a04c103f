//! The three bench operations and the interactive menu that drives them

use crate::calibrate::{CalibrationWizard, ReaderAcknowledge};
use crate::config::ProbeConfig;
use crate::device::DeviceCommand;
use crate::interrupt::Interrupt;
use crate::plot;
use crate::serial::channel::{exchange, ExchangePolicy, SystemClock};
use crate::serial::monitor::{self, StopReason, StreamMonitor};
use crate::session::Session;
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TestConnection,
    Monitor,
    Calibrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Run(Operation),
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Run(Operation::TestConnection)),
            "2" => Some(MenuChoice::Run(Operation::Monitor)),
            "3" => Some(MenuChoice::Run(Operation::Calibrate)),
            "4" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

pub struct App {
    config: ProbeConfig,
    interrupt: Interrupt,
    clock: SystemClock,
}

impl App {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            interrupt: Interrupt::new(),
            clock: SystemClock::new(),
        }
    }

    /// Take over Ctrl+C so running operations can stop cleanly
    pub fn install_interrupt(&self) -> Result<()> {
        self.interrupt
            .install()
            .context("Failed to install Ctrl+C handler")
    }

    fn exchange_policy(&self) -> ExchangePolicy {
        ExchangePolicy::from(&self.config.exchange)
    }

    /// Run one operation, reporting instead of propagating its failure.
    /// Prompts read their confirmations from `input`.
    pub fn run<R: BufRead>(&self, operation: Operation, input: &mut R) {
        let result = match operation {
            Operation::TestConnection => self.test_connection(),
            Operation::Monitor => self.monitor(),
            Operation::Calibrate => self.calibrate(input),
        };

        if let Err(e) = result {
            log::debug!("{:?} failed: {:?}", operation, e);
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        }
    }

    /// Send `STATUS` and print whatever the board answers
    pub fn test_connection(&self) -> Result<()> {
        let _armed = self.interrupt.arm();
        let mut session = Session::open(&self.config.serial, &self.clock)?;

        println!("{} Sending {} command...", "[TX]".cyan().bold(), DeviceCommand::Status);
        let received = exchange(
            &mut session,
            &self.clock,
            DeviceCommand::Status,
            &self.exchange_policy(),
            |line| println!("{} {}", "Arduino:".cyan(), line),
        )
        .context("STATUS exchange failed")?;

        if received == 0 {
            println!(
                "{} No response. Check the firmware and baud rate ({}).",
                "[WARNING]".yellow().bold(),
                session.baud_rate()
            );
        }
        Ok(())
    }

    /// Stream readings until Ctrl+C, then close the port and plot
    pub fn monitor(&self) -> Result<()> {
        let _armed = self.interrupt.arm();
        let mut stream = StreamMonitor::new(&self.config.monitor);
        if let Some(ref path) = self.config.monitor.log_file {
            stream = stream.with_log_file(path)?;
        }

        let report = {
            let mut session = Session::open(&self.config.serial, &self.clock)?;
            println!(
                "{} Monitoring EMG data from {}...",
                "[*]".cyan().bold(),
                session.port().white()
            );
            monitor::print_header(session.port(), session.baud_rate());

            let report = stream.run(&mut session, &self.clock, &self.interrupt);
            println!("\n{}", "Stopping monitoring...".yellow());
            report
        };

        monitor::print_summary(&report);
        if report.stopped_by == StopReason::ReadFailure {
            eprintln!(
                "{} Lost the device; plotting what was collected",
                "[ERROR]".red().bold()
            );
        }

        if !report.samples.is_empty() {
            plot::show(&report.samples, &self.config.plot);
        }
        Ok(())
    }

    /// Walk the user through rest and contraction, then write the threshold
    pub fn calibrate<R: BufRead>(&self, input: &mut R) -> Result<()> {
        let _armed = self.interrupt.arm();
        let mut session = Session::open(&self.config.serial, &self.clock)?;

        let mut wizard = CalibrationWizard::new(
            &self.clock,
            &self.interrupt,
            self.exchange_policy(),
            &self.config.calibration,
        );
        let result = wizard.run(&mut session, &mut ReaderAcknowledge::new(input))?;

        log::info!(
            "Calibrated {}: peak {} over {} readings, threshold {}",
            session.port(),
            result.max_emg,
            result.readings,
            result.threshold
        );
        Ok(())
    }

    /// Numbered menu over `input` until `4` or end of input
    pub fn run_menu<R: BufRead>(&self, mut input: R) -> Result<()> {
        println!("{}", "EMG Sensor Test Tool".cyan().bold());
        println!("{}", "=".repeat(40));
        println!("1. Test serial connection");
        println!("2. Monitor EMG data");
        println!("3. Calibrate sensor");
        println!("4. Exit");

        loop {
            print!("\nSelect option (1-4): ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line).context("Failed to read menu choice")? == 0 {
                println!();
                break;
            }

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Run(operation)) => self.run(operation, &mut input),
                Some(MenuChoice::Exit) => break,
                None => eprintln!(
                    "{} Invalid choice. Please select 1-4.",
                    "[ERROR]".red().bold()
                ),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_menu_choices() {
        assert_eq!(
            MenuChoice::parse("1\n"),
            Some(MenuChoice::Run(Operation::TestConnection))
        );
        assert_eq!(MenuChoice::parse(" 2 "), Some(MenuChoice::Run(Operation::Monitor)));
        assert_eq!(MenuChoice::parse("3"), Some(MenuChoice::Run(Operation::Calibrate)));
        assert_eq!(MenuChoice::parse("4\r\n"), Some(MenuChoice::Exit));
    }

    #[test]
    fn test_invalid_menu_choices() {
        for input in ["", "0", "5", "one", "1 2", "exit"] {
            assert_eq!(MenuChoice::parse(input), None, "{:?}", input);
        }
    }

    #[test]
    fn test_menu_reprompts_then_exits() {
        let app = App::new(ProbeConfig::default());
        app.run_menu(Cursor::new("9\nabc\n4\n1\n")).unwrap();
    }

    #[test]
    fn test_failed_operation_returns_to_menu() {
        let mut config = ProbeConfig::default();
        config.serial.port = Some("/definitely/not/a/serial/port".to_string());
        config.serial.settle_ms = 0;
        let app = App::new(config);

        let mut input = Cursor::new("3\n4\nleftover\n");
        app.run_menu(&mut input).unwrap();

        // The menu saw `4` after the failed calibration and stopped there
        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "leftover\n");
    }

    #[test]
    fn test_menu_stops_at_end_of_input() {
        let app = App::new(ProbeConfig::default());
        app.run_menu(Cursor::new("7\n")).unwrap();
    }
}
