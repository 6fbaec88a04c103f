//! EMG Probe
//!
//! Bench diagnostic tool for a serial EMG sensor board (Arduino class). The
//! board streams one JSON reading per line and accepts `STATUS`, `CALIBRATE`
//! and `THRESHOLD=<n>` commands.
//!
//! # Features
//!
//! - **Connection test**: send `STATUS` and print the board's answer
//! - **Live monitor**: decode the reading stream until Ctrl+C, then chart the
//!   last samples to PNG (requires the default `plot` feature)
//! - **Calibration**: guided rest/contraction routine that writes the
//!   activation threshold to the board
//!
//! # Usage
//!
//! ```bash
//! # Interactive menu
//! emg-probe
//!
//! # List serial ports and show which one would be picked
//! emg-probe ports
//!
//! # Monitor a specific port at a non-default baud rate
//! emg-probe -p /dev/ttyACM0 -b 115200 monitor
//!
//! # Print the effective configuration
//! emg-probe -c bench.toml config
//! ```

mod app;
mod calibrate;
mod config;
mod device;
mod error;
mod interrupt;
mod plot;
mod samples;
mod serial;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use app::{App, Operation};
use config::ProbeConfig;

/// EMG Probe
///
/// Connectivity check, live monitor and threshold calibration for serial EMG sensors
#[derive(Parser)]
#[command(name = "emg-probe")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Bench diagnostic tool for serial EMG sensor boards")]
#[command(propagate_version = true)]
struct Cli {
    /// Operation to run (interactive menu when omitted)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ./emg-probe.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial port path, skips auto-detection (e.g., /dev/ttyACM0)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Send STATUS and print the response
    Test,

    /// Stream readings until Ctrl+C, then plot them
    Monitor,

    /// Run the guided threshold calibration
    Calibrate,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Ports) => {
            if let Err(e) = serial::port::print_ports(&config.serial.match_patterns) {
                eprintln!("{} {}", "[ERROR]".red().bold(), e);
            }
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }

        Some(Commands::Test) => run_one(config, Operation::TestConnection)?,
        Some(Commands::Monitor) => run_one(config, Operation::Monitor)?,
        Some(Commands::Calibrate) => run_one(config, Operation::Calibrate)?,

        None => {
            let app = start(config)?;
            // The menu and every prompt it leads to read through this one lock
            app.run_menu(std::io::stdin().lock())?;
        }
    }

    Ok(())
}

/// Configuration file (if any) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<ProbeConfig> {
    let mut config = ProbeConfig::discover(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(ref port) = cli.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }

    config.validate().context("Invalid configuration")?;
    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn run_one(config: ProbeConfig, operation: Operation) -> Result<()> {
    let app = start(config)?;
    app.run(operation, &mut std::io::stdin().lock());
    Ok(())
}

fn start(config: ProbeConfig) -> Result<App> {
    let app = App::new(config);
    app.install_interrupt()?;
    Ok(app)
}
