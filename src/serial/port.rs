//! Serial port discovery and connection management
//!
//! Finds the sensor board among the enumerated ports and wraps an open
//! `serialport` handle as a line-oriented channel.

use crate::config::SerialSettings;
use crate::error::ProbeError;
use crate::serial::channel::LineChannel;
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Description reported for ports that carry no USB strings
pub const NO_DESCRIPTION: &str = "n/a";

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyACM0, COM3)
    pub port_path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::new(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with the sensor board's 8N1 defaults
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Configuration for `port_path` using the baud rate and timeout from settings
    pub fn from_settings(port_path: &str, settings: &SerialSettings) -> Self {
        Self::new(port_path)
            .with_baud_rate(settings.baud_rate)
            .with_timeout(settings.timeout())
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial port speaking newline-terminated ASCII.
///
/// The port is closed when the connection is dropped.
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    pub fn open(config: PortConfig) -> Result<Self, ProbeError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|source| ProbeError::Open {
                port: config.port_path.clone(),
                source,
            })?;

        Ok(Self { port, config })
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

impl LineChannel for SerialConnection {
    fn has_input(&mut self) -> io::Result<bool> {
        Ok(self.port.bytes_to_read().map_err(io::Error::from)? > 0)
    }

    /// Read up to the next newline. A read timeout ends the line early; an
    /// empty timeout yields `None`.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buffer = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    buffer.push(byte[0]);
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if buffer.is_empty() {
            return Ok(None);
        }
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }

        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.port.write_all(b"\n")?;
        }
        self.port.flush()
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

impl PortInfo {
    /// Human-readable description: the USB product string, else the
    /// manufacturer, else `n/a`.
    pub fn description(&self) -> &str {
        self.product
            .as_deref()
            .or(self.manufacturer.as_deref())
            .unwrap_or(NO_DESCRIPTION)
    }

    /// True when the description contains any of `patterns` (case-sensitive)
    pub fn matches_any(&self, patterns: &[String]) -> bool {
        let description = self.description();
        patterns.iter().any(|p| description.contains(p.as_str()))
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(port: serialport::SerialPortInfo) -> Self {
        let mut info = PortInfo {
            path: port.port_name,
            port_type: PortType::Unknown,
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        };

        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                info.port_type = PortType::UsbSerial;
                info.manufacturer = usb.manufacturer;
                info.product = usb.product;
                info.serial_number = usb.serial_number;
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
            }
            serialport::SerialPortType::PciPort => info.port_type = PortType::PciSerial,
            serialport::SerialPortType::BluetoothPort => info.port_type = PortType::Bluetooth,
            serialport::SerialPortType::Unknown => {}
        }

        info
    }
}

/// List all available serial ports in enumeration order
pub fn list_ports() -> Result<Vec<PortInfo>, ProbeError> {
    let ports = serialport::available_ports().map_err(ProbeError::PortEnumeration)?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// First port, in enumeration order, whose description matches a pattern
pub fn find_device_port<'a>(ports: &'a [PortInfo], patterns: &[String]) -> Option<&'a PortInfo> {
    ports.iter().find(|p| p.matches_any(patterns))
}

/// Enumerate the system ports and pick the sensor board
pub fn locate_device_port(patterns: &[String]) -> Result<PortInfo, ProbeError> {
    let ports = list_ports()?;
    log::debug!("Enumerated {} serial port(s)", ports.len());

    match find_device_port(&ports, patterns) {
        Some(port) => {
            log::info!("Found device on {} ({})", port.path, port.description());
            Ok(port.clone())
        }
        None => Err(ProbeError::DeviceNotFound),
    }
}

/// Print formatted list of available serial ports, marking the one
/// discovery would choose
pub fn print_ports(patterns: &[String]) -> Result<(), ProbeError> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the sensor board over USB");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    let chosen = find_device_port(&ports, patterns).map(|p| p.path.clone());

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in &ports {
        let marker = if chosen.as_deref() == Some(port.path.as_str()) {
            " [selected]".green().bold().to_string()
        } else {
            String::new()
        };
        println!("\n{}: {}{}", "Port".cyan(), port.path.white().bold(), marker);
        println!("  Type: {}", port.port_type);
        println!("  Description: {}", port.description());

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref sn) = port.serial_number {
            println!("  Serial: {}", sn);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    if chosen.is_none() {
        println!(
            "{}",
            format!("No port matches {:?}; pass --port to choose one", patterns).yellow()
        );
    }

    Ok(())
}
