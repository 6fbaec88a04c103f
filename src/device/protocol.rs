//! Host to device commands

use std::fmt;

/// Commands understood by the sensor firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Ask the firmware to print its status lines
    Status,
    /// Capture the resting baseline
    Calibrate,
    /// Set the activation threshold
    Threshold(i64),
}

impl DeviceCommand {
    /// The command as sent on the wire, including the line terminator
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::Status => write!(f, "STATUS"),
            DeviceCommand::Calibrate => write!(f, "CALIBRATE"),
            DeviceCommand::Threshold(value) => write!(f, "THRESHOLD={}", value),
        }
    }
}
