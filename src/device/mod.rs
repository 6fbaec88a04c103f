//! EMG sensor wire protocol
//!
//! The device speaks newline-terminated ASCII in both directions. The host
//! sends a handful of commands; the device answers with free-form status text
//! and streams readings as one JSON object per line.

pub mod protocol;
pub mod reading;

pub use protocol::DeviceCommand;
pub use reading::{classify_line, parse_measurement, DeviceReading, LineKind};
