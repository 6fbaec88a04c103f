//! Error taxonomy for device operations
//!
//! Operations return `anyhow::Result` at the CLI boundary; the variants here
//! are the failures the menu loop reports to the user.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// No enumerated port matched the discovery patterns
    #[error("Arduino not found. Please check connection.")]
    DeviceNotFound,

    #[error("failed to enumerate serial ports")]
    PortEnumeration(#[source] serialport::Error),

    #[error("failed to open serial port {port}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O failed: {context}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Ctrl+C during an operation that has no graceful stop of its own
    #[error("interrupted by user")]
    Interrupted,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProbeError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        ProbeError::Io { context, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found_message() {
        assert_eq!(
            ProbeError::DeviceNotFound.to_string(),
            "Arduino not found. Please check connection."
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = ProbeError::io(
            "write command",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
        );
        assert_eq!(err.to_string(), "serial I/O failed: write command");
        assert!(std::error::Error::source(&err).is_some());
    }
}
