//! Serial communication with the sensor board
//!
//! This module provides:
//! - Port discovery and the `serialport`-backed connection
//! - The `LineChannel`/`Clock` capabilities and the bounded command exchange
//! - The live stream monitor

pub mod channel;
pub mod monitor;
pub mod port;

#[cfg(test)]
pub mod testing;
