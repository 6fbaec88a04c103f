//! Bounded rolling buffer of monitor samples

use std::collections::VecDeque;

/// Capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 100;

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the monitor started
    pub time: f64,
    pub emg: i64,
    /// Muscle activity in percent
    pub activity: f64,
}

/// Fixed-capacity FIFO of samples. Timestamps, emg values and activity
/// values are stored together, so the three series always line up.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be positive");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.time)
    }

    pub fn emg_values(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().map(|s| s.emg)
    }

    pub fn activity_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.activity)
    }

    /// (first, last) timestamp, `None` when empty
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.samples.front()?.time, self.samples.back()?.time))
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
