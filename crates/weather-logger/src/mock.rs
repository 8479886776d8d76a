//! Mock sensor implementation for testing.
//!
//! [`MockSensor`] implements [`SampleSource`] without hardware, for unit
//! tests and for dry runs of the logger (`weather-logger run --mock-sensor`).
//!
//! # Features
//!
//! - **Failure injection**: fail the next N reads, or every read
//! - **Drift**: advance temperature a little on every read so successive
//!   readings differ
//! - **Read counting**: observe how often the scheduler sampled

use weather_types::SensorSample;

use crate::sensor::{SampleSource, SensorError};

/// A mock weather sensor.
///
/// # Example
///
/// ```
/// use weather_logger::{MockSensor, SampleSource};
///
/// let mut sensor = MockSensor::new();
/// sensor.fail_next(1);
/// assert!(sensor.read_sample().is_err());
/// assert!(sensor.read_sample().is_ok());
/// assert_eq!(sensor.read_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockSensor {
    sample: SensorSample,
    drift_c: f64,
    read_count: u32,
    remaining_failures: u32,
    should_fail: bool,
    fail_message: String,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSensor {
    /// Create a mock sensor returning a mild indoor reading.
    pub fn new() -> Self {
        Self::with_sample(SensorSample::new(21.5, 1013.25, 45.0))
    }

    /// Create a mock sensor returning `sample`.
    pub fn with_sample(sample: SensorSample) -> Self {
        Self {
            sample,
            drift_c: 0.0,
            read_count: 0,
            remaining_failures: 0,
            should_fail: false,
            fail_message: "Mock failure".to_string(),
        }
    }

    /// Add `drift_c` degrees to the temperature after every successful read.
    pub fn with_drift(mut self, drift_c: f64) -> Self {
        self.drift_c = drift_c;
        self
    }

    /// Replace the sample returned by subsequent reads.
    pub fn set_sample(&mut self, sample: SensorSample) {
        self.sample = sample;
    }

    /// Fail the next `count` reads, then succeed again.
    pub fn fail_next(&mut self, count: u32) {
        self.remaining_failures = count;
    }

    /// Fail every read until cleared.
    pub fn set_should_fail(&mut self, fail: bool, message: Option<&str>) {
        self.should_fail = fail;
        if let Some(msg) = message {
            self.fail_message = msg.to_string();
        }
    }

    /// Number of read attempts so far, failed ones included.
    pub fn read_count(&self) -> u32 {
        self.read_count
    }
}

impl SampleSource for MockSensor {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        self.read_count += 1;

        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Err(SensorError::Unavailable(self.fail_message.clone()));
        }
        if self.should_fail {
            return Err(SensorError::Unavailable(self.fail_message.clone()));
        }

        let sample = self.sample;
        self.sample.temperature_c += self.drift_c;
        Ok(sample)
    }
}
