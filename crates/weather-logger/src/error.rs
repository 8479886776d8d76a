//! Error types for weather-logger.
//!
//! Only faults that must stop the process surface as [`Error`]. Transient
//! faults inside a scheduler tick (sensor glitches, offline network, failed
//! git commands, failed flushes) are recorded in the alert log instead and
//! never reach the caller.

use std::path::PathBuf;

use crate::sensor::SensorError;

/// Result type for weather-logger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal logger errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reading store could not be opened or closed.
    #[error("Store error: {0}")]
    Store(#[from] weather_store::Error),

    /// The sensor could not be initialized.
    #[error("Sensor initialization failed: {0}")]
    Sensor(#[from] SensorError),

    /// The alert log could not be appended to.
    #[error("Failed to append to alert log {path}: {source}")]
    Alert {
        path: PathBuf,
        source: std::io::Error,
    },
}
