//! Core types for weather sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::{ParseError, ParseResult};

/// Textual form of a reading timestamp: local wall time, second precision.
///
/// The fixed-width layout sorts lexicographically in chronological order,
/// which the store relies on for range queries.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[cfg(feature = "serde")]
time::serde::format_description!(
    timestamp_serde,
    PrimitiveDateTime,
    "[year]-[month]-[day]T[hour]:[minute]:[second]"
);

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS`, dropping any sub-second part.
///
/// # Examples
///
/// ```
/// use time::macros::datetime;
/// use weather_types::format_timestamp;
///
/// assert_eq!(format_timestamp(datetime!(2025-03-07 09:05:01.250)), "2025-03-07T09:05:01");
/// ```
#[must_use]
pub fn format_timestamp(timestamp: PrimitiveDateTime) -> String {
    // A PrimitiveDateTime carries every component the format asks for
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| truncate_to_second(timestamp).to_string())
}

/// Parse a timestamp previously produced by [`format_timestamp`].
pub fn parse_timestamp(value: &str) -> ParseResult<PrimitiveDateTime> {
    PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT).map_err(|source| {
        ParseError::InvalidTimestamp {
            value: value.to_string(),
            source,
        }
    })
}

/// Drop the sub-second part of a timestamp.
#[must_use]
pub fn truncate_to_second(timestamp: PrimitiveDateTime) -> PrimitiveDateTime {
    timestamp.replace_nanosecond(0).unwrap_or(timestamp)
}

/// Round to two decimal places, ties to even.
///
/// # Examples
///
/// ```
/// use weather_types::round2;
///
/// assert_eq!(round2(1013.125), 1013.12);
/// assert_eq!(round2(1013.375), 1013.38);
/// ```
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Convert Celsius to Fahrenheit, rounded to two decimal places.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round2(celsius * 1.8 + 32.0)
}

/// One raw measurement as produced by the sensor, before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorSample {
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Barometric pressure in hPa.
    pub pressure_hpa: f64,
    /// Relative humidity in percent.
    pub humidity_pct: f64,
}

impl SensorSample {
    /// Create a sample from raw values.
    pub fn new(temperature_c: f64, pressure_hpa: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            pressure_hpa,
            humidity_pct,
        }
    }

    /// Reject samples carrying NaN or infinite values.
    ///
    /// A driver glitch can surface as a non-finite number; such a sample must
    /// be treated as a read fault rather than persisted.
    pub fn validate(&self) -> ParseResult<()> {
        for (field, value) in [
            ("temperature", self.temperature_c),
            ("pressure", self.pressure_hpa),
            ("humidity", self.humidity_pct),
        ] {
            if !value.is_finite() {
                return Err(ParseError::NonFinite { field });
            }
        }
        Ok(())
    }
}

/// A persisted weather reading.
///
/// All measurements are rounded to two decimal places. `temp_f` is derived
/// from the rounded `temp_c`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// When the sample was taken (local wall time, whole seconds). Unique.
    #[cfg_attr(feature = "serde", serde(with = "timestamp_serde"))]
    pub timestamp: PrimitiveDateTime,
    /// Temperature in degrees Celsius.
    pub temp_c: f64,
    /// Temperature in degrees Fahrenheit.
    pub temp_f: f64,
    /// Barometric pressure in hPa.
    pub pressure_hpa: f64,
    /// Relative humidity in percent.
    pub humidity_pct: f64,
}

impl Reading {
    /// Build a reading from a raw sample taken at `timestamp`.
    ///
    /// # Examples
    ///
    /// ```
    /// use time::macros::datetime;
    /// use weather_types::{Reading, SensorSample};
    ///
    /// let sample = SensorSample::new(21.456, 1013.254, 45.123);
    /// let reading = Reading::from_sample(datetime!(2025-06-01 12:00:00), &sample);
    /// assert_eq!(reading.temp_c, 21.46);
    /// assert_eq!(reading.temp_f, 70.63);
    /// assert_eq!(reading.pressure_hpa, 1013.25);
    /// assert_eq!(reading.humidity_pct, 45.12);
    /// ```
    #[must_use]
    pub fn from_sample(timestamp: PrimitiveDateTime, sample: &SensorSample) -> Self {
        let temp_c = round2(sample.temperature_c);
        Self {
            timestamp: truncate_to_second(timestamp),
            temp_c,
            temp_f: celsius_to_fahrenheit(temp_c),
            pressure_hpa: round2(sample.pressure_hpa),
            humidity_pct: round2(sample.humidity_pct),
        }
    }

    /// The primary key under which this reading is stored.
    #[must_use]
    pub fn key(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2}°C ({:.2}°F) {:.2} hPa {:.2}%",
            self.key(),
            self.temp_c,
            self.temp_f,
            self.pressure_hpa,
            self.humidity_pct
        )
    }
}
