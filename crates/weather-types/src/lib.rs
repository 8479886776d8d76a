//! Platform-agnostic types for a BME280 weather station logger.
//!
//! This crate provides the data types shared by the store and the logger
//! service.
//!
//! # Features
//!
//! - [`SensorSample`]: a raw temperature/pressure/humidity triple
//! - [`Reading`]: a rounded, timestamped sample as persisted
//! - Timestamp codec for the store's text primary key
//! - Error types for parsing and validation
//!
//! # Example
//!
//! ```
//! use time::macros::datetime;
//! use weather_types::{Reading, SensorSample};
//!
//! let reading = Reading::from_sample(
//!     datetime!(2025-01-15 08:30:00),
//!     &SensorSample::new(4.5, 1021.0, 82.0),
//! );
//! assert_eq!(reading.key(), "2025-01-15T08:30:00");
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    Reading, SensorSample, TIMESTAMP_FORMAT, celsius_to_fahrenheit, format_timestamp,
    parse_timestamp, round2, truncate_to_second,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;

    #[test]
    fn test_fahrenheit_derived_from_rounded_celsius() {
        let reading = Reading::from_sample(
            datetime!(2025-06-01 12:00:00),
            &SensorSample::new(20.004, 1000.0, 50.0),
        );
        assert_eq!(reading.temp_c, 20.0);
        assert_eq!(reading.temp_f, 68.0);
    }

    #[test]
    fn test_negative_temperatures() {
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert_eq!(celsius_to_fahrenheit(-12.35), 9.77);
    }

    #[test]
    fn test_round2_exact_halves_go_to_even() {
        // Multiples of 1/8 are exact in binary and come off the pressure channel
        assert_eq!(round2(1013.125), 1013.12);
        assert_eq!(round2(45.125), 45.12);
        assert_eq!(round2(45.375), 45.38);
        assert_eq!(round2(-0.125), -0.12);
        assert_eq!(round2(21.456), 21.46);
    }

    #[test]
    fn test_reading_rounds_halves_to_even() {
        let reading = Reading::from_sample(
            datetime!(2025-06-01 12:00:00),
            &SensorSample::new(20.0, 1013.125, 45.125),
        );
        assert_eq!(reading.pressure_hpa, 1013.12);
        assert_eq!(reading.humidity_pct, 45.12);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = datetime!(2024-02-29 23:59:59);
        let text = format_timestamp(ts);
        assert_eq!(text, "2024-02-29T23:59:59");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_reading_drops_subseconds() {
        let reading = Reading::from_sample(
            datetime!(2025-06-01 12:00:05.999),
            &SensorSample::new(1.0, 2.0, 3.0),
        );
        assert_eq!(reading.timestamp, datetime!(2025-06-01 12:00:05));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }));
        assert!(parse_timestamp("2025-06-01 12:00:00").is_err());
    }

    #[test]
    fn test_sample_validate() {
        assert!(SensorSample::new(21.0, 1013.0, 40.0).validate().is_ok());
        let err = SensorSample::new(21.0, f64::NAN, 40.0).validate().unwrap_err();
        assert!(matches!(err, ParseError::NonFinite { field: "pressure" }));
        assert!(
            SensorSample::new(f64::INFINITY, 1013.0, 40.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_reading_display() {
        let reading = Reading::from_sample(
            datetime!(2025-06-01 12:00:00),
            &SensorSample::new(21.5, 1013.25, 45.0),
        );
        assert_eq!(
            reading.to_string(),
            "2025-06-01T12:00:00 21.50°C (70.70°F) 1013.25 hPa 45.00%"
        );
    }

    #[test]
    fn test_reading_serde_uses_key_format() {
        let reading = Reading::from_sample(
            datetime!(2025-06-01 12:00:00),
            &SensorSample::new(21.5, 1013.25, 45.0),
        );
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"timestamp\":\"2025-06-01T12:00:00\""));
    }

    #[test]
    fn test_timestamps_sort_chronologically_as_text() {
        let earlier = format_timestamp(datetime!(2025-09-30 23:59:59));
        let later = format_timestamp(datetime!(2025-10-01 00:00:00));
        assert!(earlier < later);
    }

    proptest! {
        #[test]
        fn prop_rounding_has_two_decimals(c in -60.0f64..85.0, p in 300.0f64..1100.0, h in 0.0f64..100.0) {
            let reading = Reading::from_sample(datetime!(2025-01-01 00:00:00), &SensorSample::new(c, p, h));
            for value in [reading.temp_c, reading.temp_f, reading.pressure_hpa, reading.humidity_pct] {
                prop_assert!((value * 100.0 - (value * 100.0).round()).abs() < 1e-6);
            }
            prop_assert!((reading.temp_c - c).abs() <= 0.005 + 1e-9);
            prop_assert_eq!(reading.temp_f, round2(reading.temp_c * 1.8 + 32.0));
        }
    }
}
