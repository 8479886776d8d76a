//! Error types for data parsing in weather-types.

use thiserror::Error;

/// Errors that can occur when parsing or validating weather data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A timestamp did not match `YYYY-MM-DDTHH:MM:SS`.
    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: time::error::Parse,
    },

    /// A numeric field could not be parsed.
    #[error("Invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// A numeric field was NaN or infinite.
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
}

/// Result type alias using weather-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
