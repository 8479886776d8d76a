//! Error types for weather-store.

use std::path::PathBuf;

/// Result type for weather-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in weather-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to write or replace an export file.
    #[error("Failed to write export {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}
