//! Local data persistence for weather station readings.
//!
//! This crate provides SQLite-based storage for sensor readings and a CSV
//! exporter for publishing a recent window of them.
//!
//! # Features
//!
//! - Idempotent, atomic batch inserts keyed by timestamp
//! - Range queries with a fluent [`ReadingQuery`] builder
//! - Retention deletes of everything older than a cutoff
//! - Whole-file CSV export via write-then-rename
//!
//! # Example
//!
//! ```no_run
//! use time::macros::datetime;
//! use weather_store::{CsvExporter, Store};
//!
//! let mut store = Store::open("logs/weather.db")?;
//! store.delete_before(datetime!(2024-06-01 00:00:00))?;
//!
//! let exporter = CsvExporter::new("docs/data/weather-last-week.csv");
//! exporter.export_window(&store, datetime!(2025-05-25 00:00:00))?;
//! # Ok::<(), weather_store::Error>(())
//! ```

mod error;
mod export;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use export::{CsvExporter, ExportOutcome};
pub use queries::ReadingQuery;
pub use schema::SCHEMA_VERSION;
pub use store::Store;
