//! Sampling, persistence, retention, export and sync loop for a BME280
//! weather station.
//!
//! This crate provides a long-running logger that:
//! - Samples temperature, pressure and humidity once a minute
//! - Buffers readings and commits them to SQLite in small atomic batches
//! - Purges readings older than the retention period once a day
//! - Exports the last week of readings to CSV every half hour
//! - Commits and pushes the working tree to git when the network is up
//! - Records every notable event in an append-only alert log
//!
//! # Configuration
//!
//! The logger reads configuration from
//! `~/.config/weather-logger/config.toml`:
//!
//! ```toml
//! repo_root = "~/GitRepos/weather-station"
//!
//! [storage]
//! path = "logs/weather.db"
//! batch_size = 5
//! flush_interval_secs = 300
//! retention_days = 365
//!
//! [export]
//! path = "docs/data/weather-last-week.csv"
//!
//! [sync]
//! interval_minutes = 30
//! probe_host = "github.com"
//! probe_port = 443
//! ```
//!
//! Relative paths resolve under `repo_root`.
//!
//! # Example
//!
//! Driving a scheduler by hand with a mock sensor:
//!
//! ```no_run
//! use std::time::{Duration, Instant};
//!
//! use time::macros::datetime;
//! use weather_logger::{
//!     AlertLog, GitCli, LocalClock, MockSensor, Now, ScheduleConfig, Scheduler, Synchronizer,
//!     TcpProbe,
//! };
//! use weather_store::{CsvExporter, Store};
//!
//! # async fn example() -> weather_logger::Result<()> {
//! let clock = LocalClock::with_offset(time::UtcOffset::UTC);
//! let started = Instant::now();
//! let mut scheduler = Scheduler::new(
//!     ScheduleConfig::default(),
//!     Store::open_in_memory()?,
//!     MockSensor::new(),
//!     CsvExporter::new("weather.csv"),
//!     Synchronizer::new(
//!         TcpProbe::new("github.com", 443, Duration::from_secs(5)),
//!         GitCli::new("git", Duration::from_secs(120)),
//!     ),
//!     AlertLog::open("ALERTS.log", clock)?,
//!     started,
//! );
//!
//! let now = Now::new(datetime!(2025-06-01 12:01:00), started + Duration::from_secs(60));
//! let report = scheduler.tick(&now).await?;
//! assert!(report.sampled);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod alert;
pub mod clock;
pub mod config;
pub mod error;
pub mod mock;
pub mod scheduler;
pub mod sensor;
pub mod sync;

pub use alert::AlertLog;
pub use clock::{LocalClock, Now};
pub use config::{
    AlertsConfig, Config, ConfigError, ExportConfig, SamplingConfig, SensorConfig, StorageConfig,
    SyncConfig, ValidationError, default_config_path,
};
pub use error::{Error, Result};
pub use mock::MockSensor;
pub use scheduler::{ScheduleConfig, Scheduler, SyncSlot, TICK_INTERVAL, TickReport};
pub use sensor::{IIO_DEVICES_DIR, IioSensor, SampleSource, SensorError};
pub use sync::{
    Connectivity, GitCli, GitStep, SyncError, SyncOutcome, Synchronizer, TcpProbe, VersionControl,
    commit_message,
};
