//! Logger configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::scheduler::ScheduleConfig;

/// Logger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the git working tree that holds the database, export and
    /// alert log. Relative paths elsewhere resolve under it.
    pub repo_root: PathBuf,
    /// Sampling settings.
    pub sampling: SamplingConfig,
    /// Sensor settings.
    pub sensor: SensorConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// CSV export settings.
    pub export: ExportConfig,
    /// Git sync settings.
    pub sync: SyncConfig,
    /// Alert log settings.
    pub alerts: AlertsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("~/GitRepos/weather-station"),
            sampling: SamplingConfig::default(),
            sensor: SensorConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
            sync: SyncConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Intervals, batch size and day counts are positive
    /// - The sync interval divides an hour evenly
    /// - Paths and the probe host are not empty
    ///
    /// # Example
    ///
    /// ```
    /// use weather_logger::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.repo_root.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "repo_root",
                "repository root cannot be empty",
            ));
        }
        errors.extend(self.sampling.validate());
        errors.extend(self.sensor.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.export.validate());
        errors.extend(self.sync.validate());
        errors.extend(self.alerts.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// The repository root with `~` expanded.
    pub fn repo_root(&self) -> PathBuf {
        expand_home(&self.repo_root)
    }

    /// Resolve `path` against the repository root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let path = expand_home(path);
        if path.is_absolute() {
            path
        } else {
            self.repo_root().join(path)
        }
    }

    /// Database file location.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.storage.path)
    }

    /// CSV export location.
    pub fn export_path(&self) -> PathBuf {
        self.resolve(&self.export.path)
    }

    /// Alert log location.
    pub fn alert_path(&self) -> PathBuf {
        self.resolve(&self.alerts.path)
    }

    /// Timer settings for the scheduler.
    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            sample_interval: Duration::from_secs(self.sampling.interval_secs),
            flush_interval: Duration::from_secs(self.storage.flush_interval_secs),
            batch_size: self.storage.batch_size,
            retention: time::Duration::days(i64::from(self.storage.retention_days)),
            export_window: time::Duration::days(i64::from(self.export.window_days)),
            sync_interval_minutes: self.sync.interval_minutes,
            sync_enabled: self.sync.enabled,
            repo_root: self.repo_root(),
        }
    }
}

/// Sampling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between sensor reads.
    pub interval_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl SamplingConfig {
    /// Validate sampling configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.interval_secs == 0 {
            errors.push(ValidationError::new(
                "sampling.interval_secs",
                "sample interval must be at least 1 second",
            ));
        }
        errors
    }
}

/// Sensor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// IIO device directory. Discovered under `/sys/bus/iio/devices` when unset.
    pub device: Option<PathBuf>,
}

impl SensorConfig {
    /// Validate sensor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(device) = &self.device
            && device.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "sensor.device",
                "device path cannot be empty string (omit it to discover)",
            ));
        }
        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Pending readings that trigger an early flush.
    pub batch_size: usize,
    /// Maximum seconds between flushes.
    pub flush_interval_secs: u64,
    /// Days of readings to keep.
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/weather.db"),
            batch_size: 5,
            flush_interval_secs: 300,
            retention_days: 365,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }
        if self.batch_size == 0 {
            errors.push(ValidationError::new(
                "storage.batch_size",
                "batch size must be at least 1",
            ));
        }
        if self.flush_interval_secs == 0 {
            errors.push(ValidationError::new(
                "storage.flush_interval_secs",
                "flush interval must be at least 1 second",
            ));
        }
        if self.retention_days == 0 {
            errors.push(ValidationError::new(
                "storage.retention_days",
                "retention must be at least 1 day",
            ));
        }

        errors
    }
}

/// CSV export configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Export file path.
    pub path: PathBuf,
    /// Days of readings included in the export.
    pub window_days: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("docs/data/weather-last-week.csv"),
            window_days: 7,
        }
    }
}

impl ExportConfig {
    /// Validate export configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "export.path",
                "export path cannot be empty",
            ));
        }
        if self.window_days == 0 {
            errors.push(ValidationError::new(
                "export.window_days",
                "export window must be at least 1 day",
            ));
        }
        errors
    }
}

/// Git sync configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether to commit and push on each sync slot.
    pub enabled: bool,
    /// Minutes between sync slots, aligned to the top of the hour.
    pub interval_minutes: u8,
    /// Host used for the reachability probe.
    pub probe_host: String,
    /// Port used for the reachability probe.
    pub probe_port: u16,
    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Timeout for each git command in seconds.
    pub command_timeout_secs: u64,
    /// Git executable.
    pub git_program: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            probe_host: "github.com".to_string(),
            probe_port: 443,
            probe_timeout_secs: 5,
            command_timeout_secs: 120,
            git_program: PathBuf::from("git"),
        }
    }
}

impl SyncConfig {
    /// Validate sync configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_minutes == 0 || 60 % self.interval_minutes != 0 {
            errors.push(ValidationError::new(
                "sync.interval_minutes",
                format!(
                    "sync interval {} must be a divisor of 60",
                    self.interval_minutes
                ),
            ));
        }
        if self.probe_host.trim().is_empty() {
            errors.push(ValidationError::new(
                "sync.probe_host",
                "probe host cannot be empty",
            ));
        }
        if self.probe_port == 0 {
            errors.push(ValidationError::new("sync.probe_port", "port cannot be 0"));
        }
        if self.probe_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "sync.probe_timeout_secs",
                "probe timeout must be at least 1 second",
            ));
        }
        if self.command_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "sync.command_timeout_secs",
                "command timeout must be at least 1 second",
            ));
        }
        if self.git_program.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "sync.git_program",
                "git program cannot be empty",
            ));
        }

        errors
    }

    /// Probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Per-command git timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Alert log configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Alert log path.
    pub path: PathBuf,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/ALERTS.log"),
        }
    }
}

impl AlertsConfig {
    /// Validate alert log configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "alerts.path",
                "alert log path cannot be empty",
            ));
        }
        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `storage.batch_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weather-logger")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: Result<(), ConfigError>) -> Vec<String> {
        match result {
            Err(ConfigError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.sampling.interval_secs, 60);
        assert_eq!(config.storage.batch_size, 5);
        assert_eq!(config.storage.flush_interval_secs, 300);
        assert_eq!(config.storage.retention_days, 365);
        assert_eq!(config.export.window_days, 7);
        assert_eq!(config.sync.interval_minutes, 30);
        assert_eq!(config.sync.probe_host, "github.com");
        assert_eq!(config.sync.probe_port, 443);
        assert!(config.sensor.device.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            repo_root = "/srv/station"

            [storage]
            batch_size = 10

            [sync]
            enabled = false
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/srv/station"));
        assert_eq!(config.storage.batch_size, 10);
        assert_eq!(config.storage.flush_interval_secs, 300);
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.interval_minutes, 30);
    }

    #[test]
    fn test_relative_paths_resolve_under_repo_root() {
        let config = Config {
            repo_root: PathBuf::from("/srv/station"),
            ..Default::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/srv/station/logs/weather.db"));
        assert_eq!(
            config.export_path(),
            PathBuf::from("/srv/station/docs/data/weather-last-week.csv")
        );
        assert_eq!(config.alert_path(), PathBuf::from("/srv/station/logs/ALERTS.log"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let mut config = Config {
            repo_root: PathBuf::from("/srv/station"),
            ..Default::default()
        };
        config.storage.path = PathBuf::from("/var/lib/weather.db");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/weather.db"));
    }

    #[test]
    fn test_home_expansion() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let config = Config::default();
        assert_eq!(config.repo_root(), home.join("GitRepos/weather-station"));
        assert!(config.db_path().starts_with(&home));
    }

    #[test]
    fn test_schedule_from_config() {
        let mut config = Config {
            repo_root: PathBuf::from("/srv/station"),
            ..Default::default()
        };
        config.storage.retention_days = 30;
        let schedule = config.schedule();

        assert_eq!(schedule.sample_interval, Duration::from_secs(60));
        assert_eq!(schedule.flush_interval, Duration::from_secs(300));
        assert_eq!(schedule.batch_size, 5);
        assert_eq!(schedule.retention, time::Duration::days(30));
        assert_eq!(schedule.export_window, time::Duration::days(7));
        assert_eq!(schedule.sync_interval_minutes, 30);
        assert!(schedule.sync_enabled);
        assert_eq!(schedule.repo_root, PathBuf::from("/srv/station"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.sampling.interval_secs = 0;
        config.storage.batch_size = 0;
        config.storage.flush_interval_secs = 0;
        config.storage.retention_days = 0;
        config.export.window_days = 0;

        let fields = fields(config.validate());
        assert_eq!(
            fields,
            vec![
                "sampling.interval_secs",
                "storage.batch_size",
                "storage.flush_interval_secs",
                "storage.retention_days",
                "export.window_days",
            ]
        );
    }

    #[test]
    fn test_sync_interval_must_divide_hour() {
        for ok in [1u8, 5, 15, 30, 60] {
            let mut config = Config::default();
            config.sync.interval_minutes = ok;
            assert!(config.validate().is_ok(), "{ok} should be accepted");
        }
        for bad in [0u8, 7, 25, 45, 90] {
            let mut config = Config::default();
            config.sync.interval_minutes = bad;
            assert_eq!(fields(config.validate()), vec!["sync.interval_minutes"]);
        }
    }

    #[test]
    fn test_probe_settings_validated() {
        let mut config = Config::default();
        config.sync.probe_host = "  ".to_string();
        config.sync.probe_port = 0;

        assert_eq!(
            fields(config.validate()),
            vec!["sync.probe_host", "sync.probe_port"]
        );
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = Config::default();
        config.storage.path = PathBuf::new();
        config.alerts.path = PathBuf::new();
        config.sensor.device = Some(PathBuf::new());

        assert_eq!(
            fields(config.validate()),
            vec!["sensor.device", "storage.path", "alerts.path"]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let mut config = Config::default();
        config.storage.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration validation failed:\n  - storage.batch_size: batch size must be at least 1"
        );
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "repo_root = \"/srv/station\"\n\n\
             [sensor]\ndevice = \"/sys/bus/iio/devices/iio:device0\"\n\n\
             [sync]\ninterval_minutes = 15\n",
        )
        .unwrap();

        let loaded = Config::load(&config_path).unwrap();
        loaded.validate().unwrap();

        assert_eq!(loaded.repo_root, PathBuf::from("/srv/station"));
        assert_eq!(
            loaded.sensor.device,
            Some(PathBuf::from("/sys/bus/iio/devices/iio:device0"))
        );
        assert_eq!(loaded.sync.interval_minutes, 15);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[storage\nbatch_size = 5").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_loaded_config_with_bad_interval_fails_validation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[sync]\ninterval_minutes = 7\n").unwrap();

        let config = Config::load(&config_path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("weather-logger/config.toml"));
    }
}
