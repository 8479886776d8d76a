//! Append-only, human-readable event log.
//!
//! Every notable outcome of the logger (start, stop, sensor faults, purges,
//! exports, syncs) becomes one line `<timestamp> <message>` in the alert file
//! and is mirrored to stdout as `[ALERT] <message>`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use time::PrimitiveDateTime;

use weather_types::format_timestamp;

use crate::clock::LocalClock;
use crate::error::{Error, Result};

/// Append-only alert log.
///
/// The file is reopened for every entry so external rotation is picked up.
/// A failed append is returned as [`Error::Alert`]; there is no lower
/// channel to report it to, so callers treat it as fatal.
#[derive(Debug)]
pub struct AlertLog {
    path: PathBuf,
    clock: LocalClock,
    echo: bool,
}

impl AlertLog {
    /// Open (creating if needed) the alert log at `path`.
    ///
    /// Fails if the file cannot be created, so a misconfigured path is
    /// caught at start-up rather than on the first alert.
    pub fn open<P: Into<PathBuf>>(path: P, clock: LocalClock) -> Result<Self> {
        let path = path.into();
        let alert_err = |source| Error::Alert {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(alert_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(alert_err)?;

        Ok(Self {
            path,
            clock,
            echo: true,
        })
    }

    /// Stop mirroring entries to stdout.
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `message` stamped with the current local time.
    pub fn record(&self, message: &str) -> Result<()> {
        self.record_at(self.clock.wall(), message)
    }

    /// Record `message` stamped with `at`.
    pub fn record_at(&self, at: PrimitiveDateTime, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.error(source))?;
        writeln!(file, "{} {}", format_timestamp(at), message).map_err(|source| self.error(source))?;

        if self.echo {
            println!("[ALERT] {message}");
        }
        Ok(())
    }

    fn error(&self, source: std::io::Error) -> Error {
        Error::Alert {
            path: self.path.clone(),
            source,
        }
    }
}
