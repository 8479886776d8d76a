//! CSV export of a time window of readings.
//!
//! The export file is always replaced whole: rows are written to a hidden
//! temporary file next to the destination, synced, then renamed over it.
//! A reader of the destination therefore sees either the previous export or
//! the new one, never a truncated file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::PrimitiveDateTime;
use tracing::{debug, info};

use weather_types::Reading;

use crate::error::{Error, Result};
use crate::store::Store;

/// Result of an export attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The destination was replaced with `rows` readings.
    Written { rows: usize, path: PathBuf },
    /// The window held no readings; the destination was left untouched.
    NoData,
}

/// Column layout of the export file.
#[derive(Serialize)]
struct CsvRow {
    timestamp: String,
    temp_c: f64,
    temp_f: f64,
    pressure_hpa: f64,
    humidity: f64,
}

impl From<&Reading> for CsvRow {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.key(),
            temp_c: reading.temp_c,
            temp_f: reading.temp_f,
            pressure_hpa: reading.pressure_hpa,
            humidity: reading.humidity_pct,
        }
    }
}

/// Writes a window of stored readings to a fixed CSV path.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    /// Create an exporter targeting `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Export every reading at or after `since`, oldest first.
    ///
    /// Re-running with the same `since` against an unchanged store produces
    /// byte-identical output.
    pub fn export_window(&self, store: &Store, since: PrimitiveDateTime) -> Result<ExportOutcome> {
        let readings = store.readings_since(since)?;

        if readings.is_empty() {
            debug!("No readings since {}, export skipped", since);
            return Ok(ExportOutcome::NoData);
        }

        self.write_replacing(&readings)?;

        info!(
            "Exported {} readings to {}",
            readings.len(),
            self.path.display()
        );
        Ok(ExportOutcome::Written {
            rows: readings.len(),
            path: self.path.clone(),
        })
    }

    fn write_replacing(&self, readings: &[Reading]) -> Result<()> {
        let export_err = |source| Error::Export {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(export_err)?;
        }

        let tmp_path = self.temp_path();
        let result = write_csv(&tmp_path, readings).and_then(|()| {
            fs::rename(&tmp_path, &self.path).map_err(export_err)
        });

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export.csv".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

fn write_csv(path: &Path, readings: &[Reading]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for reading in readings {
        writer.serialize(CsvRow::from(reading))?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| Error::Export {
            path: path.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(|source| Error::Export {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
