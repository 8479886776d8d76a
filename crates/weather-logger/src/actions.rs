//! Housekeeping actions shared by the scheduler and the one-shot CLI commands.
//!
//! Each action converts its own failure into an alert-log entry. The only
//! error returned is a failed alert append.

use std::path::Path;

use time::PrimitiveDateTime;
use tracing::{info, warn};

use weather_store::{CsvExporter, ExportOutcome, Store};

use crate::alert::AlertLog;
use crate::error::Result;
use crate::sync::{Connectivity, SyncOutcome, Synchronizer, VersionControl, commit_message};

/// Delete readings older than `retention` before `at`.
///
/// Returns the number of rows removed, or `None` if the delete failed.
pub fn purge_expired(
    store: &mut Store,
    alerts: &AlertLog,
    at: PrimitiveDateTime,
    retention: time::Duration,
) -> Result<Option<usize>> {
    let cutoff = at.saturating_sub(retention);
    match store.delete_before(cutoff) {
        Ok(deleted) => {
            info!("Purged {} readings older than {}", deleted, cutoff);
            alerts.record_at(at, "[DB] Old data purged")?;
            Ok(Some(deleted))
        }
        Err(e) => {
            warn!("Purge failed: {}", e);
            alerts.record_at(at, &format!("[DB ERROR] purge failed: {e}"))?;
            Ok(None)
        }
    }
}

/// Export the last `window` of readings before `at`.
///
/// Returns the number of rows written (`0` when the window was empty and
/// the file was left alone), or `None` if the export failed.
pub fn export_recent(
    store: &Store,
    exporter: &CsvExporter,
    alerts: &AlertLog,
    at: PrimitiveDateTime,
    window: time::Duration,
) -> Result<Option<usize>> {
    let since = at.saturating_sub(window);
    match exporter.export_window(store, since) {
        Ok(ExportOutcome::Written { rows, .. }) => {
            alerts.record_at(at, &format!("[CSV WEEKLY] Updated ({rows} rows)"))?;
            Ok(Some(rows))
        }
        Ok(ExportOutcome::NoData) => {
            alerts.record_at(at, "[CSV WEEKLY] No data found")?;
            Ok(Some(0))
        }
        Err(e) => {
            warn!("Export to {} failed: {}", exporter.path().display(), e);
            alerts.record_at(at, &format!("[CSV WEEKLY ERROR] {e}"))?;
            Ok(None)
        }
    }
}

/// Commit and push `repo_root` if online, recording the outcome.
pub async fn publish<P, V>(
    synchronizer: &Synchronizer<P, V>,
    alerts: &AlertLog,
    repo_root: &Path,
    at: PrimitiveDateTime,
) -> Result<SyncOutcome>
where
    P: Connectivity,
    V: VersionControl,
{
    let outcome = synchronizer
        .sync_if_online(repo_root, &commit_message(at))
        .await;
    alerts.record_at(at, &outcome.alert_message())?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use time::UtcOffset;
    use time::macros::datetime;
    use weather_types::{Reading, SensorSample};

    use crate::clock::LocalClock;

    fn alert_log(dir: &Path) -> AlertLog {
        AlertLog::open(dir.join("ALERTS.log"), LocalClock::with_offset(UtcOffset::UTC))
            .unwrap()
            .without_echo()
    }

    fn reading(at: PrimitiveDateTime) -> Reading {
        Reading::from_sample(at, &SensorSample::new(20.0, 1010.0, 50.0))
    }

    #[test]
    fn test_purge_records_even_when_nothing_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = alert_log(dir.path());
        let mut store = Store::open_in_memory().unwrap();

        let deleted = purge_expired(
            &mut store,
            &alerts,
            datetime!(2025-06-01 00:00:00),
            time::Duration::days(365),
        )
        .unwrap();

        assert_eq!(deleted, Some(0));
        let log = fs::read_to_string(alerts.path()).unwrap();
        assert_eq!(log, "2025-06-01T00:00:00 [DB] Old data purged\n");
    }

    #[test]
    fn test_export_empty_window_records_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = alert_log(dir.path());
        let store = Store::open_in_memory().unwrap();
        let exporter = CsvExporter::new(dir.path().join("out.csv"));

        let rows = export_recent(
            &store,
            &exporter,
            &alerts,
            datetime!(2025-06-01 12:00:00),
            time::Duration::days(7),
        )
        .unwrap();

        assert_eq!(rows, Some(0));
        assert!(!exporter.path().exists());
        let log = fs::read_to_string(alerts.path()).unwrap();
        assert!(log.ends_with(" [CSV WEEKLY] No data found\n"));
    }

    #[test]
    fn test_export_window_excludes_older_rows() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = alert_log(dir.path());
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_batch(&[
                reading(datetime!(2025-05-20 12:00:00)),
                reading(datetime!(2025-05-30 12:00:00)),
                reading(datetime!(2025-06-01 11:00:00)),
            ])
            .unwrap();
        let exporter = CsvExporter::new(dir.path().join("out.csv"));

        let rows = export_recent(
            &store,
            &exporter,
            &alerts,
            datetime!(2025-06-01 12:00:00),
            time::Duration::days(7),
        )
        .unwrap();

        assert_eq!(rows, Some(2));
        let log = fs::read_to_string(alerts.path()).unwrap();
        assert!(log.ends_with(" [CSV WEEKLY] Updated (2 rows)\n"));
    }

    #[test]
    fn test_export_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = alert_log(dir.path());
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_batch(&[reading(datetime!(2025-06-01 11:00:00))])
            .unwrap();
        // The destination's parent is a regular file
        fs::write(dir.path().join("blocked"), "").unwrap();
        let exporter = CsvExporter::new(dir.path().join("blocked").join("out.csv"));

        let rows = export_recent(
            &store,
            &exporter,
            &alerts,
            datetime!(2025-06-01 12:00:00),
            time::Duration::days(7),
        )
        .unwrap();

        assert_eq!(rows, None);
        let log = fs::read_to_string(alerts.path()).unwrap();
        assert!(log.contains(" [CSV WEEKLY ERROR] "));
    }
}
