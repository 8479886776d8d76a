//! The logger's control loop.
//!
//! A [`Scheduler`] owns the store, the sensor, the exporter, the synchronizer
//! and the alert log. Once per tick it evaluates four independent timers and
//! runs whichever are due, always in the order sample, flush, purge, sync:
//!
//! - **sample**: every `sample_interval` of monotonic time
//! - **flush**: when the batch reaches `batch_size`, or every `flush_interval`
//! - **purge**: once per calendar day, on the first tick of the day
//! - **sync**: on wall-clock minutes divisible by `sync_interval_minutes`,
//!   at most once per [`SyncSlot`]
//!
//! [`Scheduler::tick`] takes the time as an argument so the loop can be
//! driven deterministically in tests; [`Scheduler::run`] feeds it from a
//! [`LocalClock`] once per second until shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use time::{Date, PrimitiveDateTime};
use tracing::{debug, info, warn};

use weather_store::{CsvExporter, Store};
use weather_types::{Reading, truncate_to_second};

use crate::actions::{export_recent, publish, purge_expired};
use crate::alert::AlertLog;
use crate::clock::{LocalClock, Now};
use crate::error::Result;
use crate::sensor::{SampleSource, SensorError};
use crate::sync::{Connectivity, SyncOutcome, Synchronizer, VersionControl};

/// Tick resolution of [`Scheduler::run`].
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Timer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Time between sensor reads.
    pub sample_interval: Duration,
    /// Maximum time between flushes.
    pub flush_interval: Duration,
    /// Batch length that triggers an early flush.
    pub batch_size: usize,
    /// How long readings are kept.
    pub retention: time::Duration,
    /// Span of readings included in each export.
    pub export_window: time::Duration,
    /// Minutes between sync slots; must divide 60.
    pub sync_interval_minutes: u8,
    /// Run git after each export.
    pub sync_enabled: bool,
    /// Working tree to commit and push.
    pub repo_root: PathBuf,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(60),
            flush_interval: Duration::from_secs(300),
            batch_size: 5,
            retention: time::Duration::days(365),
            export_window: time::Duration::days(7),
            sync_interval_minutes: 30,
            sync_enabled: true,
            repo_root: PathBuf::from("."),
        }
    }
}

/// Identity of one sync opportunity: date, hour and aligned minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncSlot {
    date: Date,
    hour: u8,
    minute: u8,
}

impl SyncSlot {
    /// The slot containing `at`.
    pub fn of(at: PrimitiveDateTime) -> Self {
        Self {
            date: at.date(),
            hour: at.hour(),
            minute: at.minute(),
        }
    }

    /// The slot starting at `at`, if its minute is aligned to `interval_minutes`.
    pub fn due(at: PrimitiveDateTime, interval_minutes: u8) -> Option<Self> {
        if interval_minutes == 0 || at.minute() % interval_minutes != 0 {
            return None;
        }
        Some(Self::of(at))
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A reading was appended to the batch.
    pub sampled: bool,
    /// The sensor read failed.
    pub sample_failed: bool,
    /// Rows newly committed by a successful flush.
    pub flushed: Option<usize>,
    /// A flush was attempted and failed.
    pub flush_failed: bool,
    /// The daily purge ran.
    pub purged: bool,
    /// The sync slot that fired this tick.
    pub sync_slot: Option<SyncSlot>,
    /// Rows written by the export, `0` for an empty window.
    pub exported: Option<usize>,
    /// Outcome of the git sync, when it ran.
    pub synced: Option<SyncOutcome>,
}

impl TickReport {
    /// True if no timer fired.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// The logger's control loop.
pub struct Scheduler<S, P, V> {
    config: ScheduleConfig,
    store: Store,
    sensor: S,
    exporter: CsvExporter,
    synchronizer: Synchronizer<P, V>,
    alerts: AlertLog,
    batch: Vec<Reading>,
    last_sample: Instant,
    last_flush: Instant,
    /// A flush failed and none has succeeded since.
    flush_failing: bool,
    last_purge_day: Option<Date>,
    last_sync_slot: Option<SyncSlot>,
}

impl<S, P, V> Scheduler<S, P, V>
where
    S: SampleSource,
    P: Connectivity,
    V: VersionControl,
{
    /// Create a scheduler whose interval timers start at `started`.
    ///
    /// The first sample is taken one `sample_interval` after `started`;
    /// the first purge happens on the first tick.
    pub fn new(
        config: ScheduleConfig,
        store: Store,
        sensor: S,
        exporter: CsvExporter,
        synchronizer: Synchronizer<P, V>,
        alerts: AlertLog,
        started: Instant,
    ) -> Self {
        let capacity = config.batch_size;
        Self {
            config,
            store,
            sensor,
            exporter,
            synchronizer,
            alerts,
            batch: Vec::with_capacity(capacity),
            last_sample: started,
            last_flush: started,
            flush_failing: false,
            last_purge_day: None,
            last_sync_slot: None,
        }
    }

    /// Readings sampled but not yet committed.
    pub fn batch(&self) -> &[Reading] {
        &self.batch
    }

    /// The reading store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The sample source.
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// The sample source, mutably.
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// The alert log.
    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// The synchronizer.
    pub fn synchronizer(&self) -> &Synchronizer<P, V> {
        &self.synchronizer
    }

    /// Timer settings.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Evaluate every timer once at `now` and run the due actions.
    ///
    /// Transient faults become alert-log entries and are reflected in the
    /// report; only a failed alert append is returned as an error.
    pub async fn tick(&mut self, now: &Now) -> Result<TickReport> {
        let mut report = TickReport::default();

        if now.monotonic.saturating_duration_since(self.last_sample) >= self.config.sample_interval
        {
            self.sample(now, &mut report)?;
        }

        if self.batch.len() >= self.config.batch_size
            || now.monotonic.saturating_duration_since(self.last_flush)
                >= self.config.flush_interval
        {
            self.flush(now, &mut report)?;
        }

        let today = now.wall.date();
        if self.last_purge_day != Some(today) {
            // Marked before the attempt so a failure is not retried every tick
            self.last_purge_day = Some(today);
            let purged = purge_expired(&mut self.store, &self.alerts, now.wall, self.config.retention)?;
            report.purged = purged.is_some();
        }

        if let Some(slot) = SyncSlot::due(now.wall, self.config.sync_interval_minutes)
            && self.last_sync_slot != Some(slot)
        {
            self.last_sync_slot = Some(slot);
            report.sync_slot = Some(slot);
            report.exported = export_recent(
                &self.store,
                &self.exporter,
                &self.alerts,
                now.wall,
                self.config.export_window,
            )?;
            if self.config.sync_enabled {
                let outcome =
                    publish(&self.synchronizer, &self.alerts, &self.config.repo_root, now.wall)
                        .await?;
                report.synced = Some(outcome);
            }
        }

        if !report.is_idle() {
            debug!("Tick at {}: {:?}", now.wall, report);
        }
        Ok(report)
    }

    fn sample(&mut self, now: &Now, report: &mut TickReport) -> Result<()> {
        self.last_sample = now.monotonic;

        let sample = self
            .sensor
            .read_sample()
            .and_then(|sample| sample.validate().map(|()| sample).map_err(SensorError::from));
        match sample {
            Ok(sample) => {
                let reading = Reading::from_sample(truncate_to_second(now.wall), &sample);
                debug!("Sampled {}", reading);
                self.batch.push(reading);
                report.sampled = true;
            }
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                self.alerts
                    .record_at(now.wall, &format!("[SENSOR ERROR] {e}"))?;
                report.sample_failed = true;
            }
        }
        Ok(())
    }

    /// Commit the batch. The flush timer only restarts once the batch is
    /// stored, so a failed flush is retried on the next tick; the alert is
    /// recorded once per run of failures.
    fn flush(&mut self, now: &Now, report: &mut TickReport) -> Result<()> {
        if self.batch.is_empty() {
            self.last_flush = now.monotonic;
            return Ok(());
        }

        match self.store.insert_batch(&self.batch) {
            Ok(inserted) => {
                debug!("Flushed {} readings ({} new)", self.batch.len(), inserted);
                if self.flush_failing {
                    info!("Store writable again, flushed {} pending readings", self.batch.len());
                    self.flush_failing = false;
                }
                self.batch.clear();
                self.last_flush = now.monotonic;
                report.flushed = Some(inserted);
            }
            Err(e) => {
                report.flush_failed = true;
                if self.flush_failing {
                    debug!("Flush of {} readings still failing: {}", self.batch.len(), e);
                    return Ok(());
                }
                warn!("Flush of {} readings failed: {}", self.batch.len(), e);
                self.flush_failing = true;
                self.alerts
                    .record_at(now.wall, &format!("[DB ERROR] flush failed: {e}"))?;
            }
        }
        Ok(())
    }

    /// Tick once per [`TICK_INTERVAL`] until `shutdown` resolves, then shut
    /// down cleanly.
    ///
    /// A fatal error from a tick stops the loop; the pending batch is still
    /// flushed and the store closed on a best-effort basis before the error
    /// is returned.
    pub async fn run<F>(mut self, clock: &LocalClock, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Scheduler running: sample every {:?}, flush every {:?} or {} readings",
            self.config.sample_interval, self.config.flush_interval, self.config.batch_size
        );
        if let Err(e) = self.alerts.record("Weather logger started") {
            self.abandon();
            return Err(e);
        }

        tokio::pin!(shutdown);
        loop {
            let now = clock.now();
            if let Err(e) = self.tick(&now).await {
                self.abandon();
                return Err(e);
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
            }
        }

        self.shutdown(&clock.now())
    }

    /// Flush any pending readings, close the store and record the stop.
    pub fn shutdown(mut self, now: &Now) -> Result<()> {
        if !self.batch.is_empty() {
            match self.store.insert_batch(&self.batch) {
                Ok(inserted) => info!("Final flush committed {} readings", inserted),
                Err(e) => {
                    warn!("Final flush failed: {}", e);
                    self.alerts
                        .record_at(now.wall, &format!("[DB ERROR] flush failed: {e}"))?;
                }
            }
        }

        if let Err(e) = self.store.close() {
            warn!("Closing store failed: {}", e);
            self.alerts
                .record_at(now.wall, &format!("[DB ERROR] close failed: {e}"))?;
        }

        self.alerts.record_at(now.wall, "Logger stopped cleanly")?;
        info!("Logger stopped");
        Ok(())
    }

    /// Best-effort flush and close after a fatal error, without touching the
    /// alert log.
    fn abandon(mut self) {
        if !self.batch.is_empty()
            && let Err(e) = self.store.insert_batch(&self.batch)
        {
            warn!("Dropping {} unflushed readings: {}", self.batch.len(), e);
        }
        if let Err(e) = self.store.close() {
            warn!("Closing store failed: {}", e);
        }
    }
}
