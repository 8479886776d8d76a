//! Main store implementation.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use time::PrimitiveDateTime;
use tracing::{debug, info};

use weather_types::{Reading, format_timestamp, parse_timestamp};

use crate::error::{Error, Result};
use crate::queries::ReadingQuery;
use crate::schema;

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-based store for weather readings.
///
/// The store assumes it is the only writer: the connection is opened once,
/// owned by one caller, and closed with [`Store::close`].
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        configure(&conn)?;
        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    /// The journal mode SQLite actually applied (`wal` for file databases).
    pub fn journal_mode(&self) -> Result<String> {
        let mode: String = self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode)
    }
}

/// Apply the per-connection pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let key: String = row.get(0)?;
    let timestamp = parse_timestamp(&key)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(Reading {
        timestamp,
        temp_c: row.get(1)?,
        temp_f: row.get(2)?,
        pressure_hpa: row.get(3)?,
        humidity_pct: row.get(4)?,
    })
}

/// Insert readings inside an open transaction, skipping existing keys.
///
/// Returns the number of rows that were new.
fn insert_rows(tx: &Transaction<'_>, readings: &[Reading]) -> Result<usize> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO readings (timestamp, temp_c, temp_f, pressure_hpa, humidity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    let mut inserted = 0;
    for reading in readings {
        inserted += stmt.execute(rusqlite::params![
            reading.key(),
            reading.temp_c,
            reading.temp_f,
            reading.pressure_hpa,
            reading.humidity_pct,
        ])?;
    }

    Ok(inserted)
}

// Write operations
impl Store {
    /// Insert a batch of readings as one transaction.
    ///
    /// Readings whose timestamp is already stored are skipped, so a batch
    /// can be replayed after a crash without error. Either every new row of
    /// the batch becomes visible or none does.
    pub fn insert_batch(&mut self, readings: &[Reading]) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let inserted = insert_rows(&tx, readings)?;
        tx.commit()?;

        debug!(
            "Committed batch of {} readings ({} new)",
            readings.len(),
            inserted
        );
        Ok(inserted)
    }

    /// Delete every reading strictly older than `cutoff`.
    ///
    /// Returns the number of rows removed; zero is not an error.
    pub fn delete_before(&mut self, cutoff: PrimitiveDateTime) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM readings WHERE timestamp < ?1",
            [format_timestamp(cutoff)],
        )?;
        tx.commit()?;

        debug!(
            "Deleted {} readings older than {}",
            deleted,
            format_timestamp(cutoff)
        );
        Ok(deleted)
    }
}

// Read operations
impl Store {
    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// All readings at or after `since`, oldest first.
    pub fn readings_since(&self, since: PrimitiveDateTime) -> Result<Vec<Reading>> {
        self.query_readings(&ReadingQuery::new().since(since).oldest_first())
    }

    /// Look up a single reading by its timestamp.
    pub fn get_reading(&self, timestamp: PrimitiveDateTime) -> Result<Option<Reading>> {
        let reading = self
            .conn
            .query_row(
                "SELECT timestamp, temp_c, temp_f, pressure_hpa, humidity
                 FROM readings WHERE timestamp = ?",
                [format_timestamp(timestamp)],
                reading_from_row,
            )
            .optional()?;

        Ok(reading)
    }

    /// Get the most recent reading.
    pub fn latest_reading(&self) -> Result<Option<Reading>> {
        let mut readings = self.query_readings(&ReadingQuery::new().limit(1))?;
        Ok(readings.pop())
    }

    /// Count all stored readings.
    pub fn count_readings(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;

        Ok(count as u64)
    }
}
