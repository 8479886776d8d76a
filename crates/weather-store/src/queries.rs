//! Query builder for stored readings.
//!
//! [`ReadingQuery`] follows the builder pattern for filtering and
//! limiting the `readings` table by timestamp.
//!
//! # Example
//!
//! ```
//! use weather_store::{ReadingQuery, Store};
//! use time::macros::datetime;
//!
//! let store = Store::open_in_memory()?;
//!
//! // Everything from the last week, oldest first, as the CSV export wants it
//! let query = ReadingQuery::new()
//!     .since(datetime!(2025-06-01 00:00:00))
//!     .oldest_first();
//!
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), weather_store::Error>(())
//! ```

use time::PrimitiveDateTime;
use weather_types::format_timestamp;

/// Fluent query builder for readings.
///
/// Use this to construct queries for [`Store::query_readings`](crate::Store::query_readings).
/// All filter methods are optional and can be chained in any order.
///
/// By default, queries return results ordered by `timestamp` descending
/// (newest first).
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Include only readings at or after this time.
    pub since: Option<PrimitiveDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No time range filter
    /// - No limit (all matching records)
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter to readings taken at or after this time.
    pub fn since(mut self, time: PrimitiveDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results by oldest first (ascending by `timestamp`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    ///
    /// Timestamps are compared as text; the fixed-width key format makes
    /// that equivalent to chronological comparison.
    pub(crate) fn build_where(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(format_timestamp(since));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT timestamp, temp_c, temp_f, pressure_hpa, humidity \
             FROM readings {} ORDER BY timestamp {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_reading_query_new_defaults() {
        let query = ReadingQuery::new();
        assert!(query.since.is_none());
        assert!(query.limit.is_none());
        assert!(query.newest_first);
    }

    #[test]
    fn test_reading_query_default_is_different_from_new() {
        assert!(!ReadingQuery::default().newest_first);
        assert!(ReadingQuery::new().newest_first);
    }

    #[test]
    fn test_reading_query_chaining() {
        let since = datetime!(2024-01-01 00:00:00);

        let query = ReadingQuery::new().since(since).limit(10).oldest_first();

        assert_eq!(query.since, Some(since));
        assert_eq!(query.limit, Some(10));
        assert!(!query.newest_first);
    }

    #[test]
    fn test_build_where_empty() {
        let (clause, params) = ReadingQuery::new().build_where();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_where_since() {
        let (clause, params) = ReadingQuery::new()
            .since(datetime!(2024-01-01 00:00:00))
            .build_where();
        assert_eq!(clause, "WHERE timestamp >= ?");
        assert_eq!(params, vec!["2024-01-01T00:00:00"]);
    }

    #[test]
    fn test_build_sql_order_and_limit() {
        let sql = ReadingQuery::new().oldest_first().limit(10).build_sql();
        assert!(sql.contains("ORDER BY timestamp ASC"));
        assert!(sql.ends_with("LIMIT 10"));

        let sql = ReadingQuery::new().build_sql();
        assert!(sql.ends_with("ORDER BY timestamp DESC"));
    }
}
