//! Query builder for stored readings.
//!
//! # Example
//!
//! ```
//! use skywatch_store::ReadingQuery;
//! use time::{Duration, OffsetDateTime};
//!
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = ReadingQuery::new()
//!     .location("Knoxville", "US")
//!     .since(yesterday)
//!     .limit(50);
//! assert_eq!(query.city.as_deref(), Some("Knoxville"));
//! ```

use time::OffsetDateTime;

use crate::models::format_timestamp;

/// Columns selected for a [`StoredReading`](crate::StoredReading), in order.
pub(crate) const READING_COLUMNS: &str = "id, timestamp, city, country, state, units, \
     temperature, feels_like, temp_min, temp_max, humidity, pressure, weather_summary, \
     weather_detail, wind_speed, wind_direction, cloudiness, visibility, precipitation, \
     sunrise, sunset, fetched_at";

/// Fluent query builder for readings.
///
/// Results are ordered by observation time, newest first, unless
/// [`oldest_first`](Self::oldest_first) is set.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Exact city match.
    pub city: Option<String>,
    /// Exact country match.
    pub country: Option<String>,
    /// Readings observed at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Readings observed at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// A query matching every reading, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter by city.
    pub fn city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    /// Filter by country code.
    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    /// Filter by city and country.
    pub fn location(self, city: &str, country: &str) -> Self {
        self.city(city).country(country)
    }

    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Chronological order, for exports and time-series processing.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the WHERE clause and its parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref city) = self.city {
            conditions.push("city = ?");
            params.push(Box::new(city.clone()));
        }

        if let Some(ref country) = self.country {
            conditions.push("country = ?");
            params.push(Box::new(country.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(format_timestamp(since)));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(format_timestamp(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SELECT statement.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT {} FROM readings {} ORDER BY timestamp {}, id {}",
            READING_COLUMNS, where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            // SQLite only accepts OFFSET after a LIMIT
            if self.limit.is_none() {
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_new_defaults() {
        let query = ReadingQuery::new();
        assert!(query.city.is_none());
        assert!(query.since.is_none());
        assert!(query.limit.is_none());
        assert!(query.newest_first);
        let (clause, params) = query.build_where();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_where_all_filters() {
        let query = ReadingQuery::new()
            .location("Knoxville", "US")
            .since(datetime!(2024-01-01 00:00 UTC))
            .until(datetime!(2024-01-02 00:00 UTC));
        let (clause, params) = query.build_where();
        assert_eq!(
            clause,
            "WHERE city = ? AND country = ? AND timestamp >= ? AND timestamp <= ?"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_build_sql_order_and_paging() {
        let sql = ReadingQuery::new().limit(10).offset(20).build_sql();
        assert!(sql.contains("ORDER BY timestamp DESC"));
        assert!(sql.ends_with("LIMIT 10 OFFSET 20"));

        let sql = ReadingQuery::new().oldest_first().offset(5).build_sql();
        assert!(sql.contains("ORDER BY timestamp ASC"));
        assert!(sql.ends_with("LIMIT -1 OFFSET 5"));
    }
}
