//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use skywatch_types::{Reading, RequestStatus};

use crate::error::{Error, Result};

/// Render a timestamp the way every table stores it: UTC, whole seconds.
pub(crate) fn format_timestamp(time: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    // Formatting into a String only fails on I/O errors.
    time.to_offset(UtcOffset::UTC)
        .format(&format)
        .unwrap_or_default()
}

/// Parse a stored timestamp. Accepts the storage format, RFC 3339, and the
/// `YYYY-MM-DD HH:MM:SS` form SQLite's own `CURRENT_TIMESTAMP` produces.
pub(crate) fn parse_timestamp(text: &str) -> Result<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(text, &Rfc3339) {
        return Ok(t);
    }
    PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|_| Error::InvalidTimestamp(text.to_string()))
}

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    /// The normalized reading.
    #[serde(flatten)]
    pub reading: Reading,
}

impl StoredReading {
    /// Drop the row ID.
    pub fn into_reading(self) -> Reading {
        self.reading
    }
}

/// A tracked location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Database row ID.
    pub id: i64,
    pub city: String,
    pub country: String,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA timezone name.
    pub timezone: Option<String>,
    /// Whether the collector polls this location.
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Location {
    /// `City, CC` label.
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// Attributes to set on a location. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationUpdate {
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
}

impl LocationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }
}

/// One row of the request log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Endpoint URL without credentials.
    pub url: String,
    pub location_id: Option<i64>,
    pub status: RequestStatus,
    pub error: Option<String>,
    pub latency_ms: Option<u64>,
}

/// A failed request joined with its location, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub city: Option<String>,
    pub country: Option<String>,
    pub status: RequestStatus,
    pub error: Option<String>,
}

/// Totals over the request log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub total: u64,
    pub successful: u64,
}

impl RequestSummary {
    /// Rows that were not `success`.
    pub fn failed(&self) -> u64 {
        self.total.saturating_sub(self.successful)
    }

    /// Success percentage, 0 when the log is empty.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_timestamp_format_is_sortable_utc() {
        let t = datetime!(2024-03-01 07:05:09.75 -05:00);
        assert_eq!(format_timestamp(t), "2024-03-01T12:05:09Z");
        assert_eq!(
            format_timestamp(datetime!(0999-01-02 03:04:05 UTC)),
            "0999-01-02T03:04:05Z"
        );
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = datetime!(2024-03-01 12:05:09 UTC);
        assert_eq!(parse_timestamp("2024-03-01T12:05:09Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T07:05:09-05:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01 12:05:09").unwrap(), expected);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_request_summary_rate() {
        let summary = RequestSummary {
            total: 8,
            successful: 6,
        };
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.success_rate(), 75.0);
        assert_eq!(RequestSummary::default().success_rate(), 0.0);
    }

    #[test]
    fn test_location_update_builder() {
        let update = LocationUpdate::new()
            .state("TN")
            .coordinates(35.96, -83.92)
            .timezone("America/New_York")
            .active(false);
        assert_eq!(update.state.as_deref(), Some("TN"));
        assert_eq!(update.latitude, Some(35.96));
        assert_eq!(update.is_active, Some(false));
    }
}
