//! Main store implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use skywatch_types::{Reading, RequestStatus, Units};

use crate::error::{Error, Result};
use crate::models::{
    ErrorLogEntry, Location, LocationUpdate, RequestLogEntry, RequestSummary, StoredReading,
    format_timestamp, parse_timestamp,
};
use crate::queries::ReadingQuery;
use crate::schema;

/// How long a connection waits on a locked database file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LOCATION_COLUMNS: &str =
    "id, city, country, state, latitude, longitude, timezone, is_active, created_at";

/// SQLite-based store for weather readings, locations and the request log.
///
/// The store only remembers the database path. Every operation opens its own
/// short-lived connection, so a `Store` can be cloned freely and shared
/// between tasks; concurrent writers wait on SQLite's file lock.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
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
        let store = Self {
            path: path.to_path_buf(),
        };

        let conn = store.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        schema::initialize(&conn)?;

        Ok(store)
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection for one operation.
    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(conn)
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let text: String = row.get(idx)?;
    parse_timestamp(&text).map_err(|e| conversion_error(idx, e))
}

fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<RequestStatus> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReading> {
    let units: String = row.get(5)?;
    let units: Units = units.parse().map_err(|e| conversion_error(5, e))?;

    Ok(StoredReading {
        id: row.get(0)?,
        reading: Reading {
            timestamp: timestamp_column(row, 1)?,
            city: row.get(2)?,
            country: row.get(3)?,
            state: row.get(4)?,
            units,
            temperature: row.get(6)?,
            feels_like: row.get(7)?,
            temp_min: row.get(8)?,
            temp_max: row.get(9)?,
            humidity: row.get(10)?,
            pressure: row.get(11)?,
            weather_summary: row.get(12)?,
            weather_detail: row.get(13)?,
            wind_speed: row.get(14)?,
            wind_direction: row.get(15)?,
            cloudiness: row.get(16)?,
            visibility: row.get(17)?,
            precipitation: row.get(18)?,
            sunrise: row.get(19)?,
            sunset: row.get(20)?,
            fetched_at: timestamp_column(row, 21)?,
        },
    })
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        city: row.get(1)?,
        country: row.get(2)?,
        state: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        timezone: row.get(6)?,
        is_active: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
    })
}

// Reading operations
impl Store {
    /// Insert a reading, returning its row ID.
    pub fn save_reading(&self, reading: &Reading) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO readings (timestamp, city, country, state, units, temperature,
             feels_like, temp_min, temp_max, humidity, pressure, weather_summary,
             weather_detail, wind_speed, wind_direction, cloudiness, visibility,
             precipitation, sunrise, sunset, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21)",
            rusqlite::params![
                format_timestamp(reading.timestamp),
                reading.city,
                reading.country,
                reading.state,
                reading.units.as_str(),
                reading.temperature,
                reading.feels_like,
                reading.temp_min,
                reading.temp_max,
                reading.humidity,
                reading.pressure,
                reading.weather_summary,
                reading.weather_detail,
                reading.wind_speed,
                reading.wind_direction,
                reading.cloudiness,
                reading.visibility,
                reading.precipitation,
                reading.sunrise,
                reading.sunset,
                format_timestamp(reading.fetched_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Insert a reading, reporting failure as `false` instead of an error.
    pub fn insert_reading(&self, reading: &Reading) -> bool {
        match self.save_reading(reading) {
            Ok(id) => {
                debug!(
                    "Stored reading {} for {}, {}",
                    id, reading.city, reading.country
                );
                true
            }
            Err(e) => {
                error!(
                    "Failed to store reading for {}, {}: {}",
                    reading.city, reading.country, e
                );
                false
            }
        }
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Readings for a location observed in the last `hours`, newest first.
    ///
    /// A window reaching past the earliest representable time has no lower
    /// bound.
    pub fn fetch_recent(
        &self,
        city: &str,
        country: &str,
        hours: u32,
    ) -> Result<Vec<StoredReading>> {
        let mut query = ReadingQuery::new().location(city, country);
        if let Some(cutoff) =
            OffsetDateTime::now_utc().checked_sub(time::Duration::hours(i64::from(hours)))
        {
            query = query.since(cutoff);
        }
        self.query_readings(&query)
    }

    /// Every stored reading, newest first.
    pub fn all_readings(&self) -> Result<Vec<StoredReading>> {
        self.query_readings(&ReadingQuery::new())
    }

    /// The most recent reading for a location.
    pub fn latest_reading(&self, city: &str, country: &str) -> Result<Option<StoredReading>> {
        let query = ReadingQuery::new().location(city, country).limit(1);
        Ok(self.query_readings(&query)?.into_iter().next())
    }

    /// Count readings, optionally for one `(city, country)`.
    pub fn count_readings(&self, location: Option<(&str, &str)>) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = match location {
            Some((city, country)) => conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE city = ? AND country = ?",
                [city, country],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as u64)
    }
}

// Request log operations
impl Store {
    /// Append a request log row. Failures are logged and swallowed.
    pub fn log_request(
        &self,
        url: &str,
        location_id: Option<i64>,
        status: RequestStatus,
        error: Option<&str>,
        latency_ms: Option<u64>,
    ) {
        let result = self.connect().and_then(|conn| {
            conn.execute(
                "INSERT INTO request_log (timestamp, url, location_id, status, error, latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    format_timestamp(OffsetDateTime::now_utc()),
                    url,
                    location_id,
                    status.as_str(),
                    error,
                    latency_ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
                ],
            )?;
            Ok(())
        });

        if let Err(e) = result {
            warn!("Could not write request log row for {}: {}", url, e);
        }
    }

    /// The most recent request log rows, newest first.
    pub fn request_log(&self, limit: u32) -> Result<Vec<RequestLogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, url, location_id, status, error, latency_ms
             FROM request_log ORDER BY timestamp DESC, id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map([limit], |row| {
                Ok(RequestLogEntry {
                    id: row.get(0)?,
                    timestamp: timestamp_column(row, 1)?,
                    url: row.get(2)?,
                    location_id: row.get(3)?,
                    status: status_column(row, 4)?,
                    error: row.get(5)?,
                    latency_ms: row
                        .get::<_, Option<i64>>(6)?
                        .map(|ms| u64::try_from(ms).unwrap_or(0)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// The most recent non-success rows with their location, newest first.
    pub fn get_error_log(&self, limit: u32) -> Result<Vec<ErrorLogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT r.timestamp, l.city, l.country, r.status, r.error
             FROM request_log r
             LEFT JOIN locations l ON r.location_id = l.id
             WHERE r.status != 'success'
             ORDER BY r.timestamp DESC, r.id DESC
             LIMIT ?",
        )?;
        let entries = stmt
            .query_map([limit], |row| {
                Ok(ErrorLogEntry {
                    timestamp: timestamp_column(row, 0)?,
                    city: row.get(1)?,
                    country: row.get(2)?,
                    status: status_column(row, 3)?,
                    error: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Total and successful request counts, optionally since a point in time.
    pub fn request_summary(&self, since: Option<OffsetDateTime>) -> Result<RequestSummary> {
        let conn = self.connect()?;
        let cutoff = since.map(format_timestamp);
        let (total, successful): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(status = 'success'), 0)
             FROM request_log WHERE ?1 IS NULL OR timestamp >= ?1",
            [cutoff],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(RequestSummary {
            total: total.max(0) as u64,
            successful: successful.max(0) as u64,
        })
    }
}

// Location operations
impl Store {
    /// Insert or update a location keyed by `(city, country)`, compared
    /// without regard to case.
    ///
    /// Attributes set in `update` overwrite the stored ones; the rest are
    /// kept. A new row is active unless `update` says otherwise.
    pub fn update_location(
        &self,
        city: &str,
        country: &str,
        update: &LocationUpdate,
    ) -> Result<Location> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO locations (city, country, state, latitude, longitude, timezone, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, 1))
             ON CONFLICT(city, country) DO UPDATE SET
                state = COALESCE(?3, state),
                latitude = COALESCE(?4, latitude),
                longitude = COALESCE(?5, longitude),
                timezone = COALESCE(?6, timezone),
                is_active = COALESCE(?7, is_active)",
            rusqlite::params![
                city,
                country,
                update.state,
                update.latitude,
                update.longitude,
                update.timezone,
                update.is_active,
            ],
        )?;

        Self::find_location(&conn, city, country)?.ok_or_else(|| Error::LocationNotFound {
            city: city.to_string(),
            country: country.to_string(),
        })
    }

    /// Add a location as active, leaving an existing row untouched.
    pub fn add_location(&self, city: &str, country: &str) -> Result<Location> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO locations (city, country, is_active) VALUES (?1, ?2, 1)",
            [city, country],
        )?;
        if inserted > 0 {
            info!("Tracking new location {}, {}", city, country);
        }

        Self::find_location(&conn, city, country)?.ok_or_else(|| Error::LocationNotFound {
            city: city.to_string(),
            country: country.to_string(),
        })
    }

    fn find_location(conn: &Connection, city: &str, country: &str) -> Result<Option<Location>> {
        let sql = format!(
            "SELECT {} FROM locations WHERE city = ? AND country = ?",
            LOCATION_COLUMNS
        );
        let location = conn
            .query_row(&sql, [city, country], location_from_row)
            .optional()?;
        Ok(location)
    }

    /// Look up a location.
    pub fn get_location(&self, city: &str, country: &str) -> Result<Option<Location>> {
        let conn = self.connect()?;
        Self::find_location(&conn, city, country)
    }

    /// Row ID of a location, if tracked.
    pub fn get_location_id(&self, city: &str, country: &str) -> Result<Option<i64>> {
        let conn = self.connect()?;
        let id = conn
            .query_row(
                "SELECT id FROM locations WHERE city = ? AND country = ?",
                [city, country],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn select_locations(&self, filter: &str) -> Result<Vec<Location>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM locations {} ORDER BY id",
            LOCATION_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let locations = stmt
            .query_map([], location_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Every location in insertion order.
    pub fn list_locations(&self) -> Result<Vec<Location>> {
        self.select_locations("")
    }

    /// Active locations in insertion order.
    pub fn active_locations(&self) -> Result<Vec<Location>> {
        self.select_locations("WHERE is_active = 1")
    }

    /// Toggle whether the collector polls a location.
    pub fn set_location_active(&self, city: &str, country: &str, active: bool) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE locations SET is_active = ?3 WHERE city = ?1 AND country = ?2",
            rusqlite::params![city, country, active],
        )?;
        if changed == 0 {
            return Err(Error::LocationNotFound {
                city: city.to_string(),
                country: country.to_string(),
            });
        }
        Ok(())
    }
}
