//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Created weather database schema v{}", SCHEMA_VERSION);
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version (0 for a fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the current schema.
///
/// Timestamps are UTC text in `YYYY-MM-DDTHH:MM:SSZ` form so that string
/// comparison matches chronological order. Location keys compare without
/// regard to case.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            city TEXT NOT NULL,
            country TEXT NOT NULL,
            state TEXT,
            units TEXT NOT NULL DEFAULT 'metric',
            temperature REAL NOT NULL,
            feels_like REAL,
            temp_min REAL,
            temp_max REAL,
            humidity INTEGER CHECK (humidity IS NULL OR humidity BETWEEN 0 AND 100),
            pressure REAL,
            weather_summary TEXT,
            weather_detail TEXT,
            wind_speed REAL,
            wind_direction INTEGER,
            cloudiness INTEGER CHECK (cloudiness IS NULL OR cloudiness BETWEEN 0 AND 100),
            visibility INTEGER,
            precipitation REAL,
            sunrise TEXT,
            sunset TEXT,
            fetched_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_readings_time ON readings(timestamp);
        CREATE INDEX IF NOT EXISTS idx_readings_location ON readings(city, country);

        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city TEXT NOT NULL COLLATE NOCASE,
            country TEXT NOT NULL COLLATE NOCASE,
            state TEXT,
            latitude REAL,
            longitude REAL,
            timezone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(city, country)
        );

        CREATE TABLE IF NOT EXISTS request_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            url TEXT NOT NULL,
            location_id INTEGER REFERENCES locations(id),
            status TEXT NOT NULL,
            error TEXT,
            latency_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_log_time ON request_log(timestamp);
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    info!(
        "Migrating weather database from v{} to v{}",
        old_version, SCHEMA_VERSION
    );
    if old_version < 2 {
        migrate_v1_to_v2(conn)?;
    }
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Rebuild `locations` with case-insensitive keys.
///
/// Rows that only differ by case collapse into the oldest one, and request
/// log rows pointing at a dropped duplicate are re-pointed at the survivor.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = OFF;
        BEGIN;
        CREATE TABLE locations_v2 (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city TEXT NOT NULL COLLATE NOCASE,
            country TEXT NOT NULL COLLATE NOCASE,
            state TEXT,
            latitude REAL,
            longitude REAL,
            timezone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE(city, country)
        );
        INSERT OR IGNORE INTO locations_v2
            SELECT id, city, country, state, latitude, longitude, timezone, is_active, created_at
            FROM locations ORDER BY id;
        UPDATE request_log SET location_id = (
            SELECT n.id FROM locations_v2 n
            JOIN locations o ON n.city = o.city AND n.country = o.country
            WHERE o.id = request_log.location_id
        ) WHERE location_id IS NOT NULL;
        DROP TABLE locations;
        ALTER TABLE locations_v2 RENAME TO locations;
        COMMIT;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    Ok(())
}
