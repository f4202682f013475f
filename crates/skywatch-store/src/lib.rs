//! Local data persistence for Skywatch weather readings.
//!
//! This crate provides SQLite-based storage for normalized readings, the
//! tracked locations, and the request log the collector writes for every
//! API round-trip.
//!
//! # Features
//!
//! - Store readings exactly once; they are never updated or deleted
//! - Query by location and time range, with pagination
//! - Track locations with an active flag instead of hard deletes
//! - Diagnostics from the request log (error list, success rate)
//! - CSV export of whole tables
//! - Summary statistics over a window of readings
//!
//! Each operation opens its own connection; a [`Store`] is just the
//! database path and may be cloned into any task.
//!
//! # Example
//!
//! ```no_run
//! use skywatch_store::{ReadingQuery, Store};
//!
//! let store = Store::open_default()?;
//!
//! let query = ReadingQuery::new()
//!     .location("Knoxville", "US")
//!     .limit(10);
//! for stored in store.query_readings(&query)? {
//!     println!("{}", stored.reading);
//! }
//! # Ok::<(), skywatch_store::Error>(())
//! ```

mod error;
mod export;
mod models;
mod queries;
mod schema;
pub mod stats;
mod store;

pub use error::{Error, Result};
pub use export::{DEFAULT_LOCATIONS_CSV, DEFAULT_READINGS_CSV};
pub use models::{
    ErrorLogEntry, Location, LocationUpdate, RequestLogEntry, RequestSummary, StoredReading,
};
pub use queries::ReadingQuery;
pub use stats::{DataQuality, WeatherStats};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/skywatch/weather.db`
/// - macOS: `~/Library/Application Support/skywatch/weather.db`
/// - Windows: `C:\Users\<user>\AppData\Local\skywatch\weather.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("skywatch")
        .join("weather.db")
}
