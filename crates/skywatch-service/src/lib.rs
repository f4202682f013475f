//! Scheduled weather collection for tracked locations.
//!
//! This crate wires the Skywatch client and store together:
//! - [`Config`] is read once from the environment (and `.env`)
//! - [`Collector`] fetches every active location on a fixed interval and
//!   records one request-log row per fetch
//! - [`FetchQueue`] serializes on-demand fetches through one worker task
//! - [`get_weather_stats`] aggregates stored readings with fallbacks
//!
//! # Configuration
//!
//! ```text
//! WEATHER_API_KEY=your-key
//! DB_PATH=./weather.db
//! LOG_LEVEL=info
//! COLLECTION_INTERVAL_MINUTES=30
//! TRACKED_LOCATIONS=Knoxville:US,Paris:FR
//! ```

pub mod collector;
pub mod config;
pub mod queue;
pub mod stats;

pub use collector::{
    Collector, CollectorError, CollectorSettings, CollectorState, CollectorStatus, CycleSummary,
    fetch_and_store,
};
pub use config::{Config, ConfigError, TrackedLocation, ValidationError, default_config_path};
pub use queue::{DEFAULT_QUEUE_CAPACITY, FetchQueue, QueueError};
pub use stats::get_weather_stats;

/// Add every configured location to the store and mark it active.
pub fn seed_locations(
    store: &skywatch_store::Store,
    locations: &[TrackedLocation],
) -> skywatch_store::Result<usize> {
    for location in locations {
        store.add_location(&location.city, &location.country)?;
        store.set_location_active(&location.city, &location.country, true)?;
    }
    Ok(locations.len())
}
