//! Statistics retrieval with fallbacks.
//!
//! Readings for the window are looked up in three steps, stopping at the
//! first that yields anything:
//!
//! 1. the time-windowed query for the exact location;
//! 2. a scan of every reading, matching city and country without regard to
//!    case and dropping readings older than the window;
//! 3. one fresh fetch from the provider, stored and logged like a collected
//!    reading.
//!
//! When all three come up empty the result is
//! [`WeatherStats::not_available`].

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use skywatch_core::WeatherProvider;
use skywatch_store::{Store, WeatherStats};
use skywatch_types::{Reading, Units};

use crate::collector::fetch_and_store;

/// Summary statistics for `city, country` over the last `days` days.
pub async fn get_weather_stats(
    store: &Store,
    provider: &dyn WeatherProvider,
    city: &str,
    country: &str,
    days: u32,
) -> WeatherStats {
    let days = days.max(1);

    let readings = windowed_readings(store, city, country, days);
    if !readings.is_empty() {
        return WeatherStats::from_readings(city, country, days, &readings);
    }

    let readings = scanned_readings(store, city, country, days);
    if !readings.is_empty() {
        debug!(
            "Stats for {}, {} served from full scan ({} readings)",
            city,
            country,
            readings.len()
        );
        return WeatherStats::from_readings(city, country, days, &readings);
    }

    info!("No stored readings for {}, {}; fetching one now", city, country);
    let location_id = store.get_location_id(city, country).ok().flatten();
    let (_, reading) = fetch_and_store(
        provider,
        store,
        city,
        country,
        Units::for_country(country),
        location_id,
    )
    .await;

    match reading {
        Some(reading) => WeatherStats::from_readings(city, country, days, &[reading]),
        None => WeatherStats::not_available(city, country, days),
    }
}

fn windowed_readings(store: &Store, city: &str, country: &str, days: u32) -> Vec<Reading> {
    match store.fetch_recent(city, country, days.saturating_mul(24)) {
        Ok(rows) => rows.into_iter().map(|row| row.into_reading()).collect(),
        Err(e) => {
            warn!("Windowed query for {}, {} failed: {}", city, country, e);
            Vec::new()
        }
    }
}

fn scanned_readings(store: &Store, city: &str, country: &str, days: u32) -> Vec<Reading> {
    let cutoff = OffsetDateTime::now_utc().checked_sub(time::Duration::days(i64::from(days)));
    match store.all_readings() {
        Ok(rows) => rows
            .into_iter()
            .map(|row| row.into_reading())
            .filter(|r| {
                r.city.eq_ignore_ascii_case(city)
                    && r.country.eq_ignore_ascii_case(country)
                    && cutoff.is_none_or(|cutoff| r.timestamp >= cutoff)
            })
            .collect(),
        Err(e) => {
            warn!("Full scan for {}, {} failed: {}", city, country, e);
            Vec::new()
        }
    }
}
