//! In-memory weather provider for testing.
//!
//! [`MockProvider`] implements [`WeatherProvider`] without any network
//! access. Readings are synthesized from the requested city, and failures
//! can be injected per city to exercise error paths in the collector and
//! the statistics fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use skywatch_types::{Reading, Units};

use crate::error::{Error, Result};
use crate::forecast::Forecast;
use crate::provider::WeatherProvider;

/// Failure to inject for a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Answer as if the provider returned 404.
    NotFound,
    /// Answer as if the provider returned 500.
    ServerError,
    /// Answer as if the provider returned a body without `main.temp`.
    Malformed,
}

/// A scripted weather provider.
///
/// ```
/// use skywatch_core::{MockProvider, WeatherProvider};
/// use skywatch_types::Units;
///
/// #[tokio::main]
/// async fn main() {
///     let provider = MockProvider::new().with_temperature(18.5);
///     let reading = provider
///         .current_weather("lima", Some("pe"), Units::Metric)
///         .await
///         .unwrap();
///     assert_eq!(reading.city, "Lima");
///     assert_eq!(reading.temperature, 18.5);
///     assert_eq!(provider.call_count(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    temperature: f64,
    failures: Mutex<HashMap<String, MockFailure>>,
    calls: AtomicU32,
}

impl MockProvider {
    /// Create a provider that answers every city with 20 degrees.
    pub fn new() -> Self {
        Self {
            temperature: 20.0,
            ..Default::default()
        }
    }

    /// Temperature reported for every successful lookup.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Make lookups for `city` fail.
    pub fn fail_city(&self, city: &str, failure: MockFailure) {
        self.failures_map().insert(city.to_lowercase(), failure);
    }

    /// Remove an injected failure.
    pub fn heal_city(&self, city: &str) {
        self.failures_map().remove(&city.to_lowercase());
    }

    /// Number of lookups served, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    fn failures_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, MockFailure>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, city: &str, country: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if city.trim().is_empty() {
            return Err(Error::InvalidInput("city must not be empty".to_string()));
        }
        match self.failures_map().get(&city.to_lowercase()) {
            None => Ok(()),
            Some(MockFailure::NotFound) => Err(Error::NotFound {
                location: crate::util::location_query(city, country),
            }),
            Some(MockFailure::ServerError) => Err(Error::Status {
                status: 500,
                endpoint: "weather".to_string(),
            }),
            Some(MockFailure::Malformed) => Err(Error::Parse("missing `main.temp`".to_string())),
        }
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Reading> {
        self.check(city, country)?;
        let city = crate::util::normalize_city(city);
        let country = crate::util::normalize_country(country).unwrap_or_default();
        let mut reading = Reading::new(
            city,
            country,
            OffsetDateTime::now_utc(),
            Units::Metric.convert_temperature(self.temperature, units),
            units,
        );
        reading.humidity = Some(55);
        reading.pressure = Some(1013.0);
        reading.weather_summary = Some("Clear".to_string());
        reading.weather_detail = Some("clear sky".to_string());
        Ok(reading)
    }

    async fn five_day_forecast(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Forecast> {
        self.check(city, country)?;
        Ok(Forecast {
            units,
            ..Default::default()
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("mock://{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure_and_heal() {
        let provider = MockProvider::new();
        provider.fail_city("Springfield", MockFailure::NotFound);

        let err = provider
            .current_weather("springfield", None, Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(
            provider
                .fetch_current_weather("Springfield", None, Units::Metric)
                .await
                .is_none()
        );

        provider.heal_city("SPRINGFIELD");
        assert!(
            provider
                .fetch_current_weather("Springfield", None, Units::Metric)
                .await
                .is_some()
        );
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_units_are_applied() {
        let provider = MockProvider::new().with_temperature(100.0);
        let reading = provider
            .current_weather("Austin", Some("us"), Units::Imperial)
            .await
            .unwrap();
        assert_eq!(reading.country, "US");
        assert_eq!(reading.units, Units::Imperial);
        assert!((reading.temperature - 212.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_city_rejected() {
        let provider = MockProvider::new();
        let err = provider
            .five_day_forecast("  ", None, Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
