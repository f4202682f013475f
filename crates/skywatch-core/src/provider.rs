//! Trait abstraction over weather sources.
//!
//! The collector, the fetch queue and the statistics fallback only need
//! "give me current weather for this place"; [`WeatherProvider`] lets them
//! run against the real HTTP client or a [`MockProvider`](crate::MockProvider).

use async_trait::async_trait;
use tracing::warn;

use skywatch_types::{Reading, Units};

use crate::error::Result;
use crate::forecast::Forecast;

/// A source of current conditions and forecasts.
///
/// # Example
///
/// ```ignore
/// use skywatch_core::{WeatherProvider, Units};
///
/// async fn show<P: WeatherProvider>(provider: &P) {
///     if let Some(reading) = provider.fetch_current_weather("Knoxville", Some("US"), Units::Imperial).await {
///         println!("{}", reading);
///     }
/// }
/// ```
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch and normalize current conditions.
    async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Reading>;

    /// Fetch the 5-day / 3-hour forecast.
    async fn five_day_forecast(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Forecast>;

    /// URL recorded in the request log for an endpoint (`weather`,
    /// `forecast`). Never contains credentials.
    fn endpoint(&self, name: &str) -> String;

    /// Like [`current_weather`](Self::current_weather), logging and
    /// discarding the error.
    async fn fetch_current_weather(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Option<Reading> {
        match self.current_weather(city, country, units).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("No current weather for {}: {}", city, e);
                None
            }
        }
    }

    /// Like [`five_day_forecast`](Self::five_day_forecast), logging and
    /// discarding the error.
    async fn fetch_five_day_forecast(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Option<Forecast> {
        match self.five_day_forecast(city, country, units).await {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                warn!("No forecast for {}: {}", city, e);
                None
            }
        }
    }
}
