//! Weather API client for the Skywatch collector.
//!
//! This crate talks to the OpenWeatherMap 2.5 API and turns its responses
//! into normalized [`Reading`]s.
//!
//! # Features
//!
//! - **Current conditions and 5-day forecasts** for a city and optional country
//! - **Client-side throttle**: minimum spacing between two requests
//! - **Retries** with an escalating delay schedule and a 429 cool-down
//! - **Failure tracking**: cities that keep failing are skipped without a request
//! - **Provider trait** so collectors and tests can swap in a [`MockProvider`]
//!
//! # Quick Start
//!
//! ```no_run
//! use skywatch_core::{ClientConfig, WeatherClient, WeatherProvider};
//! use skywatch_types::Units;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WeatherClient::new(ClientConfig::new("my-api-key"))?;
//!
//!     let reading = client.current_weather("Knoxville", Some("US"), Units::Imperial).await?;
//!     println!("{}", reading);
//!
//!     let forecast = client.five_day_forecast("Knoxville", Some("US"), Units::Imperial).await?;
//!     for day in forecast.daily_summaries() {
//!         println!("{}: {:.0} / {:.0}", day.date, day.high, day.low);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod failures;
pub mod forecast;
pub mod mock;
pub mod normalize;
pub mod provider;
pub mod retry;
pub mod throttle;
pub mod util;

pub use client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, WeatherClient};
pub use error::{Error, Result};
pub use failures::{DEFAULT_FAILURE_THRESHOLD, FailureTracker};
pub use forecast::{DailySummary, Forecast, ForecastEntry};
pub use mock::{MockFailure, MockProvider};
pub use provider::WeatherProvider;
pub use retry::RetryPolicy;
pub use throttle::Throttle;

// Re-export from skywatch-types
pub use skywatch_types::{Reading, RequestStatus, Units};
