//! HTTP client for the OpenWeatherMap 2.5 API.
//!
//! Each call goes through the same pipeline: input normalization, the
//! per-city failure check, the request throttle, and the retry loop. The
//! API key is sent as the `appid` query parameter and never appears in logs
//! or in errors (transport errors have their URL stripped).
//!
//! # Example
//!
//! ```no_run
//! use skywatch_core::{ClientConfig, WeatherClient, WeatherProvider};
//! use skywatch_types::Units;
//!
//! # async fn example() -> skywatch_core::Result<()> {
//! let client = WeatherClient::new(ClientConfig::new("my-api-key"))?;
//! let reading = client.current_weather("knoxville", Some("us"), Units::Imperial).await?;
//! println!("{}", reading);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use skywatch_types::{Reading, Units};

use crate::error::{Error, Result};
use crate::failures::{DEFAULT_FAILURE_THRESHOLD, FailureTracker};
use crate::forecast::Forecast;
use crate::normalize::{CurrentWeatherResponse, normalize_current};
use crate::provider::WeatherProvider;
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;
use crate::util::{location_query, normalize_city, normalize_country};

/// Default provider base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for [`WeatherClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Provider API key.
    pub api_key: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Per-request socket timeout.
    pub timeout: Duration,
    /// Attempt budget and delays.
    pub retry: RetryPolicy,
    /// Minimum spacing between two requests.
    pub min_request_interval: Duration,
    /// Failed calls after which a city is skipped.
    pub failure_threshold: u32,
}

impl ClientConfig {
    /// Defaults for everything except the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            min_request_interval: Duration::from_secs(1),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("min_request_interval", &self.min_request_interval)
            .field("failure_threshold", &self.failure_threshold)
            .finish()
    }
}

/// Rate-limited, retrying weather client.
#[derive(Debug)]
pub struct WeatherClient {
    http: Client,
    config: ClientConfig,
    throttle: Throttle,
    failures: FailureTracker,
}

impl WeatherClient {
    /// Build a client from its settings.
    pub fn new(mut config: ClientConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(Error::InvalidInput(format!(
                "base URL must start with http:// or https://, got: {}",
                config.base_url
            )));
        }
        if config.api_key.trim().is_empty() {
            return Err(Error::InvalidInput("API key must not be empty".to_string()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            throttle: Throttle::new(config.min_request_interval),
            failures: FailureTracker::new(config.failure_threshold),
            config,
        })
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Per-city failure tallies.
    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    /// Normalize inputs and apply the short-circuit check.
    fn prepare(&self, city: &str, country: Option<&str>) -> Result<(String, Option<String>)> {
        let city = normalize_city(city);
        if city.is_empty() {
            return Err(Error::InvalidInput("city must not be empty".to_string()));
        }
        if self.failures.is_unresolvable(&city) {
            warn!("Skipping {}: too many failed lookups", city);
            return Err(Error::Unresolvable { city });
        }
        Ok((city, normalize_country(country)))
    }

    /// Update the failure tally from the outcome of a call.
    fn record_outcome<T>(&self, city: &str, result: &Result<T>) {
        match result {
            Ok(_) => self.failures.reset(city),
            Err(e) if e.counts_against_city() => {
                let count = self.failures.register_failure(city);
                if count >= self.failures.threshold() {
                    warn!(
                        "{} failed {} times; further lookups will be skipped",
                        city, count
                    );
                }
            }
            Err(_) => {}
        }
    }

    /// GET `{base}/{name}` with the standard query and the retry loop.
    async fn get_json<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &str,
        units: Units,
    ) -> Result<T> {
        let url = self.endpoint(name);
        let attempts = self.config.retry.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            self.throttle.wait().await;
            debug!(
                "GET {} q={} units={} (attempt {}/{})",
                url,
                query,
                units,
                attempt + 1,
                attempts
            );

            let started = Instant::now();
            let err = match self
                .http
                .get(&url)
                .query(&[
                    ("q", query),
                    ("units", units.as_str()),
                    ("appid", self.config.api_key.as_str()),
                ])
                .send()
                .await
            {
                Ok(response) => match response.status() {
                    StatusCode::OK => {
                        let body = response.text().await.map_err(|e| e.without_url())?;
                        debug!("{} answered in {:?}", url, started.elapsed());
                        return serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()));
                    }
                    StatusCode::UNAUTHORIZED => {
                        error!("Provider rejected the API key for {}", url);
                        return Err(Error::Unauthorized);
                    }
                    StatusCode::NOT_FOUND => Error::NotFound {
                        location: query.to_string(),
                    },
                    StatusCode::TOO_MANY_REQUESTS => Error::RateLimited,
                    other => Error::Status {
                        status: other.as_u16(),
                        endpoint: name.to_string(),
                    },
                },
                Err(e) => Error::Http(e.without_url()),
            };

            warn!(
                "Attempt {}/{} for {} failed: {}",
                attempt + 1,
                attempts,
                query,
                err
            );
            if !err.is_retryable() {
                return Err(err);
            }

            if attempt + 1 < attempts {
                let delay = if matches!(err, Error::RateLimited) {
                    self.config.retry.rate_limit_wait
                } else {
                    self.config.retry.delay_for_attempt(attempt)
                };
                if !delay.is_zero() {
                    info!("Retrying {} in {:?}", query, delay);
                    tokio::time::sleep(delay).await;
                }
            }
            last_error = Some(err);
        }

        let last = last_error.unwrap_or(Error::Status {
            status: 0,
            endpoint: name.to_string(),
        });
        error!("Giving up on {} after {} attempt(s): {}", query, attempts, last);
        Err(Error::RetriesExhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Reading> {
        let (city, country) = self.prepare(city, country)?;
        let query = location_query(&city, country.as_deref());

        let response = self
            .get_json::<CurrentWeatherResponse>("weather", &query, units)
            .await;
        self.record_outcome(&city, &response);

        let reading = normalize_current(response?, &city, country.as_deref(), units)?;
        debug!("Normalized reading: {}", reading);
        Ok(reading)
    }

    async fn five_day_forecast(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Forecast> {
        let (city, country) = self.prepare(city, country)?;
        let query = location_query(&city, country.as_deref());

        let response = self.get_json::<Forecast>("forecast", &query, units).await;
        self.record_outcome(&city, &response);

        let mut forecast = response?;
        forecast.units = units;
        Ok(forecast)
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url, name)
    }
}
