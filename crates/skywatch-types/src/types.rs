//! Core types for normalized weather data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;

/// Meters per second to miles per hour.
const MPS_TO_MPH: f64 = 2.236_936_292;

/// Unit system a value was requested and reported in.
///
/// The names match the provider's `units` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Units {
    /// Celsius, meters per second.
    #[default]
    Metric,
    /// Fahrenheit, miles per hour.
    Imperial,
    /// Kelvin, meters per second.
    Standard,
}

impl Units {
    /// The query-parameter spelling of this unit system.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    /// Default unit system for a country: imperial for the US, metric elsewhere.
    ///
    /// ```
    /// use skywatch_types::Units;
    ///
    /// assert_eq!(Units::for_country("us"), Units::Imperial);
    /// assert_eq!(Units::for_country("GB"), Units::Metric);
    /// assert_eq!(Units::for_country(""), Units::Metric);
    /// ```
    #[must_use]
    pub fn for_country(country: &str) -> Self {
        if country.trim().eq_ignore_ascii_case("US") {
            Units::Imperial
        } else {
            Units::Metric
        }
    }

    /// Temperature suffix for display.
    #[must_use]
    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    /// Wind speed suffix for display.
    #[must_use]
    pub fn wind_speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }

    /// Convert a temperature reported in `self` into `target`.
    ///
    /// ```
    /// use skywatch_types::Units;
    ///
    /// let f = Units::Metric.convert_temperature(100.0, Units::Imperial);
    /// assert!((f - 212.0).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn convert_temperature(&self, value: f64, target: Units) -> f64 {
        if *self == target {
            return value;
        }
        let kelvin = match self {
            Units::Metric => value + 273.15,
            Units::Imperial => (value - 32.0) * 5.0 / 9.0 + 273.15,
            Units::Standard => value,
        };
        match target {
            Units::Metric => kelvin - 273.15,
            Units::Imperial => (kelvin - 273.15) * 9.0 / 5.0 + 32.0,
            Units::Standard => kelvin,
        }
    }

    /// Convert a wind speed reported in `self` into `target`.
    #[must_use]
    pub fn convert_wind_speed(&self, value: f64, target: Units) -> f64 {
        match (self, target) {
            (Units::Imperial, Units::Metric | Units::Standard) => value / MPS_TO_MPH,
            (Units::Metric | Units::Standard, Units::Imperial) => value * MPS_TO_MPH,
            _ => value,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" | "kelvin" => Ok(Units::Standard),
            other => Err(ParseError::UnknownUnits(other.to_string())),
        }
    }
}

/// Outcome label recorded for one API round-trip in the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestStatus {
    /// Fetch succeeded and the reading was stored.
    Success,
    /// Transport-level failure (connection, timeout, TLS).
    Error,
    /// The provider answered but no reading could be produced.
    ApiError,
    /// Fetch succeeded but the reading could not be stored.
    InsertFailed,
}

impl RequestStatus {
    /// The label stored in the `request_log.status` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
            RequestStatus::ApiError => "api_error",
            RequestStatus::InsertFailed => "insert_failed",
        }
    }

    /// Whether this status counts as a successful request.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RequestStatus::Success)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RequestStatus::Success),
            "error" => Ok(RequestStatus::Error),
            "api_error" => Ok(RequestStatus::ApiError),
            "insert_failed" => Ok(RequestStatus::InsertFailed),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// One normalized weather observation for a location at a point in time.
///
/// `timestamp` and `temperature` are always present; every other
/// measurement is optional because providers omit fields freely.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Provider observation time (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// City name as reported by the provider.
    pub city: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    /// State or region, when known.
    pub state: Option<String>,
    /// Unit system of every measurement in this record.
    pub units: Units,
    /// Air temperature.
    pub temperature: f64,
    /// Perceived temperature.
    pub feels_like: Option<f64>,
    /// Minimum temperature currently observed across the area.
    pub temp_min: Option<f64>,
    /// Maximum temperature currently observed across the area.
    pub temp_max: Option<f64>,
    /// Relative humidity percentage (0-100).
    pub humidity: Option<u8>,
    /// Atmospheric pressure in hPa.
    pub pressure: Option<f64>,
    /// Short weather category, e.g. "Rain".
    pub weather_summary: Option<String>,
    /// Free-text weather description, e.g. "light rain".
    pub weather_detail: Option<String>,
    /// Wind speed.
    pub wind_speed: Option<f64>,
    /// Wind direction in meteorological degrees.
    pub wind_direction: Option<u16>,
    /// Cloud cover percentage (0-100).
    pub cloudiness: Option<u8>,
    /// Visibility in meters.
    pub visibility: Option<u32>,
    /// Precipitation volume for the last hour in mm.
    pub precipitation: Option<f64>,
    /// Local sunrise time, e.g. "06:42 AM".
    pub sunrise: Option<String>,
    /// Local sunset time, e.g. "07:15 PM".
    pub sunset: Option<String>,
    /// When the client captured this reading (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub fetched_at: OffsetDateTime,
}

impl Reading {
    /// Create a reading with only the mandatory fields set.
    ///
    /// `fetched_at` is set to the current time.
    pub fn new(
        city: impl Into<String>,
        country: impl Into<String>,
        timestamp: OffsetDateTime,
        temperature: f64,
        units: Units,
    ) -> Self {
        Self {
            timestamp,
            city: city.into(),
            country: country.into(),
            state: None,
            units,
            temperature,
            feels_like: None,
            temp_min: None,
            temp_max: None,
            humidity: None,
            pressure: None,
            weather_summary: None,
            weather_detail: None,
            wind_speed: None,
            wind_direction: None,
            cloudiness: None,
            visibility: None,
            precipitation: None,
            sunrise: None,
            sunset: None,
            fetched_at: OffsetDateTime::now_utc(),
        }
    }

    /// Temperature expressed in `target` units.
    #[must_use]
    pub fn temperature_in(&self, target: Units) -> f64 {
        self.units.convert_temperature(self.temperature, target)
    }

    /// Wind speed expressed in `target` units, if reported.
    #[must_use]
    pub fn wind_speed_in(&self, target: Units) -> Option<f64> {
        self.wind_speed
            .map(|speed| self.units.convert_wind_speed(speed, target))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}: {:.1}{}",
            self.city,
            self.country,
            self.temperature,
            self.units.temperature_symbol()
        )?;
        if let Some(detail) = &self.weather_detail {
            write!(f, ", {}", detail)?;
        }
        if let Some(humidity) = self.humidity {
            write!(f, ", humidity {}%", humidity)?;
        }
        Ok(())
    }
}
