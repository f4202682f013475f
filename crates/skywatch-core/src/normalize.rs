//! Provider payloads for current conditions and their normalization into
//! [`Reading`].
//!
//! Every block of the provider's JSON is optional on the wire. Only the
//! observation time (`dt`) and the temperature (`main.temp`) are required;
//! anything else that is missing becomes `None` in the reading.

use serde::Deserialize;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use skywatch_types::{Reading, Units};

use crate::error::{Error, Result};

/// Current-weather response from `GET /weather`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentWeatherResponse {
    pub dt: Option<i64>,
    pub name: Option<String>,
    /// Shift from UTC in seconds for the location.
    pub timezone: Option<i32>,
    pub main: Option<MainBlock>,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
    pub wind: Option<WindBlock>,
    pub clouds: Option<CloudsBlock>,
    pub visibility: Option<f64>,
    pub rain: Option<PrecipitationBlock>,
    pub snow: Option<PrecipitationBlock>,
    pub sys: Option<SysBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainBlock {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionBlock {
    pub main: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindBlock {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudsBlock {
    pub all: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrecipitationBlock {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SysBlock {
    pub country: Option<String>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// Clamp a provider percentage into `0..=100`.
fn percentage(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Render a unix timestamp as `hh:mm AM` in the given offset.
pub(crate) fn local_clock(timestamp: i64, offset: UtcOffset) -> Option<String> {
    let format = format_description!("[hour repr:12]:[minute] [period]");
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()?
        .to_offset(offset)
        .format(&format)
        .ok()
}

/// Convert a provider response into a [`Reading`].
///
/// `requested_city` and `requested_country` fill in when the provider omits
/// `name` or `sys.country`.
pub fn normalize_current(
    response: CurrentWeatherResponse,
    requested_city: &str,
    requested_country: Option<&str>,
    units: Units,
) -> Result<Reading> {
    let dt = response
        .dt
        .ok_or_else(|| Error::Parse("missing observation time `dt`".to_string()))?;
    let main = response
        .main
        .ok_or_else(|| Error::Parse("missing `main` block".to_string()))?;
    let temperature = main
        .temp
        .ok_or_else(|| Error::Parse("missing `main.temp`".to_string()))?;
    let timestamp = OffsetDateTime::from_unix_timestamp(dt)
        .map_err(|e| Error::Parse(format!("invalid observation time {}: {}", dt, e)))?;

    let sys = response.sys.unwrap_or_default();
    let city = response
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| requested_city.to_string());
    let country = sys
        .country
        .filter(|c| !c.trim().is_empty())
        .or_else(|| requested_country.map(str::to_string))
        .unwrap_or_default();

    let offset = response
        .timezone
        .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok())
        .unwrap_or(UtcOffset::UTC);

    let condition = response.weather.into_iter().next().unwrap_or_default();
    let wind = response.wind.unwrap_or_default();

    let rain = response.rain.and_then(|r| r.one_hour);
    let snow = response.snow.and_then(|s| s.one_hour);
    let precipitation = match (rain, snow) {
        (None, None) => None,
        (rain, snow) => Some(rain.unwrap_or(0.0) + snow.unwrap_or(0.0)),
    };

    let mut reading = Reading::new(city, country, timestamp, temperature, units);
    reading.feels_like = main.feels_like;
    reading.temp_min = main.temp_min;
    reading.temp_max = main.temp_max;
    reading.humidity = main.humidity.map(percentage);
    reading.pressure = main.pressure;
    reading.weather_summary = condition.main;
    reading.weather_detail = condition.description;
    reading.wind_speed = wind.speed;
    reading.wind_direction = wind.deg.map(|deg| deg.round().rem_euclid(360.0) as u16);
    reading.cloudiness = response.clouds.and_then(|c| c.all).map(percentage);
    reading.visibility = response.visibility.map(|v| v.max(0.0).round() as u32);
    reading.precipitation = precipitation;
    reading.sunrise = sys.sunrise.and_then(|ts| local_clock(ts, offset));
    reading.sunset = sys.sunset.and_then(|ts| local_clock(ts, offset));

    Ok(reading)
}
