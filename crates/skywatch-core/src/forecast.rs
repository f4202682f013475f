//! Typed 5-day / 3-hour forecast and its derived views.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use skywatch_types::Units;

/// Number of calendar days summarized by [`Forecast::daily_summaries`].
pub const FORECAST_DAYS: usize = 5;

/// Forecast entries per 24 hours (one every 3 hours).
pub const ENTRIES_PER_DAY: usize = 8;

/// Forecast response from `GET /forecast`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub city: Option<ForecastCity>,
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
    /// Units the entries were requested in. Not part of the provider
    /// payload; filled in by the client.
    #[serde(default)]
    pub units: Units,
}

/// Location block of a forecast response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    pub name: Option<String>,
    pub country: Option<String>,
    /// Shift from UTC in seconds.
    pub timezone: Option<i32>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// One 3-hour forecast slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Slot time as a unix timestamp (UTC).
    pub dt: i64,
    /// Slot time as `YYYY-MM-DD hh:mm:ss` (UTC).
    #[serde(default)]
    pub dt_txt: String,
    pub main: ForecastMain,
    #[serde(default)]
    pub weather: Vec<ForecastCondition>,
    #[serde(default)]
    pub wind: Option<ForecastWind>,
    #[serde(default)]
    pub clouds: Option<ForecastClouds>,
    #[serde(default)]
    pub visibility: Option<u32>,
    /// Probability of precipitation (0.0-1.0).
    #[serde(default)]
    pub pop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCondition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastWind {
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastClouds {
    #[serde(default)]
    pub all: Option<f64>,
}

impl ForecastEntry {
    /// Slot time, if `dt` is a valid timestamp.
    pub fn time(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.dt).ok()
    }

    /// Short condition label of the first weather block.
    pub fn summary(&self) -> Option<&str> {
        self.weather.first().and_then(|w| w.main.as_deref())
    }

    /// Free-text condition of the first weather block.
    pub fn description(&self) -> Option<&str> {
        self.weather.first().and_then(|w| w.description.as_deref())
    }

    fn is_midday(&self) -> bool {
        self.time()
            .is_some_and(|t| t.hour() == 12 && t.minute() == 0 && t.second() == 0)
    }
}

/// One calendar day of forecast slots.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    /// Calendar date (UTC).
    pub date: Date,
    /// Highest slot temperature of the day.
    pub high: f64,
    /// Lowest slot temperature of the day.
    pub low: f64,
    /// The 12:00 slot, or the middle slot when there is none.
    pub representative: ForecastEntry,
    /// Number of slots that fell on this date.
    pub entries: usize,
}

impl DailySummary {
    /// Spread between the daily high and low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl Forecast {
    /// Whether the forecast has no slots.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Group slots by calendar date and summarize the first five dates.
    pub fn daily_summaries(&self) -> Vec<DailySummary> {
        let mut days: BTreeMap<Date, Vec<&ForecastEntry>> = BTreeMap::new();
        for entry in &self.list {
            if let Some(time) = entry.time() {
                days.entry(time.date()).or_default().push(entry);
            }
        }

        days.into_iter()
            .take(FORECAST_DAYS)
            .filter_map(|(date, entries)| {
                let high = entries
                    .iter()
                    .map(|e| e.main.temp)
                    .fold(f64::NEG_INFINITY, f64::max);
                let low = entries
                    .iter()
                    .map(|e| e.main.temp)
                    .fold(f64::INFINITY, f64::min);
                let representative = entries
                    .iter()
                    .find(|e| e.is_midday())
                    .or_else(|| entries.get(entries.len() / 2))?;
                Some(DailySummary {
                    date,
                    high,
                    low,
                    representative: (*representative).clone(),
                    entries: entries.len(),
                })
            })
            .collect()
    }

    /// Slots whose time lies within `window` of `now`, in either direction.
    pub fn entries_near(&self, now: OffsetDateTime, window: Duration) -> Vec<&ForecastEntry> {
        self.list
            .iter()
            .filter(|entry| {
                entry
                    .time()
                    .is_some_and(|t| (t - now).unsigned_abs() <= window)
            })
            .collect()
    }

    /// The first `n` slots (8 slots cover the next 24 hours).
    pub fn next_entries(&self, n: usize) -> &[ForecastEntry] {
        &self.list[..n.min(self.list.len())]
    }
}
