//! Summary statistics over a window of readings.
//!
//! Every aggregate is optional: a window without any humidity values simply
//! has no humidity statistics. An empty window yields the
//! [`WeatherStats::not_available`] record.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use skywatch_types::{Reading, Units};

/// How well a window is covered, based on one expected reading per hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    /// No readings at all.
    Missing,
}

impl DataQuality {
    /// Grade a coverage percentage.
    pub fn from_coverage(coverage: f64) -> Self {
        if coverage > 80.0 {
            DataQuality::Excellent
        } else if coverage > 60.0 {
            DataQuality::Good
        } else if coverage > 30.0 {
            DataQuality::Fair
        } else {
            DataQuality::Poor
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataQuality::Excellent => "Excellent",
            DataQuality::Good => "Good",
            DataQuality::Fair => "Fair",
            DataQuality::Poor => "Poor",
            DataQuality::Missing => "Missing",
        };
        f.write_str(label)
    }
}

/// Aggregated statistics for one location over `period_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStats {
    pub city: String,
    pub country: String,
    pub avg_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub temp_range: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
    pub pressure_avg: Option<f64>,
    pub wind_avg: Option<f64>,
    pub wind_min: Option<f64>,
    pub wind_max: Option<f64>,
    /// Most frequent condition; ties go to the one seen first.
    pub common_condition: Option<String>,
    /// Number of distinct conditions.
    pub condition_count: Option<usize>,
    pub total_readings: usize,
    pub period_days: u32,
    /// Units of every temperature and wind value above.
    pub units: Units,
    pub coverage_percentage: f64,
    pub data_quality: DataQuality,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Average, minimum and maximum of a non-empty series.
fn summarize(values: &[f64]) -> Option<(f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((sum / values.len() as f64, min, max))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent value and the number of distinct values.
fn modal(conditions: &[String]) -> Option<(String, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for condition in conditions {
        match counts.iter_mut().find(|(name, _)| *name == condition.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((condition.as_str(), 1)),
        }
    }
    let distinct = counts.len();
    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| (name.to_string(), distinct))
}

impl WeatherStats {
    /// The all-"N/A" record for a window without readings.
    pub fn not_available(city: &str, country: &str, days: u32) -> Self {
        Self {
            city: city.to_string(),
            country: country.to_string(),
            avg_temp: None,
            min_temp: None,
            max_temp: None,
            temp_range: None,
            humidity_avg: None,
            humidity_min: None,
            humidity_max: None,
            pressure_avg: None,
            wind_avg: None,
            wind_min: None,
            wind_max: None,
            common_condition: None,
            condition_count: None,
            total_readings: 0,
            period_days: days,
            units: Units::for_country(country),
            coverage_percentage: 0.0,
            data_quality: DataQuality::Missing,
            last_updated: None,
        }
    }

    /// Aggregate `readings` in the display units of `country`.
    pub fn from_readings(city: &str, country: &str, days: u32, readings: &[Reading]) -> Self {
        if readings.is_empty() {
            return Self::not_available(city, country, days);
        }

        let units = Units::for_country(country);
        let temps: Vec<f64> = readings.iter().map(|r| r.temperature_in(units)).collect();
        let humidities: Vec<f64> = readings
            .iter()
            .filter_map(|r| r.humidity.map(f64::from))
            .collect();
        let pressures: Vec<f64> = readings.iter().filter_map(|r| r.pressure).collect();
        let winds: Vec<f64> = readings
            .iter()
            .filter_map(|r| r.wind_speed_in(units))
            .collect();
        let conditions: Vec<String> = readings
            .iter()
            .filter_map(|r| r.weather_summary.as_deref().or(r.weather_detail.as_deref()))
            .filter(|c| !c.trim().is_empty())
            .map(title_case)
            .collect();

        let temp = summarize(&temps);
        let humidity = summarize(&humidities);
        let wind = summarize(&winds);
        let condition = modal(&conditions);

        let expected = f64::from(days.max(1)) * 24.0;
        let coverage = (readings.len() as f64 / expected * 100.0).min(100.0);

        Self {
            city: city.to_string(),
            country: country.to_string(),
            avg_temp: temp.map(|(avg, _, _)| round1(avg)),
            min_temp: temp.map(|(_, min, _)| round1(min)),
            max_temp: temp.map(|(_, _, max)| round1(max)),
            temp_range: temp.map(|(_, min, max)| round1(max - min)),
            humidity_avg: humidity.map(|(avg, _, _)| round1(avg)),
            humidity_min: humidity.map(|(_, min, _)| round1(min)),
            humidity_max: humidity.map(|(_, _, max)| round1(max)),
            pressure_avg: summarize(&pressures).map(|(avg, _, _)| round1(avg)),
            wind_avg: wind.map(|(avg, _, _)| round1(avg)),
            wind_min: wind.map(|(_, min, _)| round1(min)),
            wind_max: wind.map(|(_, _, max)| round1(max)),
            common_condition: condition.as_ref().map(|(name, _)| name.clone()),
            condition_count: condition.map(|(_, distinct)| distinct),
            total_readings: readings.len(),
            period_days: days,
            units,
            coverage_percentage: round1(coverage),
            data_quality: DataQuality::from_coverage(coverage),
            last_updated: Some(OffsetDateTime::now_utc()),
        }
    }
}

struct Value(Option<f64>, &'static str);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.1}{}", v, self.1),
            None => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for WeatherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.units.temperature_symbol();
        let w = self.units.wind_speed_symbol();
        writeln!(
            f,
            "{}, {} (last {} days, {} readings)",
            self.city, self.country, self.period_days, self.total_readings
        )?;
        writeln!(
            f,
            "  Temperature: avg {} / min {} / max {} / range {}",
            Value(self.avg_temp, t),
            Value(self.min_temp, t),
            Value(self.max_temp, t),
            Value(self.temp_range, t)
        )?;
        writeln!(
            f,
            "  Humidity:    avg {} / min {} / max {}",
            Value(self.humidity_avg, "%"),
            Value(self.humidity_min, "%"),
            Value(self.humidity_max, "%")
        )?;
        writeln!(f, "  Pressure:    avg {}", Value(self.pressure_avg, " hPa"))?;
        writeln!(
            f,
            "  Wind:        avg {} / min {} / max {}",
            Value(self.wind_avg, w),
            Value(self.wind_min, w),
            Value(self.wind_max, w)
        )?;
        match (&self.common_condition, self.condition_count) {
            (Some(condition), Some(count)) => {
                writeln!(f, "  Conditions:  mostly {} ({} distinct)", condition, count)?
            }
            _ => writeln!(f, "  Conditions:  N/A")?,
        }
        write!(
            f,
            "  Coverage:    {:.1}% ({})",
            self.coverage_percentage, self.data_quality
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64, units: Units, summary: Option<&str>) -> Reading {
        let mut r = Reading::new(
            "Knoxville",
            "US",
            OffsetDateTime::now_utc(),
            temperature,
            units,
        );
        r.weather_summary = summary.map(str::to_string);
        r
    }

    #[test]
    fn test_empty_window_is_not_available() {
        let stats = WeatherStats::from_readings("Paris", "FR", 7, &[]);
        assert_eq!(stats, WeatherStats::not_available("Paris", "FR", 7));
        assert_eq!(stats.data_quality, DataQuality::Missing);
        assert_eq!(stats.units, Units::Metric);
        assert!(stats.to_string().contains("avg N/A"));
    }

    #[test]
    fn test_temperature_aggregates() {
        let readings = vec![
            reading(70.0, Units::Imperial, Some("Clear")),
            reading(72.0, Units::Imperial, Some("Clouds")),
            reading(68.0, Units::Imperial, Some("Clear")),
        ];
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &readings);

        assert_eq!(stats.units, Units::Imperial);
        assert_eq!(stats.avg_temp, Some(70.0));
        assert_eq!(stats.min_temp, Some(68.0));
        assert_eq!(stats.max_temp, Some(72.0));
        assert_eq!(stats.temp_range, Some(4.0));
        assert_eq!(stats.common_condition.as_deref(), Some("Clear"));
        assert_eq!(stats.condition_count, Some(2));
        assert_eq!(stats.total_readings, 3);
        assert!(stats.humidity_avg.is_none());
    }

    #[test]
    fn test_mixed_units_are_converted() {
        let readings = vec![
            reading(20.0, Units::Metric, None),
            reading(68.0, Units::Imperial, None),
        ];
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &readings);
        assert_eq!(stats.avg_temp, Some(68.0));
        assert_eq!(stats.temp_range, Some(0.0));
        assert!(stats.common_condition.is_none());
    }

    #[test]
    fn test_modal_condition_tie_goes_to_first_seen() {
        let readings = vec![
            reading(50.0, Units::Imperial, Some("rain")),
            reading(50.0, Units::Imperial, Some("Snow")),
            reading(50.0, Units::Imperial, Some("RAIN")),
            reading(50.0, Units::Imperial, Some("snow")),
        ];
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &readings);
        assert_eq!(stats.common_condition.as_deref(), Some("Rain"));
        assert_eq!(stats.condition_count, Some(2));
    }

    #[test]
    fn test_detail_used_when_summary_missing() {
        let mut r = reading(50.0, Units::Imperial, None);
        r.weather_detail = Some("light rain".to_string());
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &[r]);
        assert_eq!(stats.common_condition.as_deref(), Some("Light Rain"));
    }

    #[test]
    fn test_coverage_and_quality() {
        let readings: Vec<Reading> = (0..3)
            .map(|_| reading(60.0, Units::Imperial, None))
            .collect();
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &readings);
        assert_eq!(stats.coverage_percentage, 12.5);
        assert_eq!(stats.data_quality, DataQuality::Poor);

        let readings: Vec<Reading> = (0..30)
            .map(|_| reading(60.0, Units::Imperial, None))
            .collect();
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &readings);
        assert_eq!(stats.coverage_percentage, 100.0);
        assert_eq!(stats.data_quality, DataQuality::Excellent);
    }

    #[test]
    fn test_quality_thresholds() {
        assert_eq!(DataQuality::from_coverage(80.0), DataQuality::Good);
        assert_eq!(DataQuality::from_coverage(80.1), DataQuality::Excellent);
        assert_eq!(DataQuality::from_coverage(61.0), DataQuality::Good);
        assert_eq!(DataQuality::from_coverage(45.0), DataQuality::Fair);
        assert_eq!(DataQuality::from_coverage(30.0), DataQuality::Poor);
    }

    #[test]
    fn test_humidity_and_wind_rounding() {
        let mut a = reading(60.0, Units::Imperial, None);
        a.humidity = Some(41);
        a.wind_speed = Some(3.2);
        let mut b = reading(60.0, Units::Imperial, None);
        b.humidity = Some(44);
        b.wind_speed = Some(4.0);
        let stats = WeatherStats::from_readings("Knoxville", "US", 1, &[a, b]);
        assert_eq!(stats.humidity_avg, Some(42.5));
        assert_eq!(stats.wind_min, Some(3.2));
        assert_eq!(stats.wind_avg, Some(3.6));
    }
}
