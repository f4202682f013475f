//! Collector configuration.
//!
//! Configuration is read once at start-up from the process environment (a
//! `.env` file in the working directory is honored) and then passed by
//! reference to the client, the store and the collector. The same structure
//! can be written to and read from a TOML file.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `WEATHER_API_KEY` | yes | |
//! | `DB_PATH` | yes | |
//! | `LOG_LEVEL` | no | `info` |
//! | `MAX_RETRIES` | no | `3` |
//! | `REQUEST_TIMEOUT` | no | `10` (seconds) |
//! | `BASE_URL` | no | `https://api.openweathermap.org/data/2.5` |
//! | `DEFAULT_TIMEZONE` | no | `America/New_York` |
//! | `COLLECTION_INTERVAL_MINUTES` | no | `30` |
//! | `TRACKED_LOCATIONS` | no | empty; `City:CC,City:CC` |

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use skywatch_core::util::normalize_city;
use skywatch_core::{ClientConfig, DEFAULT_BASE_URL, RetryPolicy};
use skywatch_types::Units;

/// Minimum and maximum attempt budget.
pub const MIN_RETRIES: u32 = 1;
pub const MAX_RETRIES: u32 = 10;

/// Bounds for the per-request timeout, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 120;

/// Collector configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider API key.
    pub api_key: String,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Default tracing directive when `RUST_LOG` is not set.
    pub log_level: String,
    /// Attempts per provider call.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Provider base URL.
    pub base_url: String,
    /// IANA timezone used when a location has none.
    pub default_timezone: String,
    /// Minutes between two collection cycles.
    pub collection_interval_minutes: u64,
    /// Pause between two locations of one cycle, in milliseconds.
    pub location_delay_ms: u64,
    /// Locations seeded into the store at start-up.
    pub tracked_locations: Vec<TrackedLocation>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            db_path: skywatch_store::default_db_path(),
            log_level: "info".to_string(),
            max_retries: 3,
            request_timeout_secs: 10,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timezone: "America/New_York".to_string(),
            collection_interval_minutes: 30,
            location_delay_ms: 1000,
            tracked_locations: Vec::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("db_path", &self.db_path)
            .field("log_level", &self.log_level)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("base_url", &self.base_url)
            .field("default_timezone", &self.default_timezone)
            .field(
                "collection_interval_minutes",
                &self.collection_interval_minutes,
            )
            .field("location_delay_ms", &self.location_delay_ms)
            .field("tracked_locations", &self.tracked_locations)
            .finish()
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            value: value.clone(),
            message: e.to_string(),
        })
}

impl Config {
    /// Build the configuration from the process environment and `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use skywatch_service::Config;
    ///
    /// let vars = HashMap::from([
    ///     ("WEATHER_API_KEY", "abc123"),
    ///     ("DB_PATH", "/tmp/weather.db"),
    ///     ("TRACKED_LOCATIONS", "Knoxville:US,Paris:FR"),
    /// ]);
    /// let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.max_retries, 3);
    /// assert_eq!(config.tracked_locations.len(), 2);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.api_key = get("WEATHER_API_KEY")
            .ok_or(ConfigError::MissingVar("WEATHER_API_KEY"))?
            .trim()
            .to_string();
        config.db_path = get("DB_PATH")
            .map(|p| PathBuf::from(p.trim()))
            .ok_or(ConfigError::MissingVar("DB_PATH"))?;

        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level.trim().to_lowercase();
        }
        if let Some(value) = get("MAX_RETRIES") {
            config.max_retries = parse_var("MAX_RETRIES", value)?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT") {
            config.request_timeout_secs = parse_var("REQUEST_TIMEOUT", value)?;
        }
        if let Some(url) = get("BASE_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(tz) = get("DEFAULT_TIMEZONE") {
            config.default_timezone = tz.trim().to_string();
        }
        if let Some(value) = get("COLLECTION_INTERVAL_MINUTES") {
            config.collection_interval_minutes = parse_var("COLLECTION_INTERVAL_MINUTES", value)?;
        }
        if let Some(value) = get("TRACKED_LOCATIONS") {
            config.tracked_locations = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| parse_var::<TrackedLocation>("TRACKED_LOCATIONS", entry.to_string()))
                .collect::<Result<_, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        config.tracked_locations = config
            .tracked_locations
            .into_iter()
            .map(TrackedLocation::normalized)
            .collect();
        Ok(config)
    }

    /// Load the file at `path`, or the default config path when it exists,
    /// falling back to the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_validated(path),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::load_validated(default_path)
                } else {
                    Self::from_env()
                }
            }
        }
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load and validate a TOML file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, collecting every problem.
    ///
    /// This checks:
    /// - API key and database path are not empty
    /// - Retries are within 1-10 and the timeout within 1-120 seconds
    /// - The collection interval is at least one minute
    /// - The base URL is an http(s) URL
    /// - Tracked locations have a city, a two-letter country, and no duplicates
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.to_string(),
                message,
            })
        };

        if self.api_key.trim().is_empty() {
            push("api_key", "API key cannot be empty".to_string());
        }
        if self.db_path.as_os_str().is_empty() {
            push("db_path", "database path cannot be empty".to_string());
        }
        if !(MIN_RETRIES..=MAX_RETRIES).contains(&self.max_retries) {
            push(
                "max_retries",
                format!(
                    "{} is out of range ({}-{})",
                    self.max_retries, MIN_RETRIES, MAX_RETRIES
                ),
            );
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.request_timeout_secs) {
            push(
                "request_timeout_secs",
                format!(
                    "{} seconds is out of range ({}-{})",
                    self.request_timeout_secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS
                ),
            );
        }
        if self.collection_interval_minutes == 0 {
            push(
                "collection_interval_minutes",
                "interval must be at least 1 minute".to_string(),
            );
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            push(
                "base_url",
                format!("'{}' must start with http:// or https://", self.base_url),
            );
        }

        let mut seen = HashSet::new();
        for (i, location) in self.tracked_locations.iter().enumerate() {
            let prefix = format!("tracked_locations[{}]", i);
            for error in location.validate(&prefix) {
                push(&error.field, error.message);
            }
            let key = (
                location.city.to_lowercase(),
                location.country.to_uppercase(),
            );
            if !seen.insert(key) {
                push(
                    &prefix,
                    format!("duplicate location '{}'", location),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Settings for the weather client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_key.clone())
            .base_url(self.base_url.clone())
            .timeout(self.request_timeout())
            .retry(RetryPolicy::new(self.max_retries))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_minutes * 60)
    }

    pub fn location_delay(&self) -> Duration {
        Duration::from_millis(self.location_delay_ms)
    }
}

/// A location listed in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedLocation {
    pub city: String,
    pub country: String,
    /// Overrides the per-country unit default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
}

impl TrackedLocation {
    /// A location with the city title-cased and the country upper-cased.
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
            units: None,
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            city: normalize_city(&self.city),
            country: self.country.trim().to_ascii_uppercase(),
            units: self.units,
        }
    }

    /// Units to request: the override, or imperial for US and metric elsewhere.
    pub fn units(&self) -> Units {
        self.units
            .unwrap_or_else(|| Units::for_country(&self.country))
    }

    fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.city.trim().is_empty() {
            errors.push(ValidationError {
                field: format!("{}.city", prefix),
                message: "city cannot be empty".to_string(),
            });
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(ValidationError {
                field: format!("{}.country", prefix),
                message: format!(
                    "'{}' is not a two-letter country code",
                    self.country
                ),
            });
        }
        errors
    }
}

impl fmt::Display for TrackedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.city, self.country)
    }
}

impl FromStr for TrackedLocation {
    type Err = String;

    /// Parse `City:CC`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (city, country) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected 'City:CC', got '{}'", s))?;
        Ok(Self::new(city, country))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value '{value}' for {name}: {message}")]
    InvalidVar {
        name: &'static str,
        value: String,
        message: String,
    },
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `max_retries` or `tracked_locations[0].country`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skywatch")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![("WEATHER_API_KEY", "secret"), ("DB_PATH", "/tmp/weather.db")]
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&required())).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.db_path, PathBuf::from("/tmp/weather.db"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.default_timezone, "America/New_York");
        assert_eq!(config.collection_interval(), Duration::from_secs(30 * 60));
        assert_eq!(config.location_delay(), Duration::from_secs(1));
        assert!(config.tracked_locations.is_empty());
    }

    #[test]
    fn test_missing_required_vars() {
        let err = Config::from_lookup(lookup(&[("DB_PATH", "/tmp/w.db")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("WEATHER_API_KEY")));

        let err = Config::from_lookup(lookup(&[("WEATHER_API_KEY", "k"), ("DB_PATH", "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DB_PATH")));
    }

    #[test]
    fn test_overrides_and_tracked_locations() {
        let mut vars = required();
        vars.extend([
            ("LOG_LEVEL", "DEBUG"),
            ("MAX_RETRIES", "5"),
            ("REQUEST_TIMEOUT", "20"),
            ("BASE_URL", "http://localhost:9000/"),
            ("COLLECTION_INTERVAL_MINUTES", "15"),
            ("TRACKED_LOCATIONS", "Knoxville:US, Paris:fr,,"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.collection_interval_minutes, 15);
        assert_eq!(
            config.tracked_locations,
            vec![
                TrackedLocation::new("Knoxville", "US"),
                TrackedLocation::new("Paris", "FR"),
            ]
        );
        assert_eq!(config.tracked_locations[0].units(), Units::Imperial);
        assert_eq!(config.tracked_locations[1].units(), Units::Metric);
    }

    #[test]
    fn test_tracked_locations_normalized() {
        let mut vars = required();
        vars.push(("TRACKED_LOCATIONS", " knoxville : us ,SÃO PAULO:br"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.tracked_locations[0].city, "Knoxville");
        assert_eq!(config.tracked_locations[0].country, "US");
        assert_eq!(config.tracked_locations[1].city, "São Paulo");
        assert_eq!(config.tracked_locations[1].country, "BR");
    }

    #[test]
    fn test_loaded_locations_normalized() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
api_key = "secret"
db_path = "/tmp/weather.db"

[[tracked_locations]]
city = "new york"
country = "us"
"#,
        )
        .unwrap();

        let config = Config::resolve(Some(config_path.as_path())).unwrap();
        assert_eq!(
            config.tracked_locations,
            vec![TrackedLocation::new("New York", "US")]
        );
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = required();
        vars.push(("MAX_RETRIES", "many"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "MAX_RETRIES", .. }));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = Config {
            api_key: String::new(),
            max_retries: 0,
            request_timeout_secs: 500,
            collection_interval_minutes: 0,
            tracked_locations: vec![
                TrackedLocation::new("Knoxville", "USA"),
                TrackedLocation::new("Paris", "FR"),
                TrackedLocation::new("paris", "fr"),
            ],
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"api_key"));
                assert!(fields.contains(&"max_retries"));
                assert!(fields.contains(&"request_timeout_secs"));
                assert!(fields.contains(&"collection_interval_minutes"));
                assert!(fields.contains(&"tracked_locations[0].country"));
                assert!(fields.contains(&"tracked_locations[2]"));
                assert_eq!(errors.len(), 6);
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_tracked_location() {
        let mut vars = required();
        vars.push(("TRACKED_LOCATIONS", "Knoxville"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("City:CC"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::from_lookup(lookup(&required())).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::from_lookup(lookup(&required())).unwrap();
        config.tracked_locations = vec![TrackedLocation {
            city: "Bergen".to_string(),
            country: "NO".to_string(),
            units: Some(Units::Standard),
        }];

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_client_config_carries_settings() {
        let mut vars = required();
        vars.push(("MAX_RETRIES", "4"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        let client = config.client_config();
        assert_eq!(client.retry.max_attempts, 4);
        assert_eq!(client.timeout, Duration::from_secs(10));
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }
}
