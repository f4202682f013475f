//! Skywatch - scheduled weather collection and queries.
//!
//! Run with: `cargo run -p skywatch-service -- run`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use skywatch_core::{WeatherClient, WeatherProvider};
use skywatch_service::{
    Collector, CollectorSettings, Config, DEFAULT_QUEUE_CAPACITY, FetchQueue, TrackedLocation,
    get_weather_stats, seed_locations,
};
use skywatch_store::{DEFAULT_LOCATIONS_CSV, DEFAULT_READINGS_CSV, LocationUpdate, Store};
use skywatch_types::Units;

/// Skywatch - collect, store and summarize weather for tracked locations.
#[derive(Parser, Debug)]
#[command(name = "skywatch")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Read configuration from a TOML file. Without it the default config
    /// file is used when present, then the environment.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector until interrupted.
    Run,

    /// Run a single collection cycle and exit.
    Collect,

    /// Show current conditions for a location.
    Current {
        city: String,
        country: Option<String>,
        /// Unit system (metric, imperial, standard).
        #[arg(short, long)]
        units: Option<Units>,
    },

    /// Show the five-day forecast for a location.
    Forecast {
        city: String,
        country: Option<String>,
        #[arg(short, long)]
        units: Option<Units>,
    },

    /// Summary statistics from stored readings.
    Stats {
        city: String,
        country: String,
        /// Window in days.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Start collecting a location.
    Track {
        city: String,
        country: String,
        #[arg(long)]
        state: Option<String>,
        /// IANA timezone name.
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Stop collecting a location. Its readings are kept.
    Untrack { city: String, country: String },

    /// List known locations.
    Locations,

    /// Show recent failed requests.
    Errors {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Export tables to CSV.
    Export {
        /// Readings output file.
        #[arg(long, default_value = DEFAULT_READINGS_CSV)]
        readings: PathBuf,
        /// Locations output file.
        #[arg(long, default_value = DEFAULT_LOCATIONS_CSV)]
        locations: PathBuf,
    },
}

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::resolve(args.config.as_deref())?;
    if let Some(db_path) = &args.database {
        config.db_path = db_path.clone();
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.log_level);

    info!("Opening database at {}", config.db_path.display());
    let store = Store::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let client = WeatherClient::new(config.client_config())?;
    let provider: Arc<dyn WeatherProvider> = Arc::new(client);

    match args.command {
        Command::Run => {
            seed_locations(&store, &config.tracked_locations)?;
            let collector = Arc::new(Collector::new(
                provider,
                store,
                CollectorSettings::from_config(&config),
            ));
            let cancel = CancellationToken::new();
            let handle = Arc::clone(&collector).spawn(cancel.clone());

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            cancel.cancel();
            handle.await??;
        }
        Command::Collect => {
            seed_locations(&store, &config.tracked_locations)?;
            let collector = Collector::new(provider, store, CollectorSettings::from_config(&config));
            let summary = collector
                .collect_all_locations(&CancellationToken::new())
                .await?;
            if args.json {
                print_json(&summary)?;
            } else {
                println!(
                    "Collected {} location(s): {} succeeded, {} failed",
                    summary.attempted, summary.succeeded, summary.failed
                );
            }
        }
        Command::Current {
            city,
            country,
            units,
        } => {
            let cancel = CancellationToken::new();
            let (queue, _worker) =
                FetchQueue::spawn_recording(provider, store, DEFAULT_QUEUE_CAPACITY, cancel);
            let units = units.unwrap_or_else(|| Units::for_country(country.as_deref().unwrap_or("")));
            let reading = queue
                .current_weather(&city, country.as_deref(), units)
                .await?;
            queue.shutdown();
            if args.json {
                print_json(&reading)?;
            } else {
                println!("{}", reading);
                if let (Some(sunrise), Some(sunset)) = (&reading.sunrise, &reading.sunset) {
                    println!("Sunrise {}, sunset {}", sunrise, sunset);
                }
            }
        }
        Command::Forecast {
            city,
            country,
            units,
        } => {
            let cancel = CancellationToken::new();
            let (queue, _worker) = FetchQueue::spawn(provider, DEFAULT_QUEUE_CAPACITY, cancel);
            let units = units.unwrap_or_else(|| Units::for_country(country.as_deref().unwrap_or("")));
            let forecast = queue.forecast(&city, country.as_deref(), units).await?;
            queue.shutdown();
            if args.json {
                print_json(&forecast)?;
            } else {
                let symbol = forecast.units.temperature_symbol();
                for day in forecast.daily_summaries() {
                    println!(
                        "{}  high {:.1}{}  low {:.1}{}  {}",
                        day.date,
                        day.high,
                        symbol,
                        day.low,
                        symbol,
                        day.representative.description().unwrap_or("-"),
                    );
                }
            }
        }
        Command::Stats {
            city,
            country,
            days,
        } => {
            let stats = get_weather_stats(&store, provider.as_ref(), &city, &country, days).await;
            if args.json {
                print_json(&stats)?;
            } else {
                println!("{}", stats);
            }
        }
        Command::Track {
            city,
            country,
            state,
            timezone,
        } => {
            let mut update = LocationUpdate::new().active(true);
            if let Some(state) = state {
                update = update.state(state);
            }
            update = update.timezone(timezone.unwrap_or_else(|| config.default_timezone.clone()));
            let location = TrackedLocation::new(city, country);
            let location = store.update_location(&location.city, &location.country, &update)?;
            println!("Tracking {}", location.label());
        }
        Command::Untrack { city, country } => {
            let location = TrackedLocation::new(city, country);
            store.set_location_active(&location.city, &location.country, false)?;
            println!("Stopped tracking {}, {}", location.city, location.country);
        }
        Command::Locations => {
            let locations = store.list_locations()?;
            if args.json {
                print_json(&locations)?;
            } else if locations.is_empty() {
                println!("No locations tracked");
            } else {
                for location in locations {
                    let marker = if location.is_active { "*" } else { " " };
                    println!(
                        "{} {:<30} {}",
                        marker,
                        location.label(),
                        location.timezone.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Command::Errors { limit } => {
            let errors = store.get_error_log(limit)?;
            let summary = store.request_summary(None)?;
            if args.json {
                print_json(&errors)?;
            } else {
                println!(
                    "{} request(s), {:.1}% successful",
                    summary.total,
                    summary.success_rate()
                );
                for entry in errors {
                    println!(
                        "{}  {:<14} {}, {}  {}",
                        entry.timestamp,
                        entry.status.as_str(),
                        entry.city.as_deref().unwrap_or("?"),
                        entry.country.as_deref().unwrap_or("?"),
                        entry.error.as_deref().unwrap_or(""),
                    );
                }
            }
        }
        Command::Export {
            readings,
            locations,
        } => {
            if store.export_readings_to_csv(&readings)? {
                println!("Wrote {}", readings.display());
            } else {
                println!("No readings to export");
            }
            if store.export_locations_to_csv(&locations)? {
                println!("Wrote {}", locations.display());
            } else {
                println!("No locations to export");
            }
        }
    }

    Ok(())
}
