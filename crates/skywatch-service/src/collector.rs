//! Background data collector.
//!
//! One collection cycle walks the active locations in insertion order,
//! fetches current conditions for each, stores the reading and appends one
//! request-log row per location. A failing location never stops the cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use skywatch_core::WeatherProvider;
use skywatch_core::util::location_query;
use skywatch_store::{Location, Store};
use skywatch_types::{Reading, RequestStatus, Units};

use crate::config::Config;

/// Collector lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    Running,
    Stopped,
}

impl CollectorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CollectorState::Running,
            2 => CollectorState::Stopped,
            _ => CollectorState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CollectorState::Idle => 0,
            CollectorState::Running => 1,
            CollectorState::Stopped => 2,
        }
    }
}

/// Shared, lock-free view of the collector.
#[derive(Debug)]
pub struct CollectorStatus {
    state: AtomicU8,
    /// Unix timestamp of the last start, 0 before the first.
    started_at: AtomicI64,
    cycles: AtomicU64,
}

impl Default for CollectorStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(CollectorState::Idle.as_u8()),
            started_at: AtomicI64::new(0),
            cycles: AtomicU64::new(0),
        }
    }
}

impl CollectorStatus {
    pub fn state(&self) -> CollectorState {
        CollectorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == CollectorState::Running
    }

    /// When the collector last entered `Running`.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        match self.started_at.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
        }
    }

    /// Completed collection cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Move to `Running` unless already there. Returns whether this call
    /// made the transition.
    fn try_start(&self) -> bool {
        let running = CollectorState::Running.as_u8();
        let started = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != running).then_some(running)
            })
            .is_ok();
        if started {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            self.started_at.store(now, Ordering::SeqCst);
        }
        started
    }

    fn set_state(&self, state: CollectorState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// Outcome of one pass over the active locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleSummary {
    fn record(&mut self, status: RequestStatus) {
        self.attempted += 1;
        if status.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Collector timing and unit settings.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Time between the start of two cycles.
    pub interval: Duration,
    /// Pause between two locations of one cycle.
    pub location_delay: Duration,
    /// Per-location unit overrides keyed by `(city, country)`.
    pub units: HashMap<(String, String), Units>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            location_delay: Duration::from_secs(1),
            units: HashMap::new(),
        }
    }
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        let units = config
            .tracked_locations
            .iter()
            .map(|loc| ((loc.city.clone(), loc.country.clone()), loc.units()))
            .collect();
        Self {
            interval: config.collection_interval(),
            location_delay: config.location_delay(),
            units,
        }
    }

    /// Units to request for a location.
    pub fn units_for(&self, city: &str, country: &str) -> Units {
        self.units
            .get(&(city.to_string(), country.to_string()))
            .copied()
            .unwrap_or_else(|| Units::for_country(country))
    }
}

/// Collector errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to list locations: {0}")]
    Store(#[from] skywatch_store::Error),
    #[error("Collector is already running")]
    AlreadyRunning,
}

/// Scheduled collector over the tracked locations.
pub struct Collector {
    provider: Arc<dyn WeatherProvider>,
    store: Store,
    settings: CollectorSettings,
    status: Arc<CollectorStatus>,
}

impl Collector {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Store,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            status: Arc::new(CollectorStatus::default()),
        }
    }

    pub fn status(&self) -> Arc<CollectorStatus> {
        Arc::clone(&self.status)
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Run in a background task until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), CollectorError>> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run one cycle immediately, then one per interval, until `cancel` fires.
    ///
    /// Cancellation is observed between locations and while waiting for the
    /// next tick; a request already in flight runs to completion.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), CollectorError> {
        if !self.status.try_start() {
            return Err(CollectorError::AlreadyRunning);
        }
        info!(
            "Collector started (interval: {}s)",
            self.settings.interval.as_secs()
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.collect_all_locations(&cancel).await {
                Ok(summary) => {
                    self.status.cycles.fetch_add(1, Ordering::SeqCst);
                    info!(
                        "Collection cycle finished: {} attempted, {} succeeded, {} failed",
                        summary.attempted, summary.succeeded, summary.failed
                    );
                }
                Err(e) => error!("Collection cycle aborted: {}", e),
            }
        }

        self.status.set_state(CollectorState::Stopped);
        info!("Collector stopped after {} cycle(s)", self.status.cycles());
        Ok(())
    }

    /// One pass over every active location.
    pub async fn collect_all_locations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleSummary, CollectorError> {
        let locations = self.store.active_locations()?;
        let mut summary = CycleSummary::default();

        if locations.is_empty() {
            info!("No active locations to collect");
            return Ok(summary);
        }

        for (i, location) in locations.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("Cycle cancelled before {}", location.label());
                break;
            }
            if i > 0 && !self.settings.location_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.location_delay) => {}
                }
            }
            summary.record(self.collect_for_location(location).await);
        }

        Ok(summary)
    }

    /// Fetch, store and log one location.
    pub async fn collect_for_location(&self, location: &Location) -> RequestStatus {
        let units = self.settings.units_for(&location.city, &location.country);
        let (status, _) = fetch_and_store(
            self.provider.as_ref(),
            &self.store,
            &location.city,
            &location.country,
            units,
            Some(location.id),
        )
        .await;
        status
    }
}

/// Fetch current weather, persist it and append the request-log row.
///
/// Returns the logged status and the reading when one was produced.
pub async fn fetch_and_store(
    provider: &dyn WeatherProvider,
    store: &Store,
    city: &str,
    country: &str,
    units: Units,
    location_id: Option<i64>,
) -> (RequestStatus, Option<Reading>) {
    let (status, result) =
        fetch_and_record(provider, store, city, Some(country), units, location_id).await;
    (status, result.ok())
}

/// Same as [`fetch_and_store`], but hands the provider error back instead of
/// dropping it once logged.
pub(crate) async fn fetch_and_record(
    provider: &dyn WeatherProvider,
    store: &Store,
    city: &str,
    country: Option<&str>,
    units: Units,
    location_id: Option<i64>,
) -> (RequestStatus, skywatch_core::Result<Reading>) {
    let url = provider.endpoint("weather");
    let started = Instant::now();
    let result = provider.current_weather(city, country, units).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(reading) => {
            if store.insert_reading(&reading) {
                debug!("Collected {}", reading);
                store.log_request(&url, location_id, RequestStatus::Success, None, Some(latency_ms));
                (RequestStatus::Success, Ok(reading))
            } else {
                store.log_request(
                    &url,
                    location_id,
                    RequestStatus::InsertFailed,
                    Some("reading could not be stored"),
                    Some(latency_ms),
                );
                (RequestStatus::InsertFailed, Ok(reading))
            }
        }
        Err(e) => {
            let status = if e.is_transport() {
                RequestStatus::Error
            } else {
                RequestStatus::ApiError
            };
            warn!("Failed to collect {}: {}", location_query(city, country), e);
            store.log_request(
                &url,
                location_id,
                status,
                Some(&e.to_string()),
                Some(latency_ms),
            );
            (status, Err(e))
        }
    }
}
