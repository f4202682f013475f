//! Bounded queue of on-demand fetches.
//!
//! A single worker task owns the provider and serves jobs in submission
//! order. Callers get their answer over a oneshot channel. Submitting to a
//! full or shut-down queue fails immediately instead of spawning more work.
//!
//! A queue started with [`FetchQueue::spawn_recording`] also stores every
//! current-conditions reading it serves and writes a request-log row for
//! each lookup, the same as a collection cycle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use skywatch_core::{Forecast, WeatherProvider};
use skywatch_store::Store;
use skywatch_types::{Reading, Units};

use crate::collector::fetch_and_record;

/// Default number of jobs that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Fetch queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Fetch queue is shut down")]
    Closed,
    #[error("Fetch queue is full")]
    Full,
    #[error(transparent)]
    Provider(#[from] skywatch_core::Error),
}

enum Job {
    Current {
        city: String,
        country: Option<String>,
        units: Units,
        reply: oneshot::Sender<skywatch_core::Result<Reading>>,
    },
    Forecast {
        city: String,
        country: Option<String>,
        units: Units,
        reply: oneshot::Sender<skywatch_core::Result<Forecast>>,
    },
}

/// Handle for submitting fetches to the worker.
#[derive(Clone)]
pub struct FetchQueue {
    tx: mpsc::Sender<Job>,
    cancel: CancellationToken,
}

impl FetchQueue {
    /// Start the worker task.
    pub fn spawn(
        provider: Arc<dyn WeatherProvider>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        Self::start(provider, None, capacity, cancel)
    }

    /// Start a worker that persists and logs current-conditions lookups.
    pub fn spawn_recording(
        provider: Arc<dyn WeatherProvider>,
        store: Store,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        Self::start(provider, Some(store), capacity, cancel)
    }

    fn start(
        provider: Arc<dyn WeatherProvider>,
        store: Option<Store>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(provider, store, rx, cancel.clone()));
        (Self { tx, cancel }, worker)
    }

    /// Current conditions for a location.
    pub async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Reading, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Current {
            city: city.to_string(),
            country: country.map(String::from),
            units,
            reply,
        })?;
        rx.await
            .map_err(|_| QueueError::Closed)?
            .map_err(QueueError::from)
    }

    /// Five-day forecast for a location.
    pub async fn forecast(
        &self,
        city: &str,
        country: Option<&str>,
        units: Units,
    ) -> Result<Forecast, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Forecast {
            city: city.to_string(),
            country: country.map(String::from),
            units,
            reply,
        })?;
        rx.await
            .map_err(|_| QueueError::Closed)?
            .map_err(QueueError::from)
    }

    /// Stop the worker; queued jobs are dropped and their callers see
    /// [`QueueError::Closed`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    fn submit(&self, job: Job) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Closed);
        }
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

async fn run_worker(
    provider: Arc<dyn WeatherProvider>,
    store: Option<Store>,
    mut rx: mpsc::Receiver<Job>,
    cancel: CancellationToken,
) {
    debug!("Fetch queue worker started");
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Current {
                city,
                country,
                units,
                reply,
            } => {
                let result = match &store {
                    Some(store) => {
                        let location_id = country.as_deref().and_then(|country| {
                            store
                                .get_location_id(city.trim(), country.trim())
                                .ok()
                                .flatten()
                        });
                        let (_, result) = fetch_and_record(
                            provider.as_ref(),
                            store,
                            &city,
                            country.as_deref(),
                            units,
                            location_id,
                        )
                        .await;
                        result
                    }
                    None => {
                        provider
                            .current_weather(&city, country.as_deref(), units)
                            .await
                    }
                };
                // The caller may have given up waiting.
                let _ = reply.send(result);
            }
            Job::Forecast {
                city,
                country,
                units,
                reply,
            } => {
                let result = provider
                    .five_day_forecast(&city, country.as_deref(), units)
                    .await;
                let _ = reply.send(result);
            }
        }
    }
    rx.close();
    info!("Fetch queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use skywatch_core::{MockFailure, MockProvider};

    #[tokio::test]
    async fn test_jobs_are_answered() {
        let provider = Arc::new(MockProvider::new().with_temperature(10.0));
        let (queue, worker) = FetchQueue::spawn(provider.clone(), 4, CancellationToken::new());

        let reading = queue
            .current_weather("paris", Some("fr"), Units::Metric)
            .await
            .unwrap();
        assert_eq!(reading.city, "Paris");
        assert_eq!(reading.country, "FR");
        assert_eq!(reading.temperature, 10.0);

        let forecast = queue
            .forecast("Paris", Some("FR"), Units::Metric)
            .await
            .unwrap();
        assert_eq!(forecast.units, Units::Metric);
        assert_eq!(provider.call_count(), 2);

        queue.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_error_is_forwarded() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_city("Atlantis", MockFailure::NotFound);
        let (queue, _worker) = FetchQueue::spawn(provider, 4, CancellationToken::new());

        let err = queue
            .current_weather("Atlantis", None, Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Provider(skywatch_core::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_recording_queue_stores_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("weather.db")).unwrap();
        let location = store.add_location("Paris", "FR").unwrap();
        let provider = Arc::new(MockProvider::new().with_temperature(12.0));
        let (queue, _worker) = FetchQueue::spawn_recording(
            provider,
            store.clone(),
            4,
            CancellationToken::new(),
        );

        let reading = queue
            .current_weather("paris", Some("fr"), Units::Metric)
            .await
            .unwrap();

        assert_eq!(reading.temperature, 12.0);
        assert_eq!(store.count_readings(Some(("Paris", "FR"))).unwrap(), 1);
        let log = store.request_log(5).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, skywatch_types::RequestStatus::Success);
        assert_eq!(log[0].location_id, Some(location.id));
    }

    #[tokio::test]
    async fn test_recording_queue_logs_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("weather.db")).unwrap();
        let provider = Arc::new(MockProvider::new());
        provider.fail_city("Atlantis", MockFailure::NotFound);
        let (queue, _worker) = FetchQueue::spawn_recording(
            provider,
            store.clone(),
            4,
            CancellationToken::new(),
        );

        let err = queue
            .current_weather("Atlantis", None, Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueueError::Provider(skywatch_core::Error::NotFound { .. })
        ));
        assert_eq!(store.count_readings(None).unwrap(), 0);
        let errors = store.get_error_log(5).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].status, skywatch_types::RequestStatus::ApiError);
        assert!(errors[0].city.is_none());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let provider = Arc::new(MockProvider::new());
        let (queue, worker) = FetchQueue::spawn(provider.clone(), 4, CancellationToken::new());
        queue.shutdown();
        worker.await.unwrap();

        assert!(queue.is_closed());
        let err = queue
            .current_weather("Paris", Some("FR"), Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        // No worker drains this channel.
        let (tx, _rx) = mpsc::channel(1);
        let queue = FetchQueue {
            tx,
            cancel: CancellationToken::new(),
        };
        let (reply, _) = oneshot::channel();
        queue
            .submit(Job::Current {
                city: "Paris".to_string(),
                country: None,
                units: Units::Metric,
                reply,
            })
            .unwrap();

        let err = queue
            .current_weather("Paris", None, Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Full));
    }
}
