//! Client-side request throttle.
//!
//! Enforces a minimum interval between the start of two requests issued by
//! the same client. This is a plain spacing rule, not a token bucket.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Spaces requests at least `min_interval` apart.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with the given minimum spacing.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// The configured minimum spacing.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be issued, then record it.
    ///
    /// Concurrent callers are serialized: each one observes the slot taken
    /// by the previous caller.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!("Throttling request for {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
