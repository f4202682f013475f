//! Per-city failure tally.
//!
//! A city whose lookups keep failing is short-circuited once its tally
//! reaches the threshold, so a broken query stops costing requests. A
//! successful lookup clears the tally.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

/// Default number of failed calls after which a city is skipped.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// City names that never resolve.
const PLACEHOLDER_CITIES: &[&str] = &["testville", "demo city"];

/// Tracks failed calls per city (case-insensitive).
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    /// Create a tracker with the given threshold.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn key(city: &str) -> String {
        city.trim().to_lowercase()
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        // The map holds plain counters; a poisoned lock still has usable data
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one failed call for `city`, returning the new tally.
    pub fn register_failure(&self, city: &str) -> u32 {
        let mut counts = self.counts();
        let count = counts.entry(Self::key(city)).or_insert(0);
        *count += 1;
        debug!("Failure tally for {}: {}", city, count);
        *count
    }

    /// Clear the tally for `city`.
    pub fn reset(&self, city: &str) {
        self.counts().remove(&Self::key(city));
    }

    /// Clear every tally.
    pub fn clear(&self) {
        self.counts().clear();
    }

    /// Current tally for `city`.
    pub fn failure_count(&self, city: &str) -> u32 {
        self.counts().get(&Self::key(city)).copied().unwrap_or(0)
    }

    /// Whether `city` should be skipped without issuing a request.
    pub fn is_unresolvable(&self, city: &str) -> bool {
        let key = Self::key(city);
        PLACEHOLDER_CITIES.contains(&key.as_str()) || self.failure_count(&key) >= self.threshold
    }

    /// The configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_reached() {
        let tracker = FailureTracker::default();
        assert!(!tracker.is_unresolvable("Springfield"));

        tracker.register_failure("Springfield");
        tracker.register_failure("springfield");
        assert!(!tracker.is_unresolvable("Springfield"));

        assert_eq!(tracker.register_failure("SPRINGFIELD"), 3);
        assert!(tracker.is_unresolvable("Springfield"));
    }

    #[test]
    fn test_reset_clears_tally() {
        let tracker = FailureTracker::new(2);
        tracker.register_failure("Paris");
        tracker.register_failure("Paris");
        assert!(tracker.is_unresolvable("Paris"));

        tracker.reset("paris");
        assert_eq!(tracker.failure_count("Paris"), 0);
        assert!(!tracker.is_unresolvable("Paris"));
    }

    #[test]
    fn test_placeholder_cities_always_skipped() {
        let tracker = FailureTracker::default();
        assert!(tracker.is_unresolvable("Testville"));
        assert!(tracker.is_unresolvable("  Demo City "));
        assert!(!tracker.is_unresolvable("Denver"));
    }

    #[test]
    fn test_clear() {
        let tracker = FailureTracker::new(1);
        tracker.register_failure("Quito");
        tracker.register_failure("Cusco");
        tracker.clear();
        assert!(!tracker.is_unresolvable("Quito"));
        assert!(!tracker.is_unresolvable("Cusco"));
        assert_eq!(tracker.threshold(), 1);
    }
}
