//! Error types for skywatch-core.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Counts against city |
//! |------------|----------|---------------------|
//! | [`Error::Http`] | Retry with backoff | No |
//! | [`Error::Status`] | Retry with backoff | Yes |
//! | [`Error::NotFound`] | Retry with backoff | Yes |
//! | [`Error::RateLimited`] | Wait the cool-down, then retry | Yes |
//! | [`Error::Unauthorized`] | Do not retry | No |
//! | [`Error::Parse`] | Do not retry | No |
//! | [`Error::InvalidInput`] | Do not retry | No |
//! | [`Error::Unresolvable`] | Do not retry | No |
//!
//! Transport failures are kept out of the per-city tally so that a network
//! outage does not blacklist every tracked city.

use thiserror::Error;

/// Errors that can occur while talking to the weather provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller supplied an unusable city or country.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider rejected the API key (HTTP 401).
    #[error("API key rejected by provider (HTTP 401)")]
    Unauthorized,

    /// The provider does not know the requested location (HTTP 404).
    #[error("Location not found: {location}")]
    NotFound { location: String },

    /// The provider throttled the client (HTTP 429).
    #[error("Rate limited by provider (HTTP 429)")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("Unexpected HTTP status {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    /// Transport failure: connection, TLS, timeout.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with JSON that lacks required fields.
    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// The city failed too often and is skipped without a request.
    #[error("Skipping persistently failing city: {city}")]
    Unresolvable { city: String },

    /// All attempts were used up.
    #[error("Giving up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },
}

impl Error {
    /// Whether this failure originated below HTTP (no usable response).
    ///
    /// The collector records these as `error` rather than `api_error`.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::RetriesExhausted { last, .. } => last.is_transport(),
            _ => false,
        }
    }

    /// Whether this failure should be tallied against the requested city.
    pub fn counts_against_city(&self) -> bool {
        match self {
            Error::NotFound { .. } | Error::Status { .. } | Error::RateLimited => true,
            Error::RetriesExhausted { last, .. } => last.counts_against_city(),
            _ => false,
        }
    }

    /// Whether another attempt could succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::NotFound { .. } | Error::RateLimited | Error::Status { .. }
        )
    }
}

/// Result type for skywatch-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = Error::NotFound {
            location: "Atlantis,GR".to_string(),
        };
        assert!(not_found.counts_against_city());
        assert!(!not_found.is_transport());
        assert!(not_found.is_retryable());

        assert!(!Error::Unauthorized.is_retryable());
        assert!(!Error::Unauthorized.counts_against_city());

        let parse = Error::Parse("missing main.temp".to_string());
        assert!(!parse.is_retryable());
        assert!(!parse.counts_against_city());
    }

    #[test]
    fn test_exhausted_delegates_to_last_error() {
        let exhausted = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::Status {
                status: 500,
                endpoint: "weather".to_string(),
            }),
        };
        assert!(exhausted.counts_against_city());
        assert!(!exhausted.is_transport());
        assert!(exhausted.to_string().contains("3 attempt(s)"));
        assert!(exhausted.to_string().contains("500"));

        let rate_limited = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::RateLimited),
        };
        assert!(rate_limited.counts_against_city());
        assert!(!rate_limited.is_transport());
    }
}
