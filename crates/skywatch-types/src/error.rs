//! Error types for parsing in skywatch-types.

use thiserror::Error;

/// Errors that can occur when parsing Skywatch value types from text.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Unknown unit system name.
    #[error("Unknown unit system: {0}")]
    UnknownUnits(String),

    /// Unknown request status label.
    #[error("Unknown request status: {0}")]
    UnknownStatus(String),
}

/// Result type alias using skywatch-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
