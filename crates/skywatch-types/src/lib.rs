//! Shared record types for the Skywatch weather collector.
//!
//! This crate holds the provider-agnostic pieces that every other Skywatch
//! crate agrees on: the normalized [`Reading`], the [`Units`] a value was
//! measured in, and the [`RequestStatus`] labels written to the request log.
//!
//! # Example
//!
//! ```
//! use skywatch_types::{Reading, Units};
//! use time::OffsetDateTime;
//!
//! let reading = Reading::new("Knoxville", "US", OffsetDateTime::now_utc(), 71.6, Units::Imperial);
//! let celsius = reading.temperature_in(Units::Metric);
//! assert!((celsius - 22.0).abs() < 0.01);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Reading, RequestStatus, Units};
