//! Core primitives shared by the fedload crates.
//!
//! - [`retry`]: bounded retry with a fixed or exponential delay.
//! - [`flight`]: keyed single-flight map that de-duplicates concurrent work
//!   and caches successful results.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod flight;
pub mod retry;

pub use flight::FlightMap;
pub use retry::{RetryOutcome, RetryPolicy, retry};
