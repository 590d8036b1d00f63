//! Proxy Checker
//!
//! Routes one probe request through each proxy in a list and classifies
//! what happened: working, blocked, invalid, timed out or errored.
//! Probes run concurrently up to a configured ceiling and the final report
//! is sorted deterministically regardless of completion order.

pub mod error;
pub mod proxy;

pub use error::ConfigError;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
