//! Error types for building and validating a checker run

use thiserror::Error;

/// Reasons a batch cannot be started.
///
/// Per-proxy failures never show up here; they become
/// [`ResultState::Error`](crate::proxy::ResultState::Error) rows in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The target URL could not be parsed.
    #[error("invalid target url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP method is not a valid token.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A configured status code is outside 100..=999.
    #[error("invalid HTTP status code: {0}")]
    InvalidStatus(u16),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// The gate cannot hand out more permits than this.
    #[error("concurrency {requested} exceeds the maximum of {max}")]
    ConcurrencyTooLarge { requested: usize, max: usize },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// No IP extraction strategy is registered under this name.
    #[error("unknown parser: {0}")]
    UnknownIpParser(String),

    /// More proxies were supplied than the operator allowed.
    #[error("{count} exceeds max checks ({max}), limit your input or increase max")]
    TooManyProxies { count: usize, max: usize },

    #[error("no proxies supplied")]
    NoProxies,
}
