//! Error Taxonomy
//!
//! Failure variants surfaced by the store, breakers, and the resilience
//! executor. Store misses are values, never errors.

use std::time::Duration;

/// Errors produced by this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named circuit breaker is open and its cooldown has not elapsed.
    /// The wrapped call was never invoked.
    #[error("circuit breaker '{name}' is open")]
    BreakerOpen { name: String },

    /// The wrapped call did not complete within the configured timeout.
    /// Counted as a failure against the breaker.
    #[error("operation '{label}' timed out after {after:?}")]
    Timeout { label: String, after: Duration },

    /// All configured attempts were exhausted. Wraps the last failure.
    #[error("retries exhausted after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// No breaker is registered under this label. The breaker table is
    /// fixed at startup.
    #[error("no circuit breaker registered for dependency '{name}'")]
    UnknownDependency { name: String },

    /// INCR against a value that does not parse as an integer.
    #[error("value at key '{key}' is not an integer")]
    NotAnInteger { key: String },

    /// Failure of the wrapped call itself, propagated unchanged.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl Error {
    /// True for the breaker's own fast-fail rejection, as opposed to a
    /// failure of the underlying call.
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Error::BreakerOpen { .. })
    }

    /// True when the failure came from the timeout race.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
