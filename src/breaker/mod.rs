//! Circuit Breaker
//!
//! Per-dependency state machine that gates calls to a flaky external
//! service. Three states:
//! - Closed: calls pass through, outcomes are counted
//! - Open: calls are rejected immediately, the wrapped call never runs
//! - HalfOpen: a limited number of probe calls test recovery

mod registry;

pub use registry::{BreakerRegistry, BreakerStats};

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Numeric encoding for metrics: 0=closed, 1=open, 2=half-open
    pub fn as_code(&self) -> u64 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for breaker behavior
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in closed state before opening
    pub failure_threshold: u32,
    /// Consecutive successes in half-open state before closing
    pub success_threshold: u32,
    /// Time to wait in open state before allowing a probe
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Internal state. An open breaker always carries the instant it opened;
/// the transition back to half-open is checked lazily on the next call
/// attempt, not by a background timer.
#[derive(Debug, Clone, Copy)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: State,
    failure_count: u32,
    success_count: u32,
}

/// Circuit breaker guarding one named external dependency
///
/// Counters reset to zero on every state transition; they are never
/// carried across states. The breaker never swallows the wrapped call's
/// outcome, it only decides whether the call happens at all.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker for a named dependency
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failure_count: 0,
                success_count: 0,
            }),
        }
    }

    /// Dependency name this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a call through the breaker.
    ///
    /// Rejects with [`Error::BreakerOpen`] while open and cooling down;
    /// otherwise invokes the operation, records the outcome, and
    /// propagates it unchanged.
    pub async fn run<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.admit(|| async { op().await.map_err(Error::Upstream) })
            .await
    }

    /// Breaker-gated execution for callers whose failures are already
    /// typed, such as the resilience executor's timeout wrapper.
    pub(crate) async fn admit<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.before_call()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Record a successful call outcome
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                inner.failure_count = 0;
            }
            State::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = State::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "recovered, closing circuit");
                }
            }
            // A stale probe completing after the breaker re-opened must
            // not disturb the open state.
            State::Open { .. } => {}
        }
    }

    /// Record a failed call outcome
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = State::Open {
                        opened_at: Instant::now(),
                    };
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    warn!(
                        breaker = %self.name,
                        cooldown = ?self.config.cooldown,
                        "failure threshold reached, opening circuit"
                    );
                }
            }
            State::HalfOpen => {
                inner.state = State::Open {
                    opened_at: Instant::now(),
                };
                inner.failure_count = 0;
                inner.success_count = 0;
                warn!(breaker = %self.name, "probe failed, reopening circuit");
            }
            State::Open { .. } => {}
        }
    }

    /// Current state, accounting for an elapsed cooldown
    pub fn state(&self) -> BreakerState {
        match self.inner.lock().state {
            State::Closed => BreakerState::Closed,
            State::HalfOpen => BreakerState::HalfOpen,
            State::Open { .. } => BreakerState::Open,
        }
    }

    /// Consecutive failure count in the current state
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Consecutive success count in the current state
    pub fn success_count(&self) -> u32 {
        self.inner.lock().success_count
    }

    /// Configured cooldown
    pub fn cooldown(&self) -> Duration {
        self.config.cooldown
    }

    /// Force the breaker back to closed with zeroed counters (test hook)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
    }

    /// Gate a call attempt: reject while open and cooling down, move to
    /// half-open once the cooldown has elapsed.
    fn before_call(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => Ok(()),
            State::Open { opened_at } => {
                if Instant::now().duration_since(opened_at) >= self.config.cooldown {
                    inner.state = State::HalfOpen;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "cooldown elapsed, probing half-open");
                    Ok(())
                } else {
                    Err(Error::BreakerOpen {
                        name: self.name.clone(),
                    })
                }
            }
        }
    }
}
