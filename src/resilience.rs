//! Resilience Executor
//!
//! Composes a hard timeout, a named circuit breaker, and bounded retry
//! with exponential backoff around an arbitrary asynchronous call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::breaker::BreakerRegistry;
use crate::error::{Error, Result};
use crate::metrics::Metrics;

/// Retry and timeout knobs for resilience-wrapped calls
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Hard per-attempt timeout
    pub timeout: Duration,
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt
    pub base_delay: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Executor protecting outbound calls to named external dependencies
#[derive(Debug, Clone)]
pub struct ResilienceExecutor {
    breakers: Arc<BreakerRegistry>,
    metrics: Arc<Metrics>,
    config: ResilienceConfig,
}

impl ResilienceExecutor {
    /// Create an executor over a breaker table
    pub fn new(
        breakers: Arc<BreakerRegistry>,
        metrics: Arc<Metrics>,
        config: ResilienceConfig,
    ) -> Self {
        Self {
            breakers,
            metrics,
            config,
        }
    }

    /// Run `op` under timeout, breaker, and retry protection.
    ///
    /// Each attempt races the call against the timeout inside the
    /// breaker, so a timeout counts as a breaker failure. A breaker-open
    /// rejection is never retried in place, but a later attempt re-enters
    /// the breaker and may be admitted once the cooldown has elapsed. The
    /// timed-out call itself is abandoned, not cancelled.
    pub async fn with_resilience<F, Fut, T>(&self, label: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let breaker = self
            .breakers
            .get(label)
            .ok_or_else(|| Error::UnknownDependency {
                name: label.to_string(),
            })?;

        let mut delay = self.config.base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = breaker
                .admit(|| async {
                    match tokio::time::timeout(self.config.timeout, op()).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(Error::Upstream(err)),
                        Err(_) => Err(Error::Timeout {
                            label: label.to_string(),
                            after: self.config.timeout,
                        }),
                    }
                })
                .await;

            match outcome {
                Ok(value) => {
                    self.metrics.record_call(label, started.elapsed());
                    return Ok(value);
                }
                Err(err) if attempt >= self.config.max_attempts => {
                    warn!(
                        dependency = label,
                        attempts = attempt,
                        error = %err,
                        "giving up on resilience-wrapped call"
                    );
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!(
                        dependency = label,
                        attempt = attempt,
                        backoff = ?delay,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(breaker: BreakerConfig, resilience: ResilienceConfig) -> ResilienceExecutor {
        let registry = Arc::new(BreakerRegistry::new([("email", breaker)]));
        ResilienceExecutor::new(registry, Arc::new(Metrics::new()), resilience)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let exec = executor(BreakerConfig::default(), ResilienceConfig::default());

        let result = exec
            .with_resilience("email", || async { Ok("sent".to_string()) })
            .await
            .unwrap();
        assert_eq!(result, "sent");
        assert_eq!(exec.metrics.total_ops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_dependency_is_rejected() {
        let exec = executor(BreakerConfig::default(), ResilienceConfig::default());

        let err = exec
            .with_resilience::<_, _, ()>("fax", || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDependency { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let exec = executor(BreakerConfig::default(), ResilienceConfig::default());
        let calls = AtomicU32::new(0);

        let result = exec
            .with_resilience("email", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow::anyhow!("connection refused"))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let exec = executor(
            BreakerConfig::default(),
            ResilienceConfig {
                max_attempts: 2,
                ..Default::default()
            },
        );

        let err = exec
            .with_resilience::<_, _, ()>("email", || async {
                Err(anyhow::anyhow!("still down"))
            })
            .await
            .unwrap_err();

        match err {
            Error::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(source.to_string().contains("still down"));
            }
            other => panic!("expected RetryExhausted, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_breaker_failure() {
        let exec = executor(
            BreakerConfig::default(),
            ResilienceConfig {
                timeout: Duration::from_millis(100),
                max_attempts: 1,
                ..Default::default()
            },
        );

        let err = exec
            .with_resilience::<_, _, ()>("email", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        match err {
            Error::RetryExhausted { source, .. } => assert!(source.is_timeout()),
            other => panic!("expected RetryExhausted, got {other}"),
        }
        assert_eq!(exec.breakers.get("email").unwrap().failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_rejects_without_calling() {
        let exec = executor(
            BreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_secs(600),
                ..Default::default()
            },
            ResilienceConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                ..Default::default()
            },
        );
        let calls = AtomicU32::new(0);

        let err = exec
            .with_resilience::<_, _, ()>("email", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("boom"))
            })
            .await
            .unwrap_err();

        // One real call opens the breaker; the remaining attempts are
        // rejected before reaching the operation.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            Error::RetryExhausted { source, .. } => assert!(source.is_breaker_open()),
            other => panic!("expected RetryExhausted, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_attempt_recovers_after_cooldown() {
        let exec = executor(
            BreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                cooldown: Duration::from_millis(50),
            },
            ResilienceConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
                ..Default::default()
            },
        );
        let calls = AtomicU32::new(0);

        // First attempt fails and opens the breaker; the backoff outlasts
        // the cooldown, so the second attempt is admitted as a probe and
        // succeeds.
        let result = exec
            .with_resilience("email", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow::anyhow!("flake"))
                } else {
                    Ok("recovered")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
