//! Application Context
//!
//! Composition root owning the store, the pub/sub bus, the breaker
//! table, and the resilience executor. Everything is explicitly
//! constructed and injected; the crate carries no ambient globals, so
//! tests can run any number of isolated instances.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::breaker::BreakerRegistry;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::observability::{HealthCheck, PrometheusExporter};
use crate::pubsub::PubSub;
use crate::resilience::ResilienceExecutor;
use crate::storage::{PatternCache, Store, Sweeper};

/// One fully wired instance of the coordination layer
#[derive(Clone)]
pub struct AppContext {
    store: Store,
    bus: PubSub,
    breakers: Arc<BreakerRegistry>,
    metrics: Arc<Metrics>,
    executor: ResilienceExecutor,
    sweep_interval_secs: u64,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AppContext {
    /// Build all subsystems from a configuration
    pub fn new(config: Config) -> Self {
        // The store's scans and the bus's pattern subscriptions share
        // one compiled-glob cache.
        let patterns = Arc::new(PatternCache::new());
        let store = Store::with_pattern_cache(Arc::clone(&patterns));
        let bus = PubSub::with_pattern_cache(patterns);
        let breakers = Arc::new(BreakerRegistry::new(config.breakers));
        let metrics = Arc::new(Metrics::new());
        let executor = ResilienceExecutor::new(
            Arc::clone(&breakers),
            Arc::clone(&metrics),
            config.resilience,
        );

        Self {
            store,
            bus,
            breakers,
            metrics,
            executor,
            sweep_interval_secs: config.sweep_interval_secs,
        }
    }

    /// The expiring key-value store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The publish/subscribe bus
    pub fn bus(&self) -> &PubSub {
        &self.bus
    }

    /// The fixed circuit breaker table
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Operation counters and call latency
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// The resilience executor for outbound calls
    pub fn executor(&self) -> &ResilienceExecutor {
        &self.executor
    }

    /// Start the background expiry sweep task
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        Sweeper::spawn(self.store.clone(), self.sweep_interval_secs)
    }

    /// Build a Prometheus exporter over this context's state
    pub fn prometheus_exporter(&self) -> PrometheusExporter {
        PrometheusExporter::new(Arc::clone(&self.metrics), Arc::clone(&self.breakers))
    }

    /// Build a health evaluator over this context's breaker table
    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::new(Arc::clone(&self.breakers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_contexts_are_isolated() {
        let a = AppContext::new(Config::default());
        let b = AppContext::new(Config::default());

        a.store().set("k", "from-a", None);
        assert_eq!(b.store().get("k"), None);

        let email = a.breakers().get("email").unwrap();
        for _ in 0..5 {
            let _ = email
                .run::<_, _, ()>(|| async { Err(anyhow::anyhow!("x")) })
                .await;
        }
        assert!(a.breakers().any_open());
        assert!(!b.breakers().any_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_dependency_table_is_wired() {
        let ctx = AppContext::default();
        for name in ["email", "sms", "payments", "search", "webhooks"] {
            assert!(ctx.breakers().get(name).is_some(), "missing {name}");
        }
    }
}
