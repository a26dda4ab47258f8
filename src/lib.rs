//! LIFEBOAT - In-Process Resilience and Coordination Layer
//!
//! A single-instance, in-memory substitute for a distributed cache
//! backend (expiring keys, batched commands, pattern pub/sub, atomic
//! budget reservations) plus per-dependency circuit breakers and a
//! timeout/retry executor protecting outbound calls.

pub mod breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod pubsub;
pub mod resilience;
pub mod storage;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerState, BreakerStats, CircuitBreaker};
pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use observability::{HealthCheck, HealthStatus, PrometheusExporter, SystemHealth};
pub use pubsub::PubSub;
pub use resilience::{ResilienceConfig, ResilienceExecutor};
pub use storage::{KeyScan, Multi, Reply, Store, StoreCommand, Sweeper};
