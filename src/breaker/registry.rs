//! Circuit Breaker Registry
//!
//! Fixed table of named breaker instances, one per external dependency.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{BreakerConfig, BreakerState, CircuitBreaker};

/// Snapshot of one breaker's state for metrics and health reporting
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub cooldown: Duration,
}

/// Table of named circuit breakers, built once at startup
///
/// Breakers live for the process lifetime; the table is never extended
/// after construction.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Build the registry from per-dependency configurations
    pub fn new<I, S>(configs: I) -> Self
    where
        I: IntoIterator<Item = (S, BreakerConfig)>,
        S: Into<String>,
    {
        let breakers = DashMap::new();
        for (name, config) in configs {
            let name = name.into();
            breakers.insert(
                name.clone(),
                Arc::new(CircuitBreaker::new(name, config)),
            );
        }
        Self { breakers }
    }

    /// Look up the breaker for a named dependency
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered dependency names, sorted for stable output
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot every breaker's state, sorted by dependency name
    pub fn all_stats(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| {
                let breaker = entry.value();
                BreakerStats {
                    name: breaker.name().to_string(),
                    state: breaker.state(),
                    failure_count: breaker.failure_count(),
                    success_count: breaker.success_count(),
                    cooldown: breaker.cooldown(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// True if any dependency's breaker is currently open (alerting)
    pub fn any_open(&self) -> bool {
        self.breakers
            .iter()
            .any(|entry| entry.value().state() == BreakerState::Open)
    }

    /// Force every breaker back to closed (test escape hatch)
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}
