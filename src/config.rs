//! Configuration
//!
//! Knobs for the store sweeper, the resilience executor, and the fixed
//! per-dependency breaker table.

use std::time::Duration;

use crate::breaker::BreakerConfig;
use crate::resilience::ResilienceConfig;

/// Top-level configuration consumed by [`crate::AppContext`]
#[derive(Debug, Clone)]
pub struct Config {
    /// Expiry sweeper interval in seconds
    pub sweep_interval_secs: u64,

    /// Timeout/retry knobs for resilience-wrapped calls
    pub resilience: ResilienceConfig,

    /// Per-dependency breaker table, fixed at startup
    pub breakers: Vec<(String, BreakerConfig)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            resilience: ResilienceConfig::default(),
            breakers: default_breaker_table(),
        }
    }
}

impl Config {
    /// Set the expiry sweeper interval
    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Set the resilience executor knobs
    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    /// Add or replace one dependency's breaker configuration
    pub fn with_breaker(mut self, name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        match self.breakers.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = config,
            None => self.breakers.push((name, config)),
        }
        self
    }
}

/// The external dependencies the surrounding application calls out to.
/// Payment capture gets a longer cooldown; search is cheap to probe.
fn default_breaker_table() -> Vec<(String, BreakerConfig)> {
    vec![
        ("email".to_string(), BreakerConfig::default()),
        ("sms".to_string(), BreakerConfig::default()),
        (
            "payments".to_string(),
            BreakerConfig {
                failure_threshold: 3,
                success_threshold: 2,
                cooldown: Duration::from_secs(60),
            },
        ),
        (
            "search".to_string(),
            BreakerConfig {
                failure_threshold: 10,
                success_threshold: 3,
                cooldown: Duration::from_secs(15),
            },
        ),
        ("webhooks".to_string(), BreakerConfig::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_replaces_existing_breaker() {
        let config = Config::default().with_breaker(
            "email",
            BreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );

        let email = config
            .breakers
            .iter()
            .find(|(n, _)| n == "email")
            .map(|(_, c)| c)
            .unwrap();
        assert_eq!(email.failure_threshold, 1);
        assert_eq!(config.breakers.len(), 5);
    }

    #[test]
    fn test_builder_appends_new_breaker() {
        let config = Config::default().with_breaker("geocoding", BreakerConfig::default());
        assert_eq!(config.breakers.len(), 6);
    }
}
