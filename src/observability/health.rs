//! Health Checks
//!
//! Rolls the breaker table up into a health status and JSON report.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::breaker::{BreakerRegistry, BreakerState};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Per-dependency health check result
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// System health summary
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub checks: Vec<CheckResult>,
    pub uptime: Duration,
    pub version: String,
    pub generated_at: String,
}

impl SystemHealth {
    /// Serialize to JSON format
    pub fn to_json(&self) -> String {
        let checks_json: Vec<String> = self
            .checks
            .iter()
            .map(|c| {
                format!(
                    r#"{{"name":"{}","status":"{}"{}}}"#,
                    c.name,
                    c.status,
                    c.message
                        .as_ref()
                        .map(|m| format!(r#","message":"{}""#, m))
                        .unwrap_or_default()
                )
            })
            .collect();

        format!(
            r#"{{"status":"{}","uptime_secs":{},"version":"{}","generated_at":"{}","checks":[{}]}}"#,
            self.overall,
            self.uptime.as_secs(),
            self.version,
            self.generated_at,
            checks_json.join(",")
        )
    }
}

/// Health evaluator over the breaker table
pub struct HealthCheck {
    breakers: Arc<BreakerRegistry>,
    start_time: Instant,
}

impl HealthCheck {
    pub fn new(breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            breakers,
            start_time: Instant::now(),
        }
    }

    /// Evaluate all dependencies. An open breaker marks its dependency
    /// unhealthy; a probing (half-open) one marks it degraded. Overall:
    /// every dependency open means unhealthy, any non-closed breaker
    /// means degraded, otherwise healthy.
    pub fn evaluate(&self) -> SystemHealth {
        let stats = self.breakers.all_stats();
        let checks: Vec<CheckResult> = stats
            .iter()
            .map(|s| {
                let (status, message) = match s.state {
                    BreakerState::Closed => (HealthStatus::Healthy, None),
                    BreakerState::HalfOpen => (
                        HealthStatus::Degraded,
                        Some("probing recovery".to_string()),
                    ),
                    BreakerState::Open => (
                        HealthStatus::Unhealthy,
                        Some(format!(
                            "circuit open, cooling down {}ms",
                            s.cooldown.as_millis()
                        )),
                    ),
                };
                CheckResult {
                    name: s.name.clone(),
                    status,
                    message,
                }
            })
            .collect();

        let overall = if !checks.is_empty()
            && checks.iter().all(|c| c.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status != HealthStatus::Healthy) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        SystemHealth {
            overall,
            checks,
            uptime: self.start_time.elapsed(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
