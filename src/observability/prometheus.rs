//! Prometheus Metrics Export
//!
//! Renders operation counters and live breaker state in Prometheus text
//! format, suitable for a pull-based scrape.

use std::sync::Arc;

use crate::breaker::BreakerRegistry;
use crate::metrics::Metrics;

/// Metric type
#[derive(Debug, Clone, Copy)]
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Prometheus metrics exporter
///
/// Breaker gauges are sampled from the registry at export time, so every
/// scrape sees live state: 0=closed, 1=open, 2=half-open.
pub struct PrometheusExporter {
    metrics: Arc<Metrics>,
    breakers: Arc<BreakerRegistry>,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<Metrics>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { metrics, breakers }
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> String {
        let mut output = String::new();

        self.write_header(
            &mut output,
            "lifeboat_commands_total",
            "Total operations processed",
            MetricType::Counter,
        );
        output.push_str(&format!(
            "lifeboat_commands_total {}\n",
            self.metrics.total_ops()
        ));

        self.write_header(
            &mut output,
            "lifeboat_commands",
            "Operations per command or dependency label",
            MetricType::Counter,
        );
        let mut by_label: Vec<_> = self.metrics.ops_by_label().into_iter().collect();
        by_label.sort();
        for (label, count) in by_label {
            output.push_str(&format!(
                "lifeboat_commands{{label=\"{}\"}} {}\n",
                label, count
            ));
        }

        self.write_header(
            &mut output,
            "lifeboat_call_latency_us",
            "External call latency in microseconds",
            MetricType::Gauge,
        );
        output.push_str(&format!(
            "lifeboat_call_latency_us{{stat=\"avg\"}} {:.1}\n",
            self.metrics.avg_latency_us()
        ));
        output.push_str(&format!(
            "lifeboat_call_latency_us{{stat=\"min\"}} {}\n",
            self.metrics.min_latency_us()
        ));
        output.push_str(&format!(
            "lifeboat_call_latency_us{{stat=\"max\"}} {}\n",
            self.metrics.max_latency_us()
        ));

        let stats = self.breakers.all_stats();

        self.write_header(
            &mut output,
            "lifeboat_breaker_state",
            "Breaker state per dependency (0=closed, 1=open, 2=half-open)",
            MetricType::Gauge,
        );
        for s in &stats {
            output.push_str(&format!(
                "lifeboat_breaker_state{{dependency=\"{}\"}} {}\n",
                s.name,
                s.state.as_code()
            ));
        }

        self.write_header(
            &mut output,
            "lifeboat_breaker_failures",
            "Consecutive failures in the breaker's current state",
            MetricType::Gauge,
        );
        for s in &stats {
            output.push_str(&format!(
                "lifeboat_breaker_failures{{dependency=\"{}\"}} {}\n",
                s.name, s.failure_count
            ));
        }

        self.write_header(
            &mut output,
            "lifeboat_breaker_successes",
            "Consecutive successes in the breaker's current state",
            MetricType::Gauge,
        );
        for s in &stats {
            output.push_str(&format!(
                "lifeboat_breaker_successes{{dependency=\"{}\"}} {}\n",
                s.name, s.success_count
            ));
        }

        self.write_header(
            &mut output,
            "lifeboat_breaker_cooldown_ms",
            "Configured cooldown per dependency in milliseconds",
            MetricType::Gauge,
        );
        for s in &stats {
            output.push_str(&format!(
                "lifeboat_breaker_cooldown_ms{{dependency=\"{}\"}} {}\n",
                s.name,
                s.cooldown.as_millis()
            ));
        }

        self.write_header(
            &mut output,
            "lifeboat_breaker_any_open",
            "1 when any dependency's breaker is open",
            MetricType::Gauge,
        );
        output.push_str(&format!(
            "lifeboat_breaker_any_open {}\n",
            u8::from(self.breakers.any_open())
        ));

        output
    }

    fn write_header(&self, output: &mut String, name: &str, help: &str, ty: MetricType) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, ty.as_str()));
    }
}
