// ABOUTME: Ingest-side benchmark result model produced by the load generator
use crate::error::{BenchwatchError, Result};
use crate::historic::MetricName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// A completed load-test run against one or more JSON-RPC clients.
///
/// This is the ingest boundary: the load generator hands one of these to the
/// historic store, which explodes it into a summary row plus per-metric
/// time-series points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResult {
    /// Name of the benchmark test that produced this result
    pub test_name: String,

    /// Optional human description of the test
    #[serde(default)]
    pub description: String,

    /// Wall-clock start of the run (UTC)
    pub start_time: DateTime<Utc>,

    /// Wall-clock end of the run (UTC)
    pub end_time: DateTime<Utc>,

    /// Run duration in seconds
    pub duration_seconds: f64,

    /// Per-client measurements, keyed by client name (e.g. "geth")
    pub client_metrics: HashMap<String, ClientMetrics>,
}

/// Aggregate measurements for one client across the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientMetrics {
    /// Total requests issued against this client
    pub total_requests: u64,

    /// Total failed requests
    pub total_errors: u64,

    /// Error rate in percent (0..=100)
    pub error_rate: f64,

    /// Client-wide latency distribution and throughput
    pub latency: LatencyMetrics,

    /// Per-method breakdown, keyed by JSON-RPC method name
    #[serde(default)]
    pub methods: HashMap<String, MethodMetrics>,
}

/// Latency distribution (milliseconds) plus throughput (requests/second).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, ToSchema)]
pub struct LatencyMetrics {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub throughput: f64,
}

/// Per-method measurements: the latency fields plus a call count and error rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MethodMetrics {
    /// Number of calls made to this method
    pub count: u64,

    /// Error rate in percent (0..=100)
    pub error_rate: f64,

    /// Method-scoped latency distribution and throughput
    pub latency: LatencyMetrics,
}

/// Compute an error rate in percent; zero requests yields zero, not NaN.
pub fn error_rate(errors: u64, requests: u64) -> f64 {
    if requests == 0 {
        0.0
    } else {
        (errors as f64 / requests as f64) * 100.0
    }
}

impl ClientMetrics {
    /// Success rate in percent; complements `error_rate` to 100.
    pub fn success_rate(&self) -> f64 {
        100.0 - self.error_rate
    }

    /// Look up a single metric value by name for this client's aggregate.
    pub fn metric_value(&self, name: MetricName) -> f64 {
        match name {
            MetricName::LatencyAvg => self.latency.avg,
            MetricName::LatencyMin => self.latency.min,
            MetricName::LatencyMax => self.latency.max,
            MetricName::LatencyP50 => self.latency.p50,
            MetricName::LatencyP90 => self.latency.p90,
            MetricName::LatencyP95 => self.latency.p95,
            MetricName::LatencyP99 => self.latency.p99,
            MetricName::ErrorRate => self.error_rate,
            MetricName::SuccessRate => self.success_rate(),
            MetricName::Throughput => self.latency.throughput,
            MetricName::TotalRequests => self.total_requests as f64,
        }
    }
}

impl MethodMetrics {
    /// Look up a single metric value by name for this method.
    pub fn metric_value(&self, name: MetricName) -> f64 {
        match name {
            MetricName::LatencyAvg => self.latency.avg,
            MetricName::LatencyMin => self.latency.min,
            MetricName::LatencyMax => self.latency.max,
            MetricName::LatencyP50 => self.latency.p50,
            MetricName::LatencyP90 => self.latency.p90,
            MetricName::LatencyP95 => self.latency.p95,
            MetricName::LatencyP99 => self.latency.p99,
            MetricName::ErrorRate => self.error_rate,
            MetricName::SuccessRate => 100.0 - self.error_rate,
            MetricName::Throughput => self.latency.throughput,
            MetricName::TotalRequests => self.count as f64,
        }
    }
}

impl BenchmarkResult {
    /// Total requests summed over all clients.
    pub fn total_requests(&self) -> u64 {
        self.client_metrics.values().map(|c| c.total_requests).sum()
    }

    /// Total errors summed over all clients.
    pub fn total_errors(&self) -> u64 {
        self.client_metrics.values().map(|c| c.total_errors).sum()
    }

    /// Overall error rate in percent across all clients.
    pub fn overall_error_rate(&self) -> f64 {
        error_rate(self.total_errors(), self.total_requests())
    }

    /// Request-weighted average latency across clients.
    pub fn overall_avg_latency(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.client_metrics
            .values()
            .map(|c| c.latency.avg * c.total_requests as f64)
            .sum::<f64>()
            / total as f64
    }

    /// Worst (highest) percentile/max latency observed across clients.
    pub fn worst_latency(&self, pick: impl Fn(&LatencyMetrics) -> f64) -> f64 {
        self.client_metrics
            .values()
            .map(|c| pick(&c.latency))
            .fold(0.0, f64::max)
    }

    /// Sorted client names observed in this result.
    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.client_metrics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted union of method names observed across clients.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .client_metrics
            .values()
            .flat_map(|c| c.methods.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Check that the result is internally coherent before ingest.
    ///
    /// A reversed time window is a `Validation` error; totals that do not
    /// add up are an `Upstream` error (the load generator produced them).
    pub fn validate(&self) -> Result<()> {
        if self.test_name.trim().is_empty() {
            return Err(BenchwatchError::validation("test_name must not be empty"));
        }
        if self.end_time < self.start_time {
            return Err(BenchwatchError::validation(format!(
                "run window is reversed: end {} precedes start {}",
                self.end_time, self.start_time
            )));
        }
        if self.client_metrics.is_empty() {
            return Err(BenchwatchError::Upstream(
                "benchmark result contains no client metrics".to_string(),
            ));
        }
        for (client, metrics) in &self.client_metrics {
            if metrics.total_errors > metrics.total_requests {
                return Err(BenchwatchError::Upstream(format!(
                    "client {client}: {} errors exceed {} requests",
                    metrics.total_errors, metrics.total_requests
                )));
            }
            let expected = error_rate(metrics.total_errors, metrics.total_requests);
            if (metrics.error_rate - expected).abs() > 0.5 {
                return Err(BenchwatchError::Upstream(format!(
                    "client {client}: reported error rate {:.2}% disagrees with {}/{} totals",
                    metrics.error_rate, metrics.total_errors, metrics.total_requests
                )));
            }
        }
        Ok(())
    }
}
