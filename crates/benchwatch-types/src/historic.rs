// Copyright 2025 Benchwatch Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: Persisted historic-run and time-series metric shapes
use crate::benchmark::BenchmarkResult;
use crate::error::{BenchwatchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Closed set of metric names stored per (client, method) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    LatencyAvg,
    LatencyMin,
    LatencyMax,
    LatencyP50,
    LatencyP90,
    LatencyP95,
    LatencyP99,
    ErrorRate,
    SuccessRate,
    Throughput,
    TotalRequests,
}

impl MetricName {
    /// Every metric name, in the order rows are expanded for a run.
    pub const ALL: [MetricName; 11] = [
        MetricName::LatencyAvg,
        MetricName::LatencyMin,
        MetricName::LatencyMax,
        MetricName::LatencyP50,
        MetricName::LatencyP90,
        MetricName::LatencyP95,
        MetricName::LatencyP99,
        MetricName::ErrorRate,
        MetricName::SuccessRate,
        MetricName::Throughput,
        MetricName::TotalRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LatencyAvg => "latency_avg",
            MetricName::LatencyMin => "latency_min",
            MetricName::LatencyMax => "latency_max",
            MetricName::LatencyP50 => "latency_p50",
            MetricName::LatencyP90 => "latency_p90",
            MetricName::LatencyP95 => "latency_p95",
            MetricName::LatencyP99 => "latency_p99",
            MetricName::ErrorRate => "error_rate",
            MetricName::SuccessRate => "success_rate",
            MetricName::Throughput => "throughput",
            MetricName::TotalRequests => "total_requests",
        }
    }

    /// Whether a *decrease* in this metric is an improvement.
    pub fn lower_is_better(&self) -> bool {
        !matches!(
            self,
            MetricName::Throughput | MetricName::SuccessRate | MetricName::TotalRequests
        )
    }

    /// Display unit for dashboards and the Grafana metadata endpoint.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricName::ErrorRate | MetricName::SuccessRate => "percent",
            MetricName::Throughput => "reqps",
            MetricName::TotalRequests => "short",
            _ => "ms",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = BenchwatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latency_avg" | "avg_latency" => Ok(MetricName::LatencyAvg),
            "latency_min" => Ok(MetricName::LatencyMin),
            "latency_max" | "max_latency" => Ok(MetricName::LatencyMax),
            "latency_p50" | "p50_latency" => Ok(MetricName::LatencyP50),
            "latency_p90" => Ok(MetricName::LatencyP90),
            "latency_p95" | "p95_latency" => Ok(MetricName::LatencyP95),
            "latency_p99" | "p99_latency" => Ok(MetricName::LatencyP99),
            "error_rate" => Ok(MetricName::ErrorRate),
            "success_rate" => Ok(MetricName::SuccessRate),
            "throughput" => Ok(MetricName::Throughput),
            "total_requests" => Ok(MetricName::TotalRequests),
            other => Err(BenchwatchError::validation(format!(
                "unknown metric name: {other}"
            ))),
        }
    }
}

/// Method pseudo-name used for client-wide aggregate rows.
pub const METHOD_ALL: &str = "all";

/// One persisted benchmark run: summary fields plus (optionally) the full
/// result blob rehydrated from storage. Listings omit the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricRun {
    /// Stable id: `YYYYMMDD-HHMMSS-<shortcommit>` (UTC)
    pub id: String,

    /// Run start timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Git commit the benchmarked build was produced from
    pub git_commit: String,

    /// Git branch the benchmarked build was produced from
    pub git_branch: String,

    /// Name of the benchmark test
    pub test_name: String,

    /// Human description
    #[serde(default)]
    pub description: String,

    /// Deterministic digest over the normalized run configuration
    pub config_hash: String,

    /// Run duration in seconds
    pub duration_seconds: f64,

    /// Total requests across all clients
    pub total_requests: u64,

    /// Total errors across all clients
    pub total_errors: u64,

    /// Overall error rate in percent
    pub overall_error_rate: f64,

    /// Overall success rate in percent
    pub success_rate: f64,

    /// Request-weighted average latency (ms)
    pub avg_latency_ms: f64,

    /// Worst p50 latency across clients (ms)
    pub p50_latency_ms: f64,

    /// Worst p95 latency across clients (ms)
    pub p95_latency_ms: f64,

    /// Worst p99 latency across clients (ms)
    pub p99_latency_ms: f64,

    /// Worst max latency across clients (ms)
    pub max_latency_ms: f64,

    /// Client names observed in the run
    pub clients: Vec<String>,

    /// Union of JSON-RPC method names observed in the run
    pub methods: Vec<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Per-client composite performance scores (0..=1)
    #[serde(default)]
    pub performance_scores: HashMap<String, f64>,

    /// Whether any active baseline points at this run
    #[serde(default)]
    pub is_baseline: bool,

    /// Set when the summary row committed but metric rows are missing
    #[serde(default)]
    pub metrics_incomplete: bool,

    /// Full benchmark result; present on `get_run`, absent in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_result: Option<BenchmarkResult>,
}

/// One point of the exploded time series.
///
/// Primary key: (time, run_id, client, method, metric_name). `method = "all"`
/// carries the client-wide aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesMetric {
    pub time: DateTime<Utc>,
    pub run_id: String,
    pub client: String,
    pub method: String,
    pub metric_name: MetricName,
    pub value: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Filter for `list_runs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFilter {
    pub test_name: Option<String>,
    pub git_branch: Option<String>,
    pub client: Option<String>,
    pub method: Option<String>,
    /// Only runs referenced by an active baseline
    #[serde(default)]
    pub baseline_only: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Result page for `list_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunListing {
    pub count: usize,
    pub limit: u32,
    pub runs: Vec<HistoricRun>,
}

/// Selection over the expanded time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub metric_names: Vec<MetricName>,
    pub test_name: Option<String>,
    pub client: Option<String>,
    pub method: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// A client endpoint recorded in the per-run `run_config.json` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientEndpoint {
    pub name: String,
    pub url: String,
}

/// Resolved configuration of the run being ingested.
///
/// Git metadata arrives here from the caller; this service never invokes git.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunConfig {
    #[serde(default)]
    pub git_commit: Option<String>,

    #[serde(default)]
    pub git_branch: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Resolved client endpoints, recorded in `run_config.json`
    #[serde(default)]
    pub clients: Vec<ClientEndpoint>,

    /// The raw configuration document the run was started from
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl RunConfig {
    /// Short (7-char) commit used in run ids; `unknown` when absent.
    pub fn short_commit(&self) -> String {
        match self.git_commit.as_deref() {
            Some(commit) if !commit.is_empty() => commit.chars().take(7).collect(),
            _ => "unknown".to_string(),
        }
    }

    /// Deterministic SHA-256 hex digest over the normalized configuration.
    ///
    /// serde_json maps are key-sorted, so serializing the value is already a
    /// canonical form.
    pub fn config_hash(&self) -> String {
        let canonical =
            serde_json::to_vec(&self.raw).unwrap_or_else(|_| b"null".to_vec());
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_name_round_trip() {
        for name in MetricName::ALL {
            let parsed: MetricName = name.as_str().parse().unwrap();
            assert_eq!(parsed, name);
        }
    }

    #[test]
    fn test_metric_name_aliases() {
        assert_eq!(
            "avg_latency".parse::<MetricName>().unwrap(),
            MetricName::LatencyAvg
        );
        assert_eq!(
            "p95_latency".parse::<MetricName>().unwrap(),
            MetricName::LatencyP95
        );
        assert!("frobnication_rate".parse::<MetricName>().is_err());
    }

    #[test]
    fn test_metric_direction() {
        assert!(MetricName::LatencyAvg.lower_is_better());
        assert!(MetricName::ErrorRate.lower_is_better());
        assert!(!MetricName::Throughput.lower_is_better());
        assert!(!MetricName::SuccessRate.lower_is_better());
    }

    #[test]
    fn test_short_commit() {
        let config = RunConfig {
            git_commit: Some("0123456789abcdef".to_string()),
            ..Default::default()
        };
        assert_eq!(config.short_commit(), "0123456");
        assert_eq!(RunConfig::default().short_commit(), "unknown");
    }

    #[test]
    fn test_config_hash_is_deterministic() {
        let a = RunConfig {
            raw: serde_json::json!({"b": 2, "a": 1}),
            ..Default::default()
        };
        let b = RunConfig {
            raw: serde_json::json!({"a": 1, "b": 2}),
            ..Default::default()
        };
        // Key order in the source document must not change the digest.
        assert_eq!(a.config_hash(), b.config_hash());
        assert_eq!(a.config_hash().len(), 64);
    }

    #[test]
    fn test_metric_name_serde_uses_snake_case() {
        let json = serde_json::to_string(&MetricName::LatencyP95).unwrap();
        assert_eq!(json, "\"latency_p95\"");
    }
}
