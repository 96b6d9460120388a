// ABOUTME: Baseline snapshot and baseline-vs-run comparison model
use crate::benchmark::{BenchmarkResult, ClientMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A named, pinned run used as a comparison reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Unique baseline name
    pub name: String,

    /// Owning test; immutable after creation
    pub test_name: String,

    /// The pinned run
    pub run_id: String,

    #[serde(default)]
    pub description: String,

    /// Cached metric snapshot taken at creation time
    pub metrics: BaselineMetrics,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Soft-delete flag; inactive baselines are invisible to reads
    pub active: bool,
}

/// Snapshot of the metrics a baseline pins: overall plus per-client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BaselineMetrics {
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub max_latency_ms: f64,
    pub error_rate: f64,
    pub throughput: f64,
    pub total_requests: u64,
    #[serde(default)]
    pub per_client: HashMap<String, ClientSnapshot>,
}

/// Per-client slice of a baseline snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClientSnapshot {
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub error_rate: f64,
    pub throughput: f64,
    pub total_requests: u64,
}

impl ClientSnapshot {
    pub fn from_client_metrics(metrics: &ClientMetrics) -> Self {
        Self {
            avg_latency_ms: metrics.latency.avg,
            p95_latency_ms: metrics.latency.p95,
            p99_latency_ms: metrics.latency.p99,
            error_rate: metrics.error_rate,
            throughput: metrics.latency.throughput,
            total_requests: metrics.total_requests,
        }
    }
}

impl BaselineMetrics {
    /// Build the snapshot from a full benchmark result.
    pub fn from_result(result: &BenchmarkResult) -> Self {
        let per_client: HashMap<String, ClientSnapshot> = result
            .client_metrics
            .iter()
            .map(|(name, metrics)| (name.clone(), ClientSnapshot::from_client_metrics(metrics)))
            .collect();

        let total_requests = result.total_requests();
        let throughput: f64 = result
            .client_metrics
            .values()
            .map(|c| c.latency.throughput)
            .sum();

        Self {
            avg_latency_ms: result.overall_avg_latency(),
            p50_latency_ms: result.worst_latency(|l| l.p50),
            p95_latency_ms: result.worst_latency(|l| l.p95),
            p99_latency_ms: result.worst_latency(|l| l.p99),
            max_latency_ms: result.worst_latency(|l| l.max),
            error_rate: result.overall_error_rate(),
            throughput,
            total_requests,
            per_client,
        }
    }
}

/// Comparison status for one client or for the run overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Improved,
    Degraded,
    Stable,
    Mixed,
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonStatus::Improved => "improved",
            ComparisonStatus::Degraded => "degraded",
            ComparisonStatus::Stable => "stable",
            ComparisonStatus::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// Risk classification attached to comparisons and regression reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One metric's delta between a baseline and the compared run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetric {
    pub baseline: f64,
    pub current: f64,
    pub abs_change: f64,
    pub pct_change: f64,
    pub is_improvement: bool,
    pub is_significant: bool,
}

/// Metric families compared between a baseline and a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetricKind {
    AvgLatency,
    P95Latency,
    P99Latency,
    ErrorRate,
    Throughput,
}

impl ComparisonMetricKind {
    pub const ALL: [ComparisonMetricKind; 5] = [
        ComparisonMetricKind::AvgLatency,
        ComparisonMetricKind::P95Latency,
        ComparisonMetricKind::P99Latency,
        ComparisonMetricKind::ErrorRate,
        ComparisonMetricKind::Throughput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMetricKind::AvgLatency => "avg_latency",
            ComparisonMetricKind::P95Latency => "p95_latency",
            ComparisonMetricKind::P99Latency => "p99_latency",
            ComparisonMetricKind::ErrorRate => "error_rate",
            ComparisonMetricKind::Throughput => "throughput",
        }
    }

    /// Whether a higher current value is an improvement for this family.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, ComparisonMetricKind::Throughput)
    }

    /// Whether significance is judged in absolute points rather than
    /// relative percent (only the error rate family).
    pub fn absolute_significance(&self) -> bool {
        matches!(self, ComparisonMetricKind::ErrorRate)
    }
}

impl fmt::Display for ComparisonMetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-client comparison block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientComparison {
    pub client: String,
    pub metrics: HashMap<String, ComparisonMetric>,
    /// Composite-score delta in percent (positive = better)
    pub score_change_pct: f64,
    pub status: ComparisonStatus,
}

/// Full baseline-vs-run comparison (computed, not stored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub run_id: String,
    pub baseline_name: String,
    pub test_name: String,
    /// Overall deltas keyed by comparison family name
    pub metrics: HashMap<String, ComparisonMetric>,
    pub clients: HashMap<String, ClientComparison>,
    pub status: ComparisonStatus,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub compared_at: DateTime<Utc>,
}

/// Categorization of a historical point relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationCategory {
    Better,
    Similar,
    Worse,
}

/// One point of a baseline's deviation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineHistoryPoint {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub avg_latency_ms: f64,
    /// Deviation vs the baseline's average latency, in percent
    pub deviation_pct: f64,
    pub category: DeviationCategory,
}

/// Composite client score: 0.4·latency + 0.4·error + 0.2·throughput.
///
/// latencyScore = max(0, (1000−avg)/1000); throughputScore =
/// min(throughput/10000, 1); errorScore = max(0, 1−errorRate).
pub fn composite_score(avg_latency_ms: f64, error_rate_pct: f64, throughput: f64) -> f64 {
    let latency_score = ((1000.0 - avg_latency_ms) / 1000.0).max(0.0);
    let throughput_score = (throughput / 10_000.0).min(1.0);
    let error_score = (1.0 - error_rate_pct).max(0.0);
    0.4 * latency_score + 0.4 * error_score + 0.2 * throughput_score
}

/// Categorize a deviation percentage at the ±10% boundary.
pub fn categorize_deviation(deviation_pct: f64) -> DeviationCategory {
    if deviation_pct < -10.0 {
        DeviationCategory::Better
    } else if deviation_pct > 10.0 {
        DeviationCategory::Worse
    } else {
        DeviationCategory::Similar
    }
}
