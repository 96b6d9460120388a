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

// ABOUTME: Regression rows, severity classification thresholds, and reports
use crate::baseline::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Synthetic baseline id recorded by rolling-average detection.
pub const ROLLING_AVERAGE_BASELINE: &str = "rolling_average";

/// Severity of a detected regression, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionSeverity {
    Low,
    Minor,
    Medium,
    Major,
    High,
    Critical,
}

impl RegressionSeverity {
    /// Risk-score weight contributed by one regression of this severity.
    pub fn weight(&self) -> u32 {
        match self {
            RegressionSeverity::Low | RegressionSeverity::Minor => 5,
            RegressionSeverity::Medium => 10,
            RegressionSeverity::Major | RegressionSeverity::High => 20,
            RegressionSeverity::Critical => 30,
        }
    }
}

impl fmt::Display for RegressionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegressionSeverity::Low => "low",
            RegressionSeverity::Minor => "minor",
            RegressionSeverity::Medium => "medium",
            RegressionSeverity::Major => "major",
            RegressionSeverity::High => "high",
            RegressionSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RegressionSeverity {
    type Err = crate::error::BenchwatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(RegressionSeverity::Low),
            "minor" => Ok(RegressionSeverity::Minor),
            "medium" => Ok(RegressionSeverity::Medium),
            "major" => Ok(RegressionSeverity::Major),
            "high" => Ok(RegressionSeverity::High),
            "critical" => Ok(RegressionSeverity::Critical),
            other => Err(crate::error::BenchwatchError::validation(format!(
                "unknown regression severity: {other}"
            ))),
        }
    }
}

/// Which direction of change is worsening for a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorseningDirection {
    Increase,
    Decrease,
}

/// Thresholds for one metric family or per-metric override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Minor threshold (percent, or absolute points when `is_percentage`)
    pub minor: f64,

    /// Major threshold
    pub major: f64,

    /// Critical threshold
    pub critical: f64,

    /// Minimum samples before the family is judged at all
    pub min_sample_size: u64,

    /// True when thresholds are absolute percentage points (error rate)
    /// rather than relative percent change (latency, throughput)
    pub is_percentage: bool,

    /// Which sign of change is worsening
    pub direction: WorseningDirection,
}

impl MetricThresholds {
    /// Classify a worsening magnitude. `magnitude` is |pct_change| for
    /// relative families and |abs_change| points for absolute ones.
    /// Returns `None` below the minor threshold.
    pub fn classify(&self, magnitude: f64) -> Option<RegressionSeverity> {
        if magnitude >= self.critical {
            Some(RegressionSeverity::Critical)
        } else if magnitude >= self.major {
            Some(RegressionSeverity::High)
        } else if magnitude >= self.minor {
            Some(RegressionSeverity::Medium)
        } else {
            None
        }
    }

    /// Whether the signed change is in the worsening direction.
    pub fn is_worsening(&self, signed_change: f64) -> bool {
        match self.direction {
            WorseningDirection::Increase => signed_change > 0.0,
            WorseningDirection::Decrease => signed_change < 0.0,
        }
    }
}

/// Complete threshold set: the three families plus per-metric overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionThresholds {
    pub latency: MetricThresholds,
    pub error_rate: MetricThresholds,
    pub throughput: MetricThresholds,

    /// Per-metric-name overrides (e.g. a stricter `latency_p99`)
    #[serde(default)]
    pub overrides: HashMap<String, MetricThresholds>,
}

impl Default for RegressionThresholds {
    fn default() -> Self {
        Self {
            latency: MetricThresholds {
                minor: 5.0,
                major: 15.0,
                critical: 30.0,
                min_sample_size: 10,
                is_percentage: false,
                direction: WorseningDirection::Increase,
            },
            error_rate: MetricThresholds {
                minor: 1.0,
                major: 5.0,
                critical: 10.0,
                min_sample_size: 10,
                is_percentage: true,
                direction: WorseningDirection::Increase,
            },
            throughput: MetricThresholds {
                minor: 5.0,
                major: 15.0,
                critical: 30.0,
                min_sample_size: 10,
                is_percentage: false,
                direction: WorseningDirection::Decrease,
            },
            overrides: HashMap::new(),
        }
    }
}

impl RegressionThresholds {
    /// Resolve the thresholds for a metric name, honoring overrides first.
    pub fn for_metric(&self, metric: &str) -> &MetricThresholds {
        if let Some(t) = self.overrides.get(metric) {
            return t;
        }
        if metric == "error_rate" || metric == "success_rate" {
            &self.error_rate
        } else if metric == "throughput" || metric == "total_requests" {
            &self.throughput
        } else {
            &self.latency
        }
    }
}

/// One persisted regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    /// Stable id (UUID v4)
    pub id: String,

    /// The run that regressed
    pub run_id: String,

    /// Reference run id, or a synthetic sentinel for rolling comparisons
    pub baseline_run_id: String,

    pub client: String,
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    pub baseline_value: f64,
    pub current_value: f64,
    pub abs_change: f64,
    pub pct_change: f64,

    pub severity: RegressionSeverity,
    pub is_significant: bool,
    pub detected_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
}

/// Client/method scoping for a detection pass. Empty include lists allow all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFilter {
    #[serde(default)]
    pub include_clients: Vec<String>,
    #[serde(default)]
    pub exclude_clients: Vec<String>,
    #[serde(default)]
    pub include_methods: Vec<String>,
    #[serde(default)]
    pub exclude_methods: Vec<String>,
}

impl DetectionFilter {
    pub fn allows_client(&self, client: &str) -> bool {
        if self.exclude_clients.iter().any(|c| c == client) {
            return false;
        }
        self.include_clients.is_empty() || self.include_clients.iter().any(|c| c == client)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        if self.exclude_methods.iter().any(|m| m == method) {
            return false;
        }
        self.include_methods.is_empty() || self.include_methods.iter().any(|m| m == method)
    }
}

/// Per-client slice of a regression report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegressionAnalysis {
    pub client: String,
    pub regression_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_severity: Option<RegressionSeverity>,
    pub risk_level: RiskLevel,
}

/// Aggregated view of one run's regressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub regressions: Vec<Regression>,
    pub total_regressions: usize,

    /// Severity-weighted risk score, capped at 100
    pub risk_score: u32,

    /// 100 − risk_score
    pub health_score: u32,

    pub overall_risk: RiskLevel,
    pub clients: HashMap<String, ClientRegressionAnalysis>,
    pub recommendations: Vec<String>,
}

/// Bucket a severity-weighted risk score into an overall risk level.
pub fn risk_from_score(score: u32) -> RiskLevel {
    if score >= 80 {
        RiskLevel::Critical
    } else if score >= 60 {
        RiskLevel::High
    } else if score >= 30 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_latency_thresholds() {
        let thresholds = RegressionThresholds::default();
        assert_eq!(thresholds.latency.classify(4.9), None);
        assert_eq!(
            thresholds.latency.classify(5.0),
            Some(RegressionSeverity::Medium)
        );
        assert_eq!(
            thresholds.latency.classify(20.0),
            Some(RegressionSeverity::High)
        );
        assert_eq!(
            thresholds.latency.classify(33.3),
            Some(RegressionSeverity::Critical)
        );
    }

    #[test]
    fn test_threshold_monotonicity() {
        // Tightening the minor threshold never removes a detection.
        let loose = RegressionThresholds::default();
        let mut tight = RegressionThresholds::default();
        tight.latency.minor = 2.0;

        for magnitude in [1.0, 3.0, 5.0, 10.0, 16.0, 31.0] {
            if loose.latency.classify(magnitude).is_some() {
                assert!(tight.latency.classify(magnitude).is_some());
            }
        }
    }

    #[test]
    fn test_worsening_direction() {
        let thresholds = RegressionThresholds::default();
        // Rising latency worsens; falling latency never regresses.
        assert!(thresholds.latency.is_worsening(12.0));
        assert!(!thresholds.latency.is_worsening(-12.0));
        // Falling throughput worsens.
        assert!(thresholds.throughput.is_worsening(-20.0));
        assert!(!thresholds.throughput.is_worsening(20.0));
    }

    #[test]
    fn test_override_resolution() {
        let mut thresholds = RegressionThresholds::default();
        thresholds.overrides.insert(
            "latency_p99".to_string(),
            MetricThresholds {
                minor: 2.0,
                major: 8.0,
                critical: 20.0,
                min_sample_size: 5,
                is_percentage: false,
                direction: WorseningDirection::Increase,
            },
        );

        assert_eq!(thresholds.for_metric("latency_p99").minor, 2.0);
        assert_eq!(thresholds.for_metric("latency_avg").minor, 5.0);
        assert_eq!(thresholds.for_metric("error_rate").critical, 10.0);
        assert_eq!(
            thresholds.for_metric("throughput").direction,
            WorseningDirection::Decrease
        );
    }

    #[test]
    fn test_severity_ordering_and_weights() {
        assert!(RegressionSeverity::Low < RegressionSeverity::Critical);
        assert!(RegressionSeverity::Medium < RegressionSeverity::Major);
        assert_eq!(RegressionSeverity::Critical.weight(), 30);
        assert_eq!(RegressionSeverity::Major.weight(), 20);
    }

    #[test]
    fn test_risk_score_buckets() {
        // 2 critical + 1 major = 80 ⇒ critical.
        let score = 2 * RegressionSeverity::Critical.weight() + RegressionSeverity::Major.weight();
        assert_eq!(score, 80);
        assert_eq!(risk_from_score(score), RiskLevel::Critical);
        assert_eq!(risk_from_score(60), RiskLevel::High);
        assert_eq!(risk_from_score(30), RiskLevel::Medium);
        assert_eq!(risk_from_score(29), RiskLevel::Low);
    }

    #[test]
    fn test_detection_filter() {
        let filter = DetectionFilter {
            include_clients: vec!["geth".to_string()],
            exclude_methods: vec!["eth_chainId".to_string()],
            ..Default::default()
        };
        assert!(filter.allows_client("geth"));
        assert!(!filter.allows_client("nethermind"));
        assert!(filter.allows_method("eth_call"));
        assert!(!filter.allows_method("eth_chainId"));

        let open = DetectionFilter::default();
        assert!(open.allows_client("anything"));
        assert!(open.allows_method("anything"));
    }
}
