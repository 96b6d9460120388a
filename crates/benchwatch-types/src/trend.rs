// ABOUTME: Trend analysis result shapes: statistics, anomalies, change points, forecasts
use crate::historic::MetricName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a metric's trend, interpreted by metric semantics
/// (decreasing latency is improving, decreasing throughput is degrading).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Degrading => "degrading",
            TrendDirection::Stable => "stable",
        };
        f.write_str(s)
    }
}

/// Trend strength from R²·(1−volatility), bucketed at 0.4/0.6/0.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl TrendStrength {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            TrendStrength::VeryStrong
        } else if score >= 0.6 {
            TrendStrength::Strong
        } else if score >= 0.4 {
            TrendStrength::Moderate
        } else {
            TrendStrength::Weak
        }
    }
}

/// One observed sample of the series under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub value: f64,
}

/// Ordinary-least-squares fit plus dispersion statistics.
///
/// `p_value_heuristic` is 1−R² and `heuristic_significant` is R²>0.5; both
/// are heuristics, not inference, and are labeled as such in output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStatistics {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value_heuristic: f64,
    pub heuristic_significant: bool,
    /// Coefficient of variation (stddev/mean)
    pub volatility: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Display form, e.g. `y = 1.25x + 140.00`
    pub equation: String,
}

/// Moving-average point with its local deviation and ±2σ band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub moving_avg: f64,
    /// Point value minus the window mean
    pub deviation: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
}

/// Severity of a z-score anomaly at 1×/1.5×/2× the sensitivity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Mild,
    Moderate,
    Severe,
}

/// One point flagged as anomalous versus the whole-series mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Z-score magnitude of the point
    pub deviation_score: f64,
    pub severity: AnomalySeverity,
}

/// The only change type the sliding-window detector emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePointType {
    Level,
}

/// A time index where pre/post window means diverge by > 2 pooled σ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangePointType,
    /// Mean shift as percent of the pre-window mean
    pub magnitude_pct: f64,
    /// Δmean/(4·pooled σ), capped at 1
    pub confidence: f64,
}

/// One projected point of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub index: usize,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Fit quality of the forecast over its training window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastValidation {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
}

/// Regression-line projection with 1.96·σ prediction intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    pub validation: ForecastValidation,
}

/// Complete trend analysis of one metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub test_name: String,
    pub metric: MetricName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    pub points: Vec<TrendPoint>,
    pub statistics: TrendStatistics,
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    /// R²·(1−volatility), the raw strength score
    pub confidence: f64,

    pub moving_average: Vec<MovingAveragePoint>,
    pub anomalies: Vec<Anomaly>,
    pub change_points: Vec<ChangePoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,

    /// Lag-1..k autocorrelation, clipped to [-1, 1]
    pub autocorrelation: Vec<f64>,

    pub insights: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_buckets() {
        assert_eq!(TrendStrength::from_score(0.1), TrendStrength::Weak);
        assert_eq!(TrendStrength::from_score(0.4), TrendStrength::Moderate);
        assert_eq!(TrendStrength::from_score(0.6), TrendStrength::Strong);
        assert_eq!(TrendStrength::from_score(0.85), TrendStrength::VeryStrong);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(TrendDirection::Improving.to_string(), "improving");
        assert_eq!(TrendDirection::Stable.to_string(), "stable");
    }

    #[test]
    fn test_serde_tags_are_snake_case() {
        let json = serde_json::to_string(&AnomalySeverity::Severe).unwrap();
        assert_eq!(json, "\"severe\"");
        let json = serde_json::to_string(&TrendStrength::VeryStrong).unwrap();
        assert_eq!(json, "\"very_strong\"");
    }
}
