// ABOUTME: Request model definitions for dashboard and Grafana endpoints

use benchwatch_types::{BenchwatchError, MetricName, MetricQuery, Result, RunFilter};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

/// Query parameters for `GET /api/runs`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunsQuery {
    pub test_name: Option<String>,
    pub git_branch: Option<String>,
    pub client: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub baseline_only: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl RunsQuery {
    pub fn into_filter(self) -> RunFilter {
        RunFilter {
            test_name: self.test_name,
            git_branch: self.git_branch,
            client: self.client,
            method: self.method,
            baseline_only: self.baseline_only,
            from: self.from,
            to: self.to,
            limit: self.limit,
        }
    }
}

/// Query parameters for the trend endpoints.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub test_name: String,
    /// Metric name; defaults to latency_avg
    pub metric: Option<String>,
    pub client: Option<String>,
    pub method: Option<String>,
    /// Trailing window in days; defaults to 30
    pub days: Option<u32>,
    /// Forecast horizon in points; 0 disables
    pub forecast: Option<usize>,
}

impl TrendQuery {
    pub fn metric_name(&self) -> Result<MetricName> {
        match &self.metric {
            Some(name) => MetricName::from_str(name),
            None => Ok(MetricName::LatencyAvg),
        }
    }
}

/// Query parameters for `GET /api/compare`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CompareQuery {
    pub run1: String,
    pub run2: String,
}

/// Body for `POST /api/baselines`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBaselineRequest {
    #[validate(length(min = 1))]
    pub run_id: String,

    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// Body for `POST /api/metrics/query`. Metric names arrive as strings and
/// are validated into the closed enum.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricQueryRequest {
    #[serde(default)]
    pub metrics: Vec<String>,
    pub test_name: Option<String>,
    pub client: Option<String>,
    pub method: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl MetricQueryRequest {
    pub fn into_query(self) -> Result<MetricQuery> {
        let metric_names = self
            .metrics
            .iter()
            .map(|name| MetricName::from_str(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricQuery {
            metric_names,
            test_name: self.test_name,
            client: self.client,
            method: self.method,
            from: self.from,
            to: self.to,
            limit: self.limit,
        })
    }
}

/// Body for `POST /api/regressions/{id}/acknowledge`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AcknowledgeRequest {
    #[validate(length(min = 1))]
    pub user: String,
}

/// A Grafana time value: RFC3339 or unix seconds/milliseconds.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum GrafanaTime {
    Text(String),
    Number(i64),
}

impl GrafanaTime {
    /// Values above 10^12 are unix milliseconds, others unix seconds.
    pub fn resolve(&self) -> Result<DateTime<Utc>> {
        match self {
            GrafanaTime::Text(text) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                    return Ok(parsed.with_timezone(&Utc));
                }
                let numeric: i64 = text.parse().map_err(|_| {
                    BenchwatchError::validation(format!("unparseable time value: {text}"))
                })?;
                GrafanaTime::Number(numeric).resolve()
            }
            GrafanaTime::Number(n) => {
                let (secs, millis) = if n.abs() >= 1_000_000_000_000 {
                    (n / 1000, n % 1000)
                } else {
                    (*n, 0)
                };
                Utc.timestamp_opt(secs, (millis * 1_000_000).unsigned_abs() as u32)
                    .single()
                    .ok_or_else(|| {
                        BenchwatchError::validation(format!("time value out of range: {n}"))
                    })
            }
        }
    }
}

/// Grafana time range.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrafanaRange {
    pub from: GrafanaTime,
    pub to: GrafanaTime,
}

/// Body for `POST /grafana/search`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GrafanaSearchRequest {
    #[serde(default)]
    pub target: String,
}

/// One requested target inside a Grafana query.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrafanaQueryTarget {
    pub target: String,
    /// "timeserie" (default) or "table"
    #[serde(default, rename = "type")]
    pub target_type: Option<String>,
}

/// Body for `POST /grafana/query`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaQueryRequest {
    pub range: GrafanaRange,
    #[serde(default)]
    pub targets: Vec<GrafanaQueryTarget>,
    #[serde(default)]
    pub max_data_points: Option<u32>,
}

/// Body for `POST /grafana/annotations`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrafanaAnnotationRequest {
    pub range: GrafanaRange,
    pub annotation: GrafanaAnnotationQuery,
}

/// The annotation descriptor Grafana echoes back.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GrafanaAnnotationQuery {
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_query_camel_case() {
        let query: RunsQuery =
            serde_json::from_str(r#"{"testName": "suite", "gitBranch": "main", "limit": 5}"#)
                .unwrap();
        let filter = query.into_filter();
        assert_eq!(filter.test_name.as_deref(), Some("suite"));
        assert_eq!(filter.git_branch.as_deref(), Some("main"));
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn test_metric_query_validates_names() {
        let request = MetricQueryRequest {
            metrics: vec!["latency_p95".to_string(), "throughput".to_string()],
            ..Default::default()
        };
        let query = request.into_query().unwrap();
        assert_eq!(query.metric_names.len(), 2);

        let bad = MetricQueryRequest {
            metrics: vec!["warp_factor".to_string()],
            ..Default::default()
        };
        assert!(bad.into_query().is_err());
    }

    #[test]
    fn test_grafana_time_rfc3339() {
        let time = GrafanaTime::Text("2025-07-01T12:00:00Z".to_string());
        let resolved = time.resolve().unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_grafana_time_unix_seconds_and_millis() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let seconds = expected.timestamp();
        assert_eq!(GrafanaTime::Number(seconds).resolve().unwrap(), expected);
        assert_eq!(
            GrafanaTime::Number(seconds * 1000).resolve().unwrap(),
            expected
        );
    }

    #[test]
    fn test_grafana_time_bad_text() {
        assert!(GrafanaTime::Text("yesterday".to_string()).resolve().is_err());
    }

    #[test]
    fn test_trend_query_metric_default() {
        let query = TrendQuery {
            test_name: "suite".to_string(),
            metric: None,
            client: None,
            method: None,
            days: None,
            forecast: None,
        };
        assert_eq!(query.metric_name().unwrap(), MetricName::LatencyAvg);
    }
}
