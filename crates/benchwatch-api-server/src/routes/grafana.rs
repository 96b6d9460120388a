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

// ABOUTME: Grafana simple-JSON datasource adaptor: search, query, annotations, metadata
// Targets look like `<test>.<client|overall>.<metric>`, optionally wrapped in
// rate()/delta()/count(). A malformed target degrades to empty points, never
// a 5xx for the whole request.

use crate::models::errors::ApiError;
use crate::models::requests::{
    GrafanaAnnotationRequest, GrafanaQueryRequest, GrafanaSearchRequest,
};
use crate::models::responses::{
    GrafanaAnnotation, GrafanaColumn, GrafanaMetricMetadata, GrafanaQueryResponse, GrafanaTable,
    GrafanaTimeSeries,
};
use crate::state::AppState;
use axum::extract::State;
use axum::response::Json;
use benchwatch_types::{MetricName, TrendPoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Pseudo-client selecting the cross-client aggregate series.
pub const OVERALL_CLIENT: &str = "overall";

/// Aggregation wrappers accepted around a plain target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Rate,
    Delta,
    Count,
}

impl Aggregation {
    fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Rate => "rate",
            Aggregation::Delta => "delta",
            Aggregation::Count => "count",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed Grafana target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTarget {
    pub test: String,
    /// `None` selects the cross-client aggregate ("overall")
    pub client: Option<String>,
    pub metric: MetricName,
    pub aggregation: Option<Aggregation>,
}

/// Render a target back to its string form.
pub fn format_metric_target(target: &MetricTarget) -> String {
    let client = target.client.as_deref().unwrap_or(OVERALL_CLIENT);
    let plain = format!("{}.{}.{}", target.test, client, target.metric);
    match target.aggregation {
        Some(aggregation) => format!("{aggregation}({plain})"),
        None => plain,
    }
}

/// Parse `<test>.<client|overall>.<metric>`, optionally wrapped in an
/// aggregation. Returns `None` for anything malformed; test names may
/// themselves contain dots, so the metric and client bind from the right.
pub fn parse_metric_target(input: &str) -> Option<MetricTarget> {
    let input = input.trim();

    let (aggregation, inner) = match input.split_once('(') {
        Some((wrapper, rest)) => {
            let body = rest.strip_suffix(')')?;
            let aggregation = match wrapper {
                "rate" => Aggregation::Rate,
                "delta" => Aggregation::Delta,
                "count" => Aggregation::Count,
                _ => return None,
            };
            (Some(aggregation), body)
        }
        None => (None, input),
    };

    let (rest, metric_str) = inner.rsplit_once('.')?;
    let (test, client_str) = rest.rsplit_once('.')?;
    if test.is_empty() || client_str.is_empty() {
        return None;
    }
    let metric = MetricName::from_str(metric_str).ok()?;

    let client = if client_str == OVERALL_CLIENT {
        None
    } else {
        Some(client_str.to_string())
    };

    Some(MetricTarget {
        test: test.to_string(),
        client,
        metric,
        aggregation,
    })
}

/// Apply an aggregation wrapper to a fetched series.
fn apply_aggregation(points: &[TrendPoint], aggregation: Option<Aggregation>) -> Vec<(f64, i64)> {
    let raw: Vec<(f64, i64)> = points
        .iter()
        .map(|p| (p.value, p.timestamp.timestamp_millis()))
        .collect();

    match aggregation {
        None => raw,
        Some(Aggregation::Delta) => raw
            .windows(2)
            .map(|pair| (pair[1].0 - pair[0].0, pair[1].1))
            .collect(),
        Some(Aggregation::Rate) => raw
            .windows(2)
            .map(|pair| {
                let dt_secs = ((pair[1].1 - pair[0].1) as f64 / 1000.0).max(1e-9);
                ((pair[1].0 - pair[0].0) / dt_secs, pair[1].1)
            })
            .collect(),
        Some(Aggregation::Count) => raw
            .iter()
            .enumerate()
            .map(|(i, point)| ((i + 1) as f64, point.1))
            .collect(),
    }
}

/// Datasource liveness probe (`GET /grafana/`).
#[instrument(skip_all)]
pub async fn grafana_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

/// Available targets, filtered by the request's substring.
#[utoipa::path(
    post,
    path = "/grafana/search",
    responses((status = 200, description = "Available metric targets")),
    tag = "Grafana"
)]
#[instrument(skip(state, request))]
pub async fn grafana_search(
    State(state): State<AppState>,
    Json(request): Json<GrafanaSearchRequest>,
) -> Result<Json<Vec<String>>, ApiError> {
    let catalog = state.store.test_catalog().await?;
    let needle = request.target.to_lowercase();

    let mut targets = Vec::new();
    for (test, clients) in &catalog {
        let mut scopes: Vec<String> = vec![OVERALL_CLIENT.to_string()];
        scopes.extend(clients.iter().cloned());
        for scope in &scopes {
            for metric in MetricName::ALL {
                let plain = format!("{test}.{scope}.{metric}");
                if needle.is_empty() || plain.to_lowercase().contains(&needle) {
                    targets.push(plain);
                }
            }
        }
    }
    targets.sort();
    Ok(Json(targets))
}

/// Series or table data per target. A bad target yields empty points.
#[utoipa::path(
    post,
    path = "/grafana/query",
    responses((status = 200, description = "Per-target series or tables")),
    tag = "Grafana"
)]
#[instrument(skip(state, request))]
pub async fn grafana_query(
    State(state): State<AppState>,
    Json(request): Json<GrafanaQueryRequest>,
) -> Result<Json<Vec<GrafanaQueryResponse>>, ApiError> {
    let from = request.range.from.resolve()?;
    let to = request.range.to.resolve()?;

    let mut responses = Vec::with_capacity(request.targets.len());
    for requested in &request.targets {
        let Some(target) = parse_metric_target(&requested.target) else {
            debug!(target = %requested.target, "malformed target; returning empty points");
            responses.push(GrafanaQueryResponse::TimeSeries(GrafanaTimeSeries {
                target: requested.target.clone(),
                datapoints: Vec::new(),
            }));
            continue;
        };

        // Degrade per target on fetch errors too; one broken target must not
        // fail the whole panel refresh.
        let points = match state
            .store
            .metric_series(
                &target.test,
                target.metric,
                target.client.as_deref(),
                None,
                from,
                to,
            )
            .await
        {
            Ok(points) => points,
            Err(e) => {
                debug!(target = %requested.target, error = %e, "target fetch failed");
                Vec::new()
            }
        };

        let mut datapoints: Vec<(f64, i64)> = apply_aggregation(&points, target.aggregation);
        if let Some(cap) = request.max_data_points {
            let cap = cap as usize;
            if datapoints.len() > cap && cap > 0 {
                let stride = datapoints.len().div_ceil(cap);
                datapoints = datapoints.into_iter().step_by(stride).collect();
            }
        }

        if requested.target_type.as_deref() == Some("table") {
            responses.push(GrafanaQueryResponse::Table(GrafanaTable {
                columns: vec![
                    GrafanaColumn {
                        text: "Time".to_string(),
                        column_type: "time".to_string(),
                    },
                    GrafanaColumn {
                        text: "Value".to_string(),
                        column_type: "number".to_string(),
                    },
                ],
                rows: datapoints
                    .into_iter()
                    .map(|(value, time)| {
                        vec![serde_json::json!(time), serde_json::json!(value)]
                    })
                    .collect(),
                response_type: "table".to_string(),
            }));
        } else {
            responses.push(GrafanaQueryResponse::TimeSeries(GrafanaTimeSeries {
                target: requested.target.clone(),
                datapoints: datapoints
                    .into_iter()
                    .map(|(value, time)| [value, time as f64])
                    .collect(),
            }));
        }
    }

    Ok(Json(responses))
}

/// Regressions, baseline events and deployment markers inside the range.
#[utoipa::path(
    post,
    path = "/grafana/annotations",
    responses((status = 200, description = "Annotation markers")),
    tag = "Grafana"
)]
#[instrument(skip(state, request))]
pub async fn grafana_annotations(
    State(state): State<AppState>,
    Json(request): Json<GrafanaAnnotationRequest>,
) -> Result<Json<Vec<GrafanaAnnotation>>, ApiError> {
    let from = request.range.from.resolve()?;
    let to = request.range.to.resolve()?;
    let mut annotations = Vec::new();

    for regression in state.detector.regressions_between(from, to).await? {
        annotations.push(GrafanaAnnotation {
            annotation: request.annotation.clone(),
            time: regression.detected_at.timestamp_millis(),
            title: format!("{} regression: {}", regression.severity, regression.metric),
            text: format!(
                "{} {} went {:.2} → {:.2} ({:+.1}%)",
                regression.client,
                regression.metric,
                regression.baseline_value,
                regression.current_value,
                regression.pct_change
            ),
            tags: vec!["regression".to_string(), regression.severity.to_string()],
        });
    }

    for baseline in state.baselines.updated_between(from, to).await? {
        annotations.push(GrafanaAnnotation {
            annotation: request.annotation.clone(),
            time: baseline.updated_at.timestamp_millis(),
            title: format!("baseline {}", baseline.name),
            text: format!(
                "baseline {} of {} pinned to run {}",
                baseline.name, baseline.test_name, baseline.run_id
            ),
            tags: vec!["baseline".to_string()],
        });
    }

    // Deployment markers: a run whose commit differs from the previous run
    // of the same test marks a new build under test.
    let listing = state
        .store
        .list_runs(&benchwatch_types::RunFilter {
            from: Some(from),
            to: Some(to),
            limit: Some(benchwatch_core::store::MAX_RUN_LIMIT),
            ..Default::default()
        })
        .await?;
    let mut by_test: std::collections::HashMap<&str, Vec<&benchwatch_types::HistoricRun>> =
        std::collections::HashMap::new();
    for run in &listing.runs {
        by_test.entry(run.test_name.as_str()).or_default().push(run);
    }
    for runs in by_test.values_mut() {
        runs.sort_by_key(|r| r.timestamp);
        for pair in runs.windows(2) {
            if pair[1].git_commit != pair[0].git_commit && !pair[1].git_commit.is_empty() {
                annotations.push(GrafanaAnnotation {
                    annotation: request.annotation.clone(),
                    time: pair[1].timestamp.timestamp_millis(),
                    title: format!("deploy {}", &pair[1].git_commit),
                    text: format!(
                        "{} now benchmarking commit {} (branch {})",
                        pair[1].test_name, pair[1].git_commit, pair[1].git_branch
                    ),
                    tags: vec!["deployment".to_string()],
                });
            }
        }
    }

    annotations.sort_by_key(|a| a.time);
    Ok(Json(annotations))
}

/// Metric metadata: unit, help text and labels.
#[utoipa::path(
    get,
    path = "/grafana/metrics",
    responses((status = 200, description = "Metric metadata")),
    tag = "Grafana"
)]
#[instrument(skip_all)]
pub async fn grafana_metrics() -> Json<Vec<GrafanaMetricMetadata>> {
    let metadata = MetricName::ALL
        .iter()
        .map(|metric| GrafanaMetricMetadata {
            name: metric.to_string(),
            unit: metric.unit().to_string(),
            help: metric_help(*metric).to_string(),
            labels: vec![
                "test".to_string(),
                "client".to_string(),
                "method".to_string(),
            ],
        })
        .collect();
    Json(metadata)
}

fn metric_help(metric: MetricName) -> &'static str {
    match metric {
        MetricName::LatencyAvg => "Mean request latency",
        MetricName::LatencyMin => "Fastest observed request",
        MetricName::LatencyMax => "Slowest observed request",
        MetricName::LatencyP50 => "Median request latency",
        MetricName::LatencyP90 => "90th percentile latency",
        MetricName::LatencyP95 => "95th percentile latency",
        MetricName::LatencyP99 => "99th percentile latency",
        MetricName::ErrorRate => "Failed requests as a percentage of total",
        MetricName::SuccessRate => "Successful requests as a percentage of total",
        MetricName::Throughput => "Requests served per second",
        MetricName::TotalRequests => "Total requests issued",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_target() {
        let target = parse_metric_target("my_test.geth.error_rate").unwrap();
        assert_eq!(target.test, "my_test");
        assert_eq!(target.client.as_deref(), Some("geth"));
        assert_eq!(target.metric, MetricName::ErrorRate);
        assert_eq!(target.aggregation, None);
    }

    #[test]
    fn test_parse_wrapped_target() {
        let target = parse_metric_target("rate(my_test.geth.error_rate)").unwrap();
        assert_eq!(target.test, "my_test");
        assert_eq!(target.client.as_deref(), Some("geth"));
        assert_eq!(target.metric, MetricName::ErrorRate);
        assert_eq!(target.aggregation, Some(Aggregation::Rate));
    }

    #[test]
    fn test_parse_overall_scope() {
        let target = parse_metric_target("suite.overall.latency_p95").unwrap();
        assert_eq!(target.client, None);
    }

    #[test]
    fn test_parse_dotted_test_name() {
        let target = parse_metric_target("eth.mainnet.read.geth.throughput").unwrap();
        assert_eq!(target.test, "eth.mainnet.read");
        assert_eq!(target.client.as_deref(), Some("geth"));
        assert_eq!(target.metric, MetricName::Throughput);
    }

    #[test]
    fn test_malformed_targets_return_none() {
        assert!(parse_metric_target("foo.bar").is_none());
        assert!(parse_metric_target("").is_none());
        assert!(parse_metric_target("suite.geth.warp_factor").is_none());
        assert!(parse_metric_target("median(suite.geth.latency_avg)").is_none());
        assert!(parse_metric_target("rate(suite.geth.latency_avg").is_none());
    }

    #[test]
    fn test_format_parse_round_trip() {
        let cases = [
            MetricTarget {
                test: "suite".to_string(),
                client: Some("geth".to_string()),
                metric: MetricName::LatencyAvg,
                aggregation: None,
            },
            MetricTarget {
                test: "eth.read".to_string(),
                client: None,
                metric: MetricName::Throughput,
                aggregation: Some(Aggregation::Delta),
            },
            MetricTarget {
                test: "t".to_string(),
                client: Some("nethermind".to_string()),
                metric: MetricName::ErrorRate,
                aggregation: Some(Aggregation::Rate),
            },
        ];
        for case in cases {
            let formatted = format_metric_target(&case);
            let parsed = parse_metric_target(&formatted).unwrap();
            assert_eq!(parsed, case, "round trip failed for {formatted}");
        }
    }

    #[test]
    fn test_apply_delta_and_rate() {
        use chrono::{Duration, TimeZone, Utc};
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let points: Vec<TrendPoint> = [10.0, 14.0, 13.0]
            .iter()
            .enumerate()
            .map(|(i, v)| TrendPoint {
                index: i,
                timestamp: start + Duration::seconds(i as i64 * 2),
                run_id: format!("r{i}"),
                value: *v,
            })
            .collect();

        let delta = apply_aggregation(&points, Some(Aggregation::Delta));
        assert_eq!(delta.len(), 2);
        assert!((delta[0].0 - 4.0).abs() < 1e-9);
        assert!((delta[1].0 + 1.0).abs() < 1e-9);

        let rate = apply_aggregation(&points, Some(Aggregation::Rate));
        assert!((rate[0].0 - 2.0).abs() < 1e-9);

        let count = apply_aggregation(&points, Some(Aggregation::Count));
        assert_eq!(count[2].0, 3.0);
    }
}
