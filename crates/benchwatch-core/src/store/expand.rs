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

// ABOUTME: Pure ingest transforms: run-id formation, summary computation, metric expansion
use benchwatch_types::{
    composite_score, BenchmarkResult, HistoricRun, MetricName, RunConfig, TimeSeriesMetric,
    METHOD_ALL,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Format the base run id `YYYYMMDD-HHMMSS-<shortcommit>` from the run's
/// UTC start time. Sub-second ties are resolved by the store, which appends
/// a counter suffix.
pub fn format_run_id(start: DateTime<Utc>, short_commit: &str) -> String {
    format!("{}-{}", start.format("%Y%m%d-%H%M%S"), short_commit)
}

/// Compute the summary row for a validated benchmark result.
pub fn build_summary(id: String, result: &BenchmarkResult, config: &RunConfig) -> HistoricRun {
    let performance_scores: HashMap<String, f64> = result
        .client_metrics
        .iter()
        .map(|(name, metrics)| {
            (
                name.clone(),
                composite_score(
                    metrics.latency.avg,
                    metrics.error_rate,
                    metrics.latency.throughput,
                ),
            )
        })
        .collect();

    let total_requests = result.total_requests();
    let total_errors = result.total_errors();
    let overall_error_rate = result.overall_error_rate();

    HistoricRun {
        id,
        timestamp: result.start_time,
        git_commit: config.git_commit.clone().unwrap_or_default(),
        git_branch: config.git_branch.clone().unwrap_or_default(),
        test_name: result.test_name.clone(),
        description: result.description.clone(),
        config_hash: config.config_hash(),
        duration_seconds: result.duration_seconds,
        total_requests,
        total_errors,
        overall_error_rate,
        success_rate: 100.0 - overall_error_rate,
        avg_latency_ms: result.overall_avg_latency(),
        p50_latency_ms: result.worst_latency(|l| l.p50),
        p95_latency_ms: result.worst_latency(|l| l.p95),
        p99_latency_ms: result.worst_latency(|l| l.p99),
        max_latency_ms: result.worst_latency(|l| l.max),
        clients: result.client_names(),
        methods: result.method_names(),
        tags: config.tags.clone(),
        performance_scores,
        is_baseline: false,
        metrics_incomplete: false,
        full_result: Some(result.clone()),
    }
}

/// Explode a result into time-series rows.
///
/// Per client: one `method = "all"` row per metric name, then one row per
/// metric name for each method. Every row carries the run's start time so a
/// run's points stay co-located.
pub fn expand_metrics(run_id: &str, result: &BenchmarkResult) -> Vec<TimeSeriesMetric> {
    let time = result.start_time;
    let mut rows = Vec::new();

    let mut clients: Vec<_> = result.client_metrics.iter().collect();
    clients.sort_by(|a, b| a.0.cmp(b.0));

    for (client, metrics) in clients {
        for name in MetricName::ALL {
            rows.push(TimeSeriesMetric {
                time,
                run_id: run_id.to_string(),
                client: client.clone(),
                method: METHOD_ALL.to_string(),
                metric_name: name,
                value: metrics.metric_value(name),
                tags: HashMap::new(),
            });
        }

        let mut methods: Vec<_> = metrics.methods.iter().collect();
        methods.sort_by(|a, b| a.0.cmp(b.0));

        for (method, method_metrics) in methods {
            for name in MetricName::ALL {
                rows.push(TimeSeriesMetric {
                    time,
                    run_id: run_id.to_string(),
                    client: client.clone(),
                    method: method.clone(),
                    metric_name: name,
                    value: method_metrics.metric_value(name),
                    tags: HashMap::new(),
                });
            }
        }
    }

    rows
}

/// Schema version prepended to the persisted full-result blob.
pub const BLOB_VERSION: u8 = 1;

/// Serialize the full result with a leading schema version byte.
pub fn encode_result_blob(result: &BenchmarkResult) -> serde_json::Result<Vec<u8>> {
    let mut blob = Vec::with_capacity(1024);
    blob.push(BLOB_VERSION);
    serde_json::to_writer(&mut blob, result)?;
    Ok(blob)
}

/// Decode a persisted blob, rejecting unknown schema versions.
pub fn decode_result_blob(blob: &[u8]) -> Result<BenchmarkResult, String> {
    match blob.split_first() {
        Some((&BLOB_VERSION, body)) => {
            serde_json::from_slice(body).map_err(|e| format!("corrupt result blob: {e}"))
        }
        Some((version, _)) => Err(format!("unknown result blob version {version}")),
        None => Err("empty result blob".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_types::{ClientMetrics, LatencyMetrics, MethodMetrics};
    use chrono::TimeZone;

    fn result_with(clients: &[(&str, &[&str])]) -> BenchmarkResult {
        let client_metrics = clients
            .iter()
            .map(|(client, methods)| {
                let methods = methods
                    .iter()
                    .map(|m| {
                        (
                            m.to_string(),
                            MethodMetrics {
                                count: 100,
                                error_rate: 0.0,
                                latency: LatencyMetrics::default(),
                            },
                        )
                    })
                    .collect();
                (
                    client.to_string(),
                    ClientMetrics {
                        total_requests: 1000,
                        total_errors: 25,
                        error_rate: 2.5,
                        latency: LatencyMetrics {
                            avg: 15.0,
                            min: 1.0,
                            max: 200.0,
                            p50: 12.0,
                            p90: 22.0,
                            p95: 30.0,
                            p99: 55.0,
                            throughput: 120.0,
                        },
                        methods,
                    },
                )
            })
            .collect();

        BenchmarkResult {
            test_name: "suite".to_string(),
            description: "nightly".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 7, 4, 8, 30, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 7, 4, 8, 40, 0).unwrap(),
            duration_seconds: 600.0,
            client_metrics,
        }
    }

    #[test]
    fn test_run_id_format() {
        let start = Utc.with_ymd_and_hms(2025, 7, 4, 8, 30, 0).unwrap();
        assert_eq!(format_run_id(start, "abc1234"), "20250704-083000-abc1234");
        assert_eq!(format_run_id(start, "unknown"), "20250704-083000-unknown");
    }

    #[test]
    fn test_expansion_row_count_law() {
        // Count must equal Σ_clients (1 + |methods|) · |metric names|.
        let result = result_with(&[
            ("geth", &["eth_call", "eth_getBalance"]),
            ("nethermind", &["eth_call"]),
        ]);
        let rows = expand_metrics("r1", &result);
        let expected = ((1 + 2) + (1 + 1)) * MetricName::ALL.len();
        assert_eq!(rows.len(), expected);
    }

    #[test]
    fn test_expansion_all_rows_share_run_start() {
        let result = result_with(&[("geth", &["eth_call"])]);
        let rows = expand_metrics("r1", &result);
        assert!(rows.iter().all(|r| r.time == result.start_time));
        assert!(rows.iter().all(|r| r.run_id == "r1"));
    }

    #[test]
    fn test_expansion_has_aggregate_and_method_rows() {
        let result = result_with(&[("geth", &["eth_call"])]);
        let rows = expand_metrics("r1", &result);

        let aggregate: Vec<_> = rows.iter().filter(|r| r.method == METHOD_ALL).collect();
        let scoped: Vec<_> = rows.iter().filter(|r| r.method == "eth_call").collect();
        assert_eq!(aggregate.len(), MetricName::ALL.len());
        assert_eq!(scoped.len(), MetricName::ALL.len());

        let p95 = aggregate
            .iter()
            .find(|r| r.metric_name == MetricName::LatencyP95)
            .unwrap();
        assert_eq!(p95.value, 30.0);
    }

    #[test]
    fn test_summary_agrees_with_blob_aggregation() {
        let result = result_with(&[("geth", &["eth_call"]), ("reth", &[])]);
        let summary = build_summary("r1".to_string(), &result, &RunConfig::default());

        assert_eq!(summary.total_requests, 2000);
        assert_eq!(summary.total_errors, 50);
        assert!((summary.overall_error_rate - 2.5).abs() < 1e-9);
        assert!((summary.overall_error_rate + summary.success_rate - 100.0).abs() < 1e-9);
        assert_eq!(summary.clients, vec!["geth", "reth"]);
        assert_eq!(summary.methods, vec!["eth_call"]);
        assert_eq!(summary.performance_scores.len(), 2);
    }

    #[test]
    fn test_blob_round_trip() {
        let result = result_with(&[("geth", &["eth_call"])]);
        let blob = encode_result_blob(&result).unwrap();
        assert_eq!(blob[0], BLOB_VERSION);
        let back = decode_result_blob(&blob).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_blob_unknown_version_rejected() {
        let result = result_with(&[("geth", &[])]);
        let mut blob = encode_result_blob(&result).unwrap();
        blob[0] = 9;
        let err = decode_result_blob(&blob).unwrap_err();
        assert!(err.contains("unknown result blob version"));
    }
}
