// ABOUTME: Anchor tests pinning the documented end-to-end analytics contracts
// These scenarios are stable behavioral contracts; a change that breaks one
// of them is a breaking change to the observatory, not a refactor.

use benchwatch_core::baseline::{build_comparison, regressions_from_comparison};
use benchwatch_core::regression::{build_report, detect_against_reference};
use benchwatch_core::store::expand::{
    build_summary, decode_result_blob, encode_result_blob, expand_metrics,
};
use benchwatch_core::trend::{build_analysis, TrendConfig};
use benchwatch_types::{
    AnomalySeverity, BaselineMetrics, BenchmarkResult, ClientMetrics, ClientSnapshot,
    ComparisonStatus, DetectionFilter, LatencyMetrics, MethodMetrics, MetricName, RegressionSeverity,
    RegressionThresholds, RiskLevel, RunConfig, TrendDirection, TrendPoint, TrendStrength,
};
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;

fn client(avg: f64, requests: u64, errors: u64, throughput: f64) -> ClientMetrics {
    ClientMetrics {
        total_requests: requests,
        total_errors: errors,
        error_rate: benchwatch_types::error_rate(errors, requests),
        latency: LatencyMetrics {
            avg,
            min: avg / 10.0,
            max: avg * 8.0,
            p50: avg * 0.9,
            p90: avg * 1.4,
            p95: avg * 1.8,
            p99: avg * 2.5,
            throughput,
        },
        methods: HashMap::from([(
            "eth_getBalance".to_string(),
            MethodMetrics {
                count: requests / 2,
                error_rate: 0.0,
                latency: LatencyMetrics {
                    avg,
                    ..LatencyMetrics::default()
                },
            },
        )]),
    }
}

fn result(clients: Vec<(&str, ClientMetrics)>) -> BenchmarkResult {
    BenchmarkResult {
        test_name: "mainnet-read".to_string(),
        description: String::new(),
        start_time: Utc.with_ymd_and_hms(2025, 7, 1, 6, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 7, 1, 6, 10, 0).unwrap(),
        duration_seconds: 600.0,
        client_metrics: clients
            .into_iter()
            .map(|(name, metrics)| (name.to_string(), metrics))
            .collect(),
    }
}

fn points(values: &[f64]) -> Vec<TrendPoint> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(index, value)| TrendPoint {
            index,
            timestamp: start + Duration::days(index as i64),
            run_id: format!("run-{index}"),
            value: *value,
        })
        .collect()
}

#[test]
fn summary_invariants_hold_for_every_persisted_run() {
    let result = result(vec![
        ("geth", client(22.0, 4000, 8, 250.0)),
        ("nethermind", client(31.0, 6000, 30, 410.0)),
    ]);
    result.validate().unwrap();
    let summary = build_summary("20250701-060000-abc1234".to_string(), &result, &RunConfig::default());

    // error_rate + success_rate ≈ 100 within 1e-9.
    assert!((summary.overall_error_rate + summary.success_rate - 100.0).abs() < 1e-9);

    // Summary agrees with blob aggregation.
    let blob = encode_result_blob(&result).unwrap();
    let decoded = decode_result_blob(&blob).unwrap();
    assert_eq!(decoded.total_requests(), summary.total_requests);
    assert_eq!(decoded.total_errors(), summary.total_errors);
    assert!((decoded.overall_avg_latency() - summary.avg_latency_ms).abs() < 1e-9);
}

#[test]
fn metric_row_count_law() {
    // Count of rows = Σ_clients (1 + |methods|) · |metric names|.
    let result = result(vec![
        ("geth", client(22.0, 4000, 8, 250.0)),
        ("nethermind", client(31.0, 6000, 30, 410.0)),
    ]);
    let rows = expand_metrics("r", &result);
    let expected: usize = result
        .client_metrics
        .values()
        .map(|c| (1 + c.methods.len()) * MetricName::ALL.len())
        .sum();
    assert_eq!(rows.len(), expected);
}

#[test]
fn scenario_improving_trend() {
    // Ten runs with avg_latency 200, 195, …, 155.
    let values: Vec<f64> = (0..10).map(|i| 200.0 - 5.0 * i as f64).collect();
    let analysis = build_analysis(
        "mainnet-read",
        MetricName::LatencyAvg,
        None,
        None,
        points(&values),
        &TrendConfig::default(),
        0,
    )
    .unwrap();

    assert_eq!(analysis.direction, TrendDirection::Improving);
    assert!(analysis.statistics.slope < 0.0);
    assert!(analysis.confidence > 0.5);
    assert!(matches!(
        analysis.strength,
        TrendStrength::Strong | TrendStrength::VeryStrong
    ));
}

#[test]
fn scenario_sequential_regression() {
    // Prior avg_latency 150ms, current 200ms.
    let reference = HashMap::from([(
        "geth".to_string(),
        ClientSnapshot {
            avg_latency_ms: 150.0,
            p95_latency_ms: 270.0,
            p99_latency_ms: 375.0,
            error_rate: 0.2,
            throughput: 500.0,
            total_requests: 10_000,
        },
    )]);
    let mut current = reference.clone();
    current.get_mut("geth").unwrap().avg_latency_ms = 200.0;

    let regressions = detect_against_reference(
        "run-2",
        "run-1",
        &current,
        &reference,
        &RegressionThresholds::default(),
        &DetectionFilter::default(),
    );

    assert_eq!(regressions.len(), 1);
    assert_eq!(regressions[0].metric, "avg_latency");
    assert_eq!(regressions[0].baseline_value, 150.0);
    assert_eq!(regressions[0].current_value, 200.0);
    assert!((regressions[0].pct_change - 100.0 / 3.0).abs() < 1e-2);
    assert_eq!(regressions[0].severity, RegressionSeverity::High);
}

#[test]
fn scenario_baseline_throughput_drop() {
    // Baseline 100 rps, current 80 rps, everything else unchanged.
    let base = BaselineMetrics::from_result(&result(vec![("geth", client(40.0, 1000, 0, 100.0))]));
    let curr = BaselineMetrics::from_result(&result(vec![("geth", client(40.0, 1000, 0, 80.0))]));

    let comparison = build_comparison("run-2", "release", "mainnet-read", &base, &curr);
    assert_eq!(comparison.status, ComparisonStatus::Degraded);
    assert!(!comparison.metrics["throughput"].is_improvement);
    assert!((comparison.metrics["throughput"].pct_change + 20.0).abs() < 1e-9);
    assert!(comparison.risk_level >= RiskLevel::Medium);

    let regressions =
        regressions_from_comparison(&comparison, "run-1", &RegressionThresholds::default());
    let throughput = regressions
        .iter()
        .find(|r| r.metric == "throughput")
        .expect("throughput regression present");
    assert_eq!(throughput.severity, RegressionSeverity::High);
}

#[test]
fn scenario_anomaly_injection() {
    let mut values = vec![150.0; 20];
    values[10] = 1000.0;
    let analysis = build_analysis(
        "mainnet-read",
        MetricName::LatencyAvg,
        None,
        None,
        points(&values),
        &TrendConfig::default(),
        0,
    )
    .unwrap();

    assert_eq!(analysis.anomalies.len(), 1);
    let spike = &analysis.anomalies[0];
    assert_eq!(spike.index, 10);
    assert!(spike.deviation_score > 2.0);
    assert!(matches!(
        spike.severity,
        AnomalySeverity::Moderate | AnomalySeverity::Severe
    ));
}

#[test]
fn scenario_risk_score() {
    // 2 critical + 1 major: risk score ≥ 80, overall risk critical.
    let make = |severity| benchwatch_types::Regression {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: "run-9".to_string(),
        baseline_run_id: "run-8".to_string(),
        client: "geth".to_string(),
        metric: "avg_latency".to_string(),
        method: None,
        baseline_value: 100.0,
        current_value: 300.0,
        abs_change: 200.0,
        pct_change: 200.0,
        severity,
        is_significant: true,
        detected_at: Utc::now(),
        acknowledged_at: None,
        acknowledged_by: None,
    };

    let report = build_report(
        "run-9",
        vec![
            make(RegressionSeverity::Critical),
            make(RegressionSeverity::Critical),
            make(RegressionSeverity::Major),
        ],
    );
    assert!(report.risk_score >= 80);
    assert_eq!(report.overall_risk, RiskLevel::Critical);
}

#[test]
fn tightening_thresholds_never_removes_detections() {
    let reference = HashMap::from([(
        "geth".to_string(),
        ClientSnapshot {
            avg_latency_ms: 100.0,
            p95_latency_ms: 180.0,
            p99_latency_ms: 250.0,
            error_rate: 0.5,
            throughput: 800.0,
            total_requests: 5_000,
        },
    )]);
    let mut current = reference.clone();
    {
        let geth = current.get_mut("geth").unwrap();
        geth.avg_latency_ms = 112.0;
        geth.throughput = 700.0;
    }

    let loose = RegressionThresholds::default();
    let mut tight = RegressionThresholds::default();
    tight.latency.minor = 1.0;
    tight.throughput.minor = 1.0;
    tight.error_rate.minor = 0.1;

    let loose_hits = detect_against_reference(
        "r2", "r1", &current, &reference, &loose, &DetectionFilter::default(),
    );
    let tight_hits = detect_against_reference(
        "r2", "r1", &current, &reference, &tight, &DetectionFilter::default(),
    );

    for hit in &loose_hits {
        assert!(
            tight_hits
                .iter()
                .any(|t| t.metric == hit.metric && t.client == hit.client),
            "tightening dropped {}",
            hit.metric
        );
    }
}

#[test]
fn zero_prior_runs_detection_shape() {
    // With no reference snapshots nothing is detected and nothing errors.
    let current = HashMap::from([("geth".to_string(), ClientSnapshot::default())]);
    let regressions = detect_against_reference(
        "r2",
        "r1",
        &current,
        &HashMap::new(),
        &RegressionThresholds::default(),
        &DetectionFilter::default(),
    );
    assert!(regressions.is_empty());
}
