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

// ABOUTME: Baseline manager: named pinned runs, snapshots, and run-vs-baseline comparison
use crate::store::{map_sqlx_error, with_retry, HistoricStore};
use benchwatch_types::{
    categorize_deviation, composite_score, Baseline, BaselineComparison, BaselineHistoryPoint,
    BaselineMetrics, BenchwatchError, ClientComparison, ClientSnapshot, ComparisonMetric,
    ComparisonMetricKind, ComparisonStatus, Regression, RegressionSeverity, RegressionThresholds,
    Result, RiskLevel,
};
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Composite-score change (percent) below which a client is "stable".
const CLIENT_STABILITY_BAND_PCT: f64 = 3.0;

/// Manages named baselines and baseline-vs-run comparisons.
pub struct BaselineManager {
    store: Arc<HistoricStore>,
}

impl BaselineManager {
    pub fn new(store: Arc<HistoricStore>) -> Self {
        Self { store }
    }

    /// Pin a run under a baseline name, caching its metric snapshot.
    ///
    /// Upserting an existing name re-points it (and reactivates it if soft
    /// deleted), but the owning test is immutable: re-pointing across tests
    /// is a `Conflict`.
    #[instrument(skip(self))]
    pub async fn set_baseline(
        &self,
        run_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Baseline> {
        if name.trim().is_empty() {
            return Err(BenchwatchError::validation("baseline name must not be empty"));
        }

        let run = self.store.get_run(run_id).await?;
        let result = run.full_result.as_ref().ok_or_else(|| {
            BenchwatchError::Fatal(format!("run {run_id} has no stored result blob"))
        })?;
        let metrics = BaselineMetrics::from_result(result);

        if let Some(existing) = self.fetch_baseline_row(name, false).await? {
            if existing.test_name != run.test_name {
                return Err(BenchwatchError::Conflict(format!(
                    "baseline {name} belongs to test {}, not {}",
                    existing.test_name, run.test_name
                )));
            }
        }

        let now = Utc::now();
        let metrics_json = serde_json::to_value(&metrics)?;
        let pool = self.store.pool();
        with_retry("set_baseline", || async {
            sqlx::query(
                "INSERT INTO baselines \
                 (name, test_name, run_id, description, metrics, tags, created_at, updated_at, active) \
                 VALUES ($1, $2, $3, $4, $5, '[]', $6, $6, TRUE) \
                 ON CONFLICT (name) DO UPDATE SET \
                 run_id = EXCLUDED.run_id, description = EXCLUDED.description, \
                 metrics = EXCLUDED.metrics, updated_at = EXCLUDED.updated_at, active = TRUE",
            )
            .bind(name)
            .bind(&run.test_name)
            .bind(run_id)
            .bind(description)
            .bind(&metrics_json)
            .bind(now)
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;
            Ok(())
        })
        .await?;

        info!(baseline = name, run_id, "baseline set");
        self.get_baseline(name).await
    }

    /// Fetch one active baseline by name.
    pub async fn get_baseline(&self, name: &str) -> Result<Baseline> {
        self.fetch_baseline_row(name, true)
            .await?
            .ok_or_else(|| BenchwatchError::not_found(format!("baseline {name}")))
    }

    async fn fetch_baseline_row(&self, name: &str, active_only: bool) -> Result<Option<Baseline>> {
        let sql = if active_only {
            "SELECT * FROM baselines WHERE name = $1 AND active"
        } else {
            "SELECT * FROM baselines WHERE name = $1"
        };
        let pool = self.store.pool();
        let row = with_retry("get_baseline", || async {
            sqlx::query(sql)
                .bind(name)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;
        row.as_ref().map(baseline_from_row).transpose()
    }

    /// List active baselines, optionally per test, ordered by
    /// (test_name, created_at desc).
    pub async fn list(&self, test_name: Option<&str>) -> Result<Vec<Baseline>> {
        let pool = self.store.pool();
        let rows = with_retry("list_baselines", || async {
            match test_name {
                Some(test) => {
                    sqlx::query(
                        "SELECT * FROM baselines WHERE active AND test_name = $1 \
                         ORDER BY test_name, created_at DESC",
                    )
                    .bind(test)
                    .fetch_all(pool)
                    .await
                }
                None => {
                    sqlx::query(
                        "SELECT * FROM baselines WHERE active \
                         ORDER BY test_name, created_at DESC",
                    )
                    .fetch_all(pool)
                    .await
                }
            }
            .map_err(map_sqlx_error)
        })
        .await?;
        rows.iter().map(baseline_from_row).collect()
    }

    /// Soft-delete a baseline; subsequent gets report not-found.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let pool = self.store.pool();
        let affected = with_retry("delete_baseline", || async {
            sqlx::query("UPDATE baselines SET active = FALSE, updated_at = $2 WHERE name = $1 AND active")
                .bind(name)
                .bind(Utc::now())
                .execute(pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(BenchwatchError::not_found(format!("baseline {name}")));
        }
        info!(baseline = name, "baseline deactivated");
        Ok(())
    }

    /// Compare a run against a named baseline of the same test.
    #[instrument(skip(self))]
    pub async fn compare_to_baseline(
        &self,
        run_id: &str,
        name: &str,
    ) -> Result<BaselineComparison> {
        let baseline = self.get_baseline(name).await?;
        let run = self.store.get_run(run_id).await?;

        if run.test_name != baseline.test_name {
            return Err(BenchwatchError::validation(format!(
                "run {run_id} is test {}, baseline {name} is test {}",
                run.test_name, baseline.test_name
            )));
        }

        let result = run.full_result.as_ref().ok_or_else(|| {
            BenchwatchError::Fatal(format!("run {run_id} has no stored result blob"))
        })?;
        let current = BaselineMetrics::from_result(result);

        Ok(build_comparison(
            run_id,
            &baseline.name,
            &baseline.test_name,
            &baseline.metrics,
            &current,
        ))
    }

    /// Compare a run against every active baseline of its test.
    pub async fn compare_to_all_baselines(&self, run_id: &str) -> Result<Vec<BaselineComparison>> {
        let run = self.store.get_run(run_id).await?;
        let result = run.full_result.as_ref().ok_or_else(|| {
            BenchwatchError::Fatal(format!("run {run_id} has no stored result blob"))
        })?;
        let current = BaselineMetrics::from_result(result);

        let baselines = self.list(Some(&run.test_name)).await?;
        Ok(baselines
            .iter()
            .map(|b| build_comparison(run_id, &b.name, &b.test_name, &b.metrics, &current))
            .collect())
    }

    /// Detect regressions of a run against a baseline, most severe first.
    #[instrument(skip(self, thresholds))]
    pub async fn detect_regressions(
        &self,
        run_id: &str,
        name: &str,
        thresholds: &RegressionThresholds,
    ) -> Result<Vec<Regression>> {
        let comparison = self.compare_to_baseline(run_id, name).await?;
        let baseline = self.get_baseline(name).await?;
        Ok(regressions_from_comparison(
            &comparison,
            &baseline.run_id,
            thresholds,
        ))
    }

    /// Baselines touched inside a time window (Grafana annotations).
    pub async fn updated_between(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Baseline>> {
        let pool = self.store.pool();
        let rows = with_retry("baselines_between", || async {
            sqlx::query(
                "SELECT * FROM baselines WHERE updated_at >= $1 AND updated_at <= $2 \
                 ORDER BY updated_at",
            )
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;
        rows.iter().map(baseline_from_row).collect()
    }

    /// Deviation history of a baseline's test inside the window.
    #[instrument(skip(self))]
    pub async fn history(&self, name: &str, days: u32) -> Result<Vec<BaselineHistoryPoint>> {
        let baseline = self.get_baseline(name).await?;
        let from = Utc::now() - Duration::days(days as i64);

        let filter = benchwatch_types::RunFilter {
            test_name: Some(baseline.test_name.clone()),
            from: Some(from),
            limit: Some(crate::store::MAX_RUN_LIMIT),
            ..Default::default()
        };
        let listing = self.store.list_runs(&filter).await?;

        let reference = baseline.metrics.avg_latency_ms;
        let mut points: Vec<BaselineHistoryPoint> = listing
            .runs
            .iter()
            .map(|run| {
                let deviation_pct = if reference == 0.0 {
                    0.0
                } else {
                    (run.avg_latency_ms - reference) / reference * 100.0
                };
                BaselineHistoryPoint {
                    run_id: run.id.clone(),
                    timestamp: run.timestamp,
                    avg_latency_ms: run.avg_latency_ms,
                    deviation_pct,
                    category: categorize_deviation(deviation_pct),
                }
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

fn baseline_from_row(row: &PgRow) -> Result<Baseline> {
    Ok(Baseline {
        name: row.try_get("name").map_err(map_sqlx_error)?,
        test_name: row.try_get("test_name").map_err(map_sqlx_error)?,
        run_id: row.try_get("run_id").map_err(map_sqlx_error)?,
        description: row.try_get("description").map_err(map_sqlx_error)?,
        metrics: serde_json::from_value(row.try_get("metrics").map_err(map_sqlx_error)?)?,
        tags: serde_json::from_value(row.try_get("tags").map_err(map_sqlx_error)?)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
        active: row.try_get("active").map_err(map_sqlx_error)?,
    })
}

fn overall_value(metrics: &BaselineMetrics, kind: ComparisonMetricKind) -> f64 {
    match kind {
        ComparisonMetricKind::AvgLatency => metrics.avg_latency_ms,
        ComparisonMetricKind::P95Latency => metrics.p95_latency_ms,
        ComparisonMetricKind::P99Latency => metrics.p99_latency_ms,
        ComparisonMetricKind::ErrorRate => metrics.error_rate,
        ComparisonMetricKind::Throughput => metrics.throughput,
    }
}

fn client_value(snapshot: &ClientSnapshot, kind: ComparisonMetricKind) -> f64 {
    match kind {
        ComparisonMetricKind::AvgLatency => snapshot.avg_latency_ms,
        ComparisonMetricKind::P95Latency => snapshot.p95_latency_ms,
        ComparisonMetricKind::P99Latency => snapshot.p99_latency_ms,
        ComparisonMetricKind::ErrorRate => snapshot.error_rate,
        ComparisonMetricKind::Throughput => snapshot.throughput,
    }
}

/// Compare one metric family between a baseline and a current value.
pub fn compare_values(kind: ComparisonMetricKind, baseline: f64, current: f64) -> ComparisonMetric {
    let abs_change = current - baseline;
    let pct_change = if baseline == 0.0 {
        0.0
    } else {
        abs_change / baseline * 100.0
    };

    let is_improvement = if kind.higher_is_better() {
        current > baseline
    } else {
        current < baseline
    };
    let is_significant = if kind.absolute_significance() {
        abs_change.abs() > 0.01
    } else {
        pct_change.abs() > 5.0
    };

    ComparisonMetric {
        baseline,
        current,
        abs_change,
        pct_change,
        is_improvement,
        is_significant,
    }
}

fn client_status(score_change_pct: f64) -> ComparisonStatus {
    if score_change_pct > CLIENT_STABILITY_BAND_PCT {
        ComparisonStatus::Improved
    } else if score_change_pct < -CLIENT_STABILITY_BAND_PCT {
        ComparisonStatus::Degraded
    } else {
        ComparisonStatus::Stable
    }
}

/// Overall status: significant overall-metric changes dominate; with none,
/// fall back to a majority vote across client statuses.
fn overall_status(
    metrics: &HashMap<String, ComparisonMetric>,
    clients: &HashMap<String, ClientComparison>,
) -> ComparisonStatus {
    let degraded = metrics
        .values()
        .filter(|m| m.is_significant && !m.is_improvement)
        .count();
    let improved = metrics
        .values()
        .filter(|m| m.is_significant && m.is_improvement)
        .count();

    match (improved, degraded) {
        (0, 0) => {}
        (_, 0) => return ComparisonStatus::Improved,
        (0, _) => return ComparisonStatus::Degraded,
        _ => return ComparisonStatus::Mixed,
    }

    let total = clients.len();
    if total == 0 {
        return ComparisonStatus::Stable;
    }
    let count = |status: ComparisonStatus| {
        clients.values().filter(|c| c.status == status).count()
    };
    for status in [
        ComparisonStatus::Improved,
        ComparisonStatus::Degraded,
        ComparisonStatus::Stable,
    ] {
        if count(status) * 2 > total {
            return status;
        }
    }
    ComparisonStatus::Mixed
}

/// Risk from the worst non-improving overall change, escalated for severe
/// per-client error-rate or latency regressions.
fn risk_level(
    metrics: &HashMap<String, ComparisonMetric>,
    clients: &HashMap<String, ClientComparison>,
) -> RiskLevel {
    let worst_pct = metrics
        .values()
        .filter(|m| !m.is_improvement)
        .map(|m| m.pct_change.abs())
        .fold(0.0, f64::max);

    let mut level = if worst_pct > 25.0 {
        RiskLevel::Critical
    } else if worst_pct > 15.0 {
        RiskLevel::High
    } else if worst_pct > 5.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    for comparison in clients.values() {
        if let Some(error) = comparison.metrics.get(ComparisonMetricKind::ErrorRate.as_str()) {
            if !error.is_improvement && error.abs_change.abs() > 5.0 {
                return RiskLevel::Critical;
            }
        }
        if let Some(latency) = comparison.metrics.get(ComparisonMetricKind::AvgLatency.as_str()) {
            if !latency.is_improvement && latency.pct_change.abs() > 50.0 {
                return RiskLevel::Critical;
            }
            if !latency.is_improvement && latency.pct_change.abs() > 25.0 {
                level = level.max(RiskLevel::High);
            }
        }
    }
    level
}

fn comparison_summary(
    status: ComparisonStatus,
    risk: RiskLevel,
    metrics: &HashMap<String, ComparisonMetric>,
) -> String {
    let significant: Vec<String> = metrics
        .iter()
        .filter(|(_, m)| m.is_significant)
        .map(|(name, m)| format!("{name} {:+.1}%", m.pct_change))
        .collect();
    if significant.is_empty() {
        format!("Run is {status} vs baseline (risk {risk}); no significant metric changes")
    } else {
        format!(
            "Run is {status} vs baseline (risk {risk}): {}",
            significant.join(", ")
        )
    }
}

fn comparison_recommendations(
    metrics: &HashMap<String, ComparisonMetric>,
    clients: &HashMap<String, ClientComparison>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(error) = metrics.get(ComparisonMetricKind::ErrorRate.as_str()) {
        if error.is_significant && !error.is_improvement {
            recommendations.push(format!(
                "Error rate rose {:.2} points; inspect client logs before promoting this build",
                error.abs_change
            ));
        }
    }
    if let Some(throughput) = metrics.get(ComparisonMetricKind::Throughput.as_str()) {
        if throughput.is_significant && !throughput.is_improvement {
            recommendations.push(format!(
                "Throughput dropped {:.1}%; check for connection pool or GC pressure",
                throughput.pct_change.abs()
            ));
        }
    }
    for (name, comparison) in clients {
        if comparison.status == ComparisonStatus::Degraded {
            recommendations.push(format!(
                "Client {name} degraded {:.1}% on composite score; profile it against the baseline run",
                comparison.score_change_pct.abs()
            ));
        }
    }
    if recommendations.is_empty() {
        recommendations.push("No action needed; metrics are within expected bounds".to_string());
    }
    recommendations
}

/// Pure comparison over two snapshots (the current one is derived from the
/// run's stored result).
pub fn build_comparison(
    run_id: &str,
    baseline_name: &str,
    test_name: &str,
    baseline: &BaselineMetrics,
    current: &BaselineMetrics,
) -> BaselineComparison {
    let mut metrics = HashMap::new();
    for kind in ComparisonMetricKind::ALL {
        metrics.insert(
            kind.as_str().to_string(),
            compare_values(kind, overall_value(baseline, kind), overall_value(current, kind)),
        );
    }

    let mut clients = HashMap::new();
    for (name, baseline_client) in &baseline.per_client {
        let Some(current_client) = current.per_client.get(name) else {
            continue;
        };

        let mut client_metrics = HashMap::new();
        for kind in ComparisonMetricKind::ALL {
            client_metrics.insert(
                kind.as_str().to_string(),
                compare_values(
                    kind,
                    client_value(baseline_client, kind),
                    client_value(current_client, kind),
                ),
            );
        }

        let baseline_score = composite_score(
            baseline_client.avg_latency_ms,
            baseline_client.error_rate,
            baseline_client.throughput,
        );
        let current_score = composite_score(
            current_client.avg_latency_ms,
            current_client.error_rate,
            current_client.throughput,
        );
        let score_change_pct = if baseline_score == 0.0 {
            0.0
        } else {
            (current_score - baseline_score) / baseline_score * 100.0
        };

        clients.insert(
            name.clone(),
            ClientComparison {
                client: name.clone(),
                metrics: client_metrics,
                score_change_pct,
                status: client_status(score_change_pct),
            },
        );
    }

    let status = overall_status(&metrics, &clients);
    let risk = risk_level(&metrics, &clients);
    let summary = comparison_summary(status, risk, &metrics);
    let recommendations = comparison_recommendations(&metrics, &clients);

    BaselineComparison {
        run_id: run_id.to_string(),
        baseline_name: baseline_name.to_string(),
        test_name: test_name.to_string(),
        metrics,
        clients,
        status,
        risk_level: risk,
        summary,
        recommendations,
        compared_at: Utc::now(),
    }
}

/// Upconvert a comparison's flagged per-client metrics into regression rows,
/// sorted most severe first.
pub fn regressions_from_comparison(
    comparison: &BaselineComparison,
    baseline_run_id: &str,
    thresholds: &RegressionThresholds,
) -> Vec<Regression> {
    let mut regressions = Vec::new();
    let detected_at = Utc::now();

    for (client, client_comparison) in &comparison.clients {
        for (metric, delta) in &client_comparison.metrics {
            if delta.is_improvement {
                continue;
            }
            let family = thresholds.for_metric(metric);
            if !family.is_worsening(if family.is_percentage {
                delta.abs_change
            } else {
                delta.pct_change
            }) {
                continue;
            }
            let magnitude = if family.is_percentage {
                delta.abs_change.abs()
            } else {
                delta.pct_change.abs()
            };
            let Some(severity) = family.classify(magnitude) else {
                continue;
            };

            regressions.push(Regression {
                id: Uuid::new_v4().to_string(),
                run_id: comparison.run_id.clone(),
                baseline_run_id: baseline_run_id.to_string(),
                client: client.clone(),
                metric: metric.clone(),
                method: None,
                baseline_value: delta.baseline,
                current_value: delta.current,
                abs_change: delta.abs_change,
                pct_change: delta.pct_change,
                severity,
                is_significant: delta.is_significant,
                detected_at,
                acknowledged_at: None,
                acknowledged_by: None,
            });
        }
    }

    regressions.sort_by(|a, b| b.severity.cmp(&a.severity));
    regressions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(avg: f64, error_rate: f64, throughput: f64) -> BaselineMetrics {
        BaselineMetrics {
            avg_latency_ms: avg,
            p50_latency_ms: avg * 0.8,
            p95_latency_ms: avg * 2.0,
            p99_latency_ms: avg * 3.0,
            max_latency_ms: avg * 10.0,
            error_rate,
            throughput,
            total_requests: 10_000,
            per_client: HashMap::from([(
                "geth".to_string(),
                ClientSnapshot {
                    avg_latency_ms: avg,
                    p95_latency_ms: avg * 2.0,
                    p99_latency_ms: avg * 3.0,
                    error_rate,
                    throughput,
                    total_requests: 10_000,
                },
            )]),
        }
    }

    #[test]
    fn test_compare_values_zero_baseline_guard() {
        let delta = compare_values(ComparisonMetricKind::AvgLatency, 0.0, 50.0);
        assert_eq!(delta.pct_change, 0.0);
        assert_eq!(delta.abs_change, 50.0);
    }

    #[test]
    fn test_improvement_sign_rules() {
        // Lower latency improves.
        assert!(compare_values(ComparisonMetricKind::AvgLatency, 100.0, 80.0).is_improvement);
        assert!(!compare_values(ComparisonMetricKind::AvgLatency, 100.0, 120.0).is_improvement);
        // Higher throughput improves.
        assert!(compare_values(ComparisonMetricKind::Throughput, 100.0, 120.0).is_improvement);
        assert!(!compare_values(ComparisonMetricKind::Throughput, 100.0, 80.0).is_improvement);
    }

    #[test]
    fn test_significance_rules() {
        // Latency is significant past 5% relative change.
        assert!(!compare_values(ComparisonMetricKind::AvgLatency, 100.0, 104.0).is_significant);
        assert!(compare_values(ComparisonMetricKind::AvgLatency, 100.0, 106.0).is_significant);
        // Error rate is significant past 0.01 absolute points.
        assert!(!compare_values(ComparisonMetricKind::ErrorRate, 0.50, 0.505).is_significant);
        assert!(compare_values(ComparisonMetricKind::ErrorRate, 0.50, 0.52).is_significant);
    }

    #[test]
    fn test_throughput_drop_scenario() {
        // Baseline 100 rps, current 80 rps, latency and errors unchanged.
        let baseline = snapshot(100.0, 0.0, 100.0);
        let current = snapshot(100.0, 0.0, 80.0);

        let comparison = build_comparison("run-1", "release-1.0", "suite", &baseline, &current);

        let throughput = &comparison.metrics["throughput"];
        assert!(!throughput.is_improvement);
        assert!((throughput.pct_change + 20.0).abs() < 1e-9);
        assert_eq!(comparison.status, ComparisonStatus::Degraded);
        assert!(comparison.risk_level >= RiskLevel::Medium);

        let regressions = regressions_from_comparison(
            &comparison,
            "base-run",
            &RegressionThresholds::default(),
        );
        let throughput_regression = regressions
            .iter()
            .find(|r| r.metric == "throughput")
            .expect("throughput regression detected");
        assert_eq!(throughput_regression.severity, RegressionSeverity::High);
        assert_eq!(throughput_regression.baseline_value, 100.0);
        assert_eq!(throughput_regression.current_value, 80.0);
    }

    #[test]
    fn test_unchanged_metrics_are_stable_low_risk() {
        let baseline = snapshot(50.0, 0.2, 900.0);
        let comparison = build_comparison("run-1", "b", "suite", &baseline, &baseline.clone());
        assert_eq!(comparison.status, ComparisonStatus::Stable);
        assert_eq!(comparison.risk_level, RiskLevel::Low);
        let regressions = regressions_from_comparison(
            &comparison,
            "base-run",
            &RegressionThresholds::default(),
        );
        assert!(regressions.is_empty());
    }

    #[test]
    fn test_error_rate_spike_escalates_to_critical() {
        let baseline = snapshot(50.0, 0.1, 500.0);
        let current = snapshot(50.0, 8.0, 500.0);
        let comparison = build_comparison("run-1", "b", "suite", &baseline, &current);
        assert_eq!(comparison.risk_level, RiskLevel::Critical);
        assert_eq!(comparison.status, ComparisonStatus::Degraded);
    }

    #[test]
    fn test_improvement_never_regresses() {
        // Latency down 40%: improvement, no regression rows for it.
        let baseline = snapshot(100.0, 0.0, 500.0);
        let current = snapshot(60.0, 0.0, 500.0);
        let comparison = build_comparison("run-1", "b", "suite", &baseline, &current);
        let regressions = regressions_from_comparison(
            &comparison,
            "base-run",
            &RegressionThresholds::default(),
        );
        assert!(regressions.iter().all(|r| !r.metric.contains("latency")));
        assert_eq!(comparison.status, ComparisonStatus::Improved);
    }

    #[test]
    fn test_regressions_sorted_most_severe_first() {
        // Latency +60% (critical), throughput -18% (high).
        let baseline = snapshot(100.0, 0.0, 1000.0);
        let mut current = snapshot(160.0, 0.0, 820.0);
        current.per_client.get_mut("geth").unwrap().throughput = 820.0;
        let comparison = build_comparison("run-1", "b", "suite", &baseline, &current);
        let regressions = regressions_from_comparison(
            &comparison,
            "base-run",
            &RegressionThresholds::default(),
        );
        assert!(regressions.len() >= 2);
        for pair in regressions.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
        assert_eq!(regressions[0].severity, RegressionSeverity::Critical);
    }

    #[test]
    fn test_comparison_summary_mentions_significant_changes() {
        let baseline = snapshot(100.0, 0.0, 100.0);
        let current = snapshot(100.0, 0.0, 80.0);
        let comparison = build_comparison("run-1", "b", "suite", &baseline, &current);
        assert!(comparison.summary.contains("throughput"));
        assert!(!comparison.recommendations.is_empty());
    }
}
