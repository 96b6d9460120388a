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

// ABOUTME: Regression detector: baseline, sequential and rolling-average modes
// Sequential and rolling comparisons classify on fixed relative bands
// (10/25/50 percent), baseline mode delegates to the family thresholds via
// the baseline comparison.

use crate::baseline::{compare_values, BaselineManager};
use crate::store::{map_sqlx_error, with_retry, HistoricStore};
use benchwatch_types::{
    risk_from_score, BenchwatchError, ClientRegressionAnalysis, ClientSnapshot,
    ComparisonMetricKind, DetectionFilter, HistoricRun, Regression, RegressionReport,
    RegressionSeverity, RegressionThresholds, Result, ROLLING_AVERAGE_BASELINE,
};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Relative severity bands for run-over-run comparisons.
const BAND_MEDIUM_PCT: f64 = 10.0;
const BAND_HIGH_PCT: f64 = 25.0;
const BAND_CRITICAL_PCT: f64 = 50.0;

/// Classify a run-over-run worsening magnitude. The family's minor
/// threshold is the detection floor; the fixed bands assign severity.
pub fn classify_relative(magnitude: f64, floor: f64) -> Option<RegressionSeverity> {
    if magnitude >= BAND_CRITICAL_PCT {
        Some(RegressionSeverity::Critical)
    } else if magnitude >= BAND_HIGH_PCT {
        Some(RegressionSeverity::High)
    } else if magnitude >= BAND_MEDIUM_PCT {
        Some(RegressionSeverity::Medium)
    } else if magnitude >= floor {
        Some(RegressionSeverity::Minor)
    } else {
        None
    }
}

/// Per-client snapshots extracted from a run's stored result.
fn client_snapshots(run: &HistoricRun) -> Result<HashMap<String, ClientSnapshot>> {
    let result = run.full_result.as_ref().ok_or_else(|| {
        BenchwatchError::Fatal(format!("run {} has no stored result blob", run.id))
    })?;
    Ok(result
        .client_metrics
        .iter()
        .map(|(name, metrics)| (name.clone(), ClientSnapshot::from_client_metrics(metrics)))
        .collect())
}

fn snapshot_value(snapshot: &ClientSnapshot, kind: ComparisonMetricKind) -> f64 {
    match kind {
        ComparisonMetricKind::AvgLatency => snapshot.avg_latency_ms,
        ComparisonMetricKind::P95Latency => snapshot.p95_latency_ms,
        ComparisonMetricKind::P99Latency => snapshot.p99_latency_ms,
        ComparisonMetricKind::ErrorRate => snapshot.error_rate,
        ComparisonMetricKind::Throughput => snapshot.throughput,
    }
}

/// Element-wise mean of several client snapshots.
fn average_snapshots(snapshots: &[&ClientSnapshot]) -> ClientSnapshot {
    let n = snapshots.len() as f64;
    if snapshots.is_empty() {
        return ClientSnapshot::default();
    }
    ClientSnapshot {
        avg_latency_ms: snapshots.iter().map(|s| s.avg_latency_ms).sum::<f64>() / n,
        p95_latency_ms: snapshots.iter().map(|s| s.p95_latency_ms).sum::<f64>() / n,
        p99_latency_ms: snapshots.iter().map(|s| s.p99_latency_ms).sum::<f64>() / n,
        error_rate: snapshots.iter().map(|s| s.error_rate).sum::<f64>() / n,
        throughput: snapshots.iter().map(|s| s.throughput).sum::<f64>() / n,
        total_requests: (snapshots.iter().map(|s| s.total_requests).sum::<u64>() as f64 / n) as u64,
    }
}

/// Compare a run's client snapshots against reference snapshots,
/// classifying on the relative bands.
pub fn detect_against_reference(
    run_id: &str,
    baseline_run_id: &str,
    current: &HashMap<String, ClientSnapshot>,
    reference: &HashMap<String, ClientSnapshot>,
    thresholds: &RegressionThresholds,
    filter: &DetectionFilter,
) -> Vec<Regression> {
    let detected_at = Utc::now();
    let mut regressions = Vec::new();

    let mut clients: Vec<_> = current.keys().collect();
    clients.sort();

    for client in clients {
        if !filter.allows_client(client) {
            continue;
        }
        let Some(reference_snapshot) = reference.get(client) else {
            continue;
        };
        let current_snapshot = &current[client];

        for kind in ComparisonMetricKind::ALL {
            let delta = compare_values(
                kind,
                snapshot_value(reference_snapshot, kind),
                snapshot_value(current_snapshot, kind),
            );
            if delta.is_improvement {
                continue;
            }

            let family = thresholds.for_metric(kind.as_str());
            let signed = if family.is_percentage {
                delta.abs_change
            } else {
                delta.pct_change
            };
            if !family.is_worsening(signed) {
                continue;
            }
            let magnitude = signed.abs();
            let Some(severity) = classify_relative(magnitude, family.minor) else {
                continue;
            };

            regressions.push(Regression {
                id: Uuid::new_v4().to_string(),
                run_id: run_id.to_string(),
                baseline_run_id: baseline_run_id.to_string(),
                client: client.clone(),
                metric: kind.as_str().to_string(),
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

/// Aggregate regressions into a report with health and risk scoring.
pub fn build_report(run_id: &str, regressions: Vec<Regression>) -> RegressionReport {
    let risk_score: u32 = regressions
        .iter()
        .map(|r| r.severity.weight())
        .sum::<u32>()
        .min(100);
    let health_score = 100 - risk_score;
    let overall_risk = risk_from_score(risk_score);

    let mut clients: HashMap<String, ClientRegressionAnalysis> = HashMap::new();
    for regression in &regressions {
        let entry = clients
            .entry(regression.client.clone())
            .or_insert_with(|| ClientRegressionAnalysis {
                client: regression.client.clone(),
                regression_count: 0,
                worst_severity: None,
                risk_level: benchwatch_types::RiskLevel::Low,
            });
        entry.regression_count += 1;
        entry.worst_severity = Some(match entry.worst_severity {
            Some(worst) => worst.max(regression.severity),
            None => regression.severity,
        });
    }
    for (client, analysis) in clients.iter_mut() {
        let client_score: u32 = regressions
            .iter()
            .filter(|r| &r.client == client)
            .map(|r| r.severity.weight())
            .sum::<u32>()
            .min(100);
        analysis.risk_level = risk_from_score(client_score);
    }

    let mut recommendations = Vec::new();
    let critical = regressions
        .iter()
        .filter(|r| r.severity == RegressionSeverity::Critical)
        .count();
    if critical > 0 {
        recommendations.push(format!(
            "{critical} critical regression(s); hold the release until they are understood"
        ));
    }
    for analysis in clients.values() {
        if analysis.risk_level >= benchwatch_types::RiskLevel::High {
            recommendations.push(format!(
                "Client {} carries {} regression(s); bisect recent changes against it",
                analysis.client, analysis.regression_count
            ));
        }
    }
    if regressions.is_empty() {
        recommendations.push("No regressions detected".to_string());
    }

    RegressionReport {
        run_id: run_id.to_string(),
        generated_at: Utc::now(),
        total_regressions: regressions.len(),
        risk_score,
        health_score,
        overall_risk,
        clients,
        recommendations,
        regressions,
    }
}

/// Detects and persists regressions across the three comparison modes.
pub struct RegressionDetector {
    store: Arc<HistoricStore>,
    baselines: Arc<BaselineManager>,
}

impl RegressionDetector {
    pub fn new(store: Arc<HistoricStore>, baselines: Arc<BaselineManager>) -> Self {
        Self { store, baselines }
    }

    /// Baseline mode: delegate to the baseline comparison thresholds.
    #[instrument(skip(self, thresholds))]
    pub async fn detect_baseline(
        &self,
        run_id: &str,
        baseline_name: &str,
        thresholds: &RegressionThresholds,
        filter: &DetectionFilter,
    ) -> Result<Vec<Regression>> {
        let regressions = self
            .baselines
            .detect_regressions(run_id, baseline_name, thresholds)
            .await?;
        Ok(regressions
            .into_iter()
            .filter(|r| filter.allows_client(&r.client))
            .filter(|r| r.method.as_deref().map_or(true, |m| filter.allows_method(m)))
            .collect())
    }

    /// Sequential mode: the most recent prior run of the same test is the
    /// reference. No prior runs means no regressions, not an error.
    #[instrument(skip(self, thresholds, filter))]
    pub async fn detect_sequential(
        &self,
        run_id: &str,
        lookback: u32,
        thresholds: &RegressionThresholds,
        filter: &DetectionFilter,
    ) -> Result<Vec<Regression>> {
        let run = self.store.get_run(run_id).await?;
        let priors = self
            .store
            .runs_before(&run.test_name, run.timestamp, lookback.max(1))
            .await?;

        let Some(reference_run) = priors.first() else {
            debug!(run_id, "no prior runs; sequential detection is empty");
            return Ok(Vec::new());
        };

        let current = client_snapshots(&run)?;
        let reference = client_snapshots(reference_run)?;
        Ok(detect_against_reference(
            run_id,
            &reference_run.id,
            &current,
            &reference,
            thresholds,
            filter,
        ))
    }

    /// Rolling mode: the element-wise mean of the last `window` prior runs
    /// is the reference, recorded under the synthetic baseline id.
    #[instrument(skip(self, thresholds, filter))]
    pub async fn detect_rolling(
        &self,
        run_id: &str,
        window: u32,
        thresholds: &RegressionThresholds,
        filter: &DetectionFilter,
    ) -> Result<Vec<Regression>> {
        let run = self.store.get_run(run_id).await?;
        let priors = self
            .store
            .runs_before(&run.test_name, run.timestamp, window.max(1))
            .await?;
        if priors.is_empty() {
            return Ok(Vec::new());
        }

        let prior_snapshots: Vec<HashMap<String, ClientSnapshot>> = priors
            .iter()
            .map(client_snapshots)
            .collect::<Result<Vec<_>>>()?;

        let current = client_snapshots(&run)?;
        let mut reference = HashMap::new();
        for client in current.keys() {
            let seen: Vec<&ClientSnapshot> = prior_snapshots
                .iter()
                .filter_map(|snapshots| snapshots.get(client))
                .collect();
            if !seen.is_empty() {
                reference.insert(client.clone(), average_snapshots(&seen));
            }
        }

        Ok(detect_against_reference(
            run_id,
            ROLLING_AVERAGE_BASELINE,
            &current,
            &reference,
            thresholds,
            filter,
        ))
    }

    /// Persist detected regressions.
    #[instrument(skip(self, regressions))]
    pub async fn save_regressions(&self, regressions: &[Regression]) -> Result<()> {
        if regressions.is_empty() {
            return Ok(());
        }
        let pool = self.store.pool();
        with_retry("save_regressions", || async {
            let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
            for regression in regressions {
                sqlx::query(
                    "INSERT INTO regressions \
                     (id, run_id, baseline_run_id, client, metric, method, baseline_value, \
                      current_value, abs_change, pct_change, severity, is_significant, \
                      detected_at, acknowledged_at, acknowledged_by) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(&regression.id)
                .bind(&regression.run_id)
                .bind(&regression.baseline_run_id)
                .bind(&regression.client)
                .bind(&regression.metric)
                .bind(&regression.method)
                .bind(regression.baseline_value)
                .bind(regression.current_value)
                .bind(regression.abs_change)
                .bind(regression.pct_change)
                .bind(regression.severity.to_string())
                .bind(regression.is_significant)
                .bind(regression.detected_at)
                .bind(regression.acknowledged_at)
                .bind(&regression.acknowledged_by)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            tx.commit().await.map_err(map_sqlx_error)
        })
        .await?;
        info!(count = regressions.len(), "regressions persisted");
        Ok(())
    }

    /// Stored regressions for a run, most severe first.
    pub async fn get_regressions(&self, run_id: &str) -> Result<Vec<Regression>> {
        let pool = self.store.pool();
        let rows = with_retry("get_regressions", || async {
            sqlx::query("SELECT * FROM regressions WHERE run_id = $1 ORDER BY detected_at")
                .bind(run_id)
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        let mut regressions = rows
            .iter()
            .map(regression_from_row)
            .collect::<Result<Vec<_>>>()?;
        regressions.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(regressions)
    }

    /// Stamp a regression acknowledged; unknown ids are `NotFound`.
    #[instrument(skip(self))]
    pub async fn acknowledge_regression(&self, id: &str, user: &str) -> Result<Regression> {
        let pool = self.store.pool();
        let row = with_retry("acknowledge_regression", || async {
            sqlx::query(
                "UPDATE regressions SET acknowledged_at = $2, acknowledged_by = $3 \
                 WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(Utc::now())
            .bind(user)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?
        .ok_or_else(|| BenchwatchError::not_found(format!("regression {id}")))?;

        regression_from_row(&row)
    }

    /// Report over a run's stored regressions.
    pub async fn report_for_run(&self, run_id: &str) -> Result<RegressionReport> {
        let regressions = self.get_regressions(run_id).await?;
        Ok(build_report(run_id, regressions))
    }

    /// Regressions detected inside a time window (Grafana annotations).
    pub async fn regressions_between(
        &self,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> Result<Vec<Regression>> {
        let pool = self.store.pool();
        let rows = with_retry("regressions_between", || async {
            sqlx::query(
                "SELECT * FROM regressions WHERE detected_at >= $1 AND detected_at <= $2 \
                 ORDER BY detected_at",
            )
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;
        rows.iter().map(regression_from_row).collect()
    }
}

fn regression_from_row(row: &PgRow) -> Result<Regression> {
    let severity: String = row.try_get("severity").map_err(map_sqlx_error)?;
    Ok(Regression {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        run_id: row.try_get("run_id").map_err(map_sqlx_error)?,
        baseline_run_id: row.try_get("baseline_run_id").map_err(map_sqlx_error)?,
        client: row.try_get("client").map_err(map_sqlx_error)?,
        metric: row.try_get("metric").map_err(map_sqlx_error)?,
        method: row.try_get("method").map_err(map_sqlx_error)?,
        baseline_value: row.try_get("baseline_value").map_err(map_sqlx_error)?,
        current_value: row.try_get("current_value").map_err(map_sqlx_error)?,
        abs_change: row.try_get("abs_change").map_err(map_sqlx_error)?,
        pct_change: row.try_get("pct_change").map_err(map_sqlx_error)?,
        severity: RegressionSeverity::from_str(&severity)?,
        is_significant: row.try_get("is_significant").map_err(map_sqlx_error)?,
        detected_at: row.try_get("detected_at").map_err(map_sqlx_error)?,
        acknowledged_at: row.try_get("acknowledged_at").map_err(map_sqlx_error)?,
        acknowledged_by: row.try_get("acknowledged_by").map_err(map_sqlx_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(avg: f64, error_rate: f64, throughput: f64) -> ClientSnapshot {
        ClientSnapshot {
            avg_latency_ms: avg,
            p95_latency_ms: avg * 2.0,
            p99_latency_ms: avg * 3.0,
            error_rate,
            throughput,
            total_requests: 1000,
        }
    }

    fn one_client(avg: f64, error_rate: f64, throughput: f64) -> HashMap<String, ClientSnapshot> {
        HashMap::from([("geth".to_string(), snapshot(avg, error_rate, throughput))])
    }

    #[test]
    fn test_sequential_latency_jump_is_high() {
        // Prior avg 150ms, current 200ms: +33.33% latency regression.
        let reference = one_client(150.0, 0.0, 100.0);
        // Hold the percentile columns at the reference values so only
        // avg_latency moves.
        let mut current = one_client(150.0, 0.0, 100.0);
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
        let r = &regressions[0];
        assert_eq!(r.metric, "avg_latency");
        assert_eq!(r.baseline_value, 150.0);
        assert_eq!(r.current_value, 200.0);
        assert!((r.pct_change - 33.333333).abs() < 1e-3);
        assert_eq!(r.severity, RegressionSeverity::High);
        assert_eq!(r.baseline_run_id, "run-1");
    }

    #[test]
    fn test_relative_band_boundaries() {
        let floor = 5.0;
        assert_eq!(classify_relative(4.0, floor), None);
        assert_eq!(classify_relative(6.0, floor), Some(RegressionSeverity::Minor));
        assert_eq!(classify_relative(12.0, floor), Some(RegressionSeverity::Medium));
        assert_eq!(classify_relative(30.0, floor), Some(RegressionSeverity::High));
        assert_eq!(classify_relative(55.0, floor), Some(RegressionSeverity::Critical));
    }

    #[test]
    fn test_improving_latency_is_never_a_regression() {
        let reference = one_client(200.0, 0.0, 100.0);
        let current = one_client(150.0, 0.0, 100.0);
        let regressions = detect_against_reference(
            "run-2",
            "run-1",
            &current,
            &reference,
            &RegressionThresholds::default(),
            &DetectionFilter::default(),
        );
        assert!(regressions.is_empty());
    }

    #[test]
    fn test_one_prior_run_bounds_regression_count() {
        // Every metric worse: the count is bounded by metrics · clients.
        let reference = one_client(100.0, 0.0, 1000.0);
        let current = one_client(300.0, 20.0, 100.0);
        let regressions = detect_against_reference(
            "run-2",
            "run-1",
            &current,
            &reference,
            &RegressionThresholds::default(),
            &DetectionFilter::default(),
        );
        assert!(regressions.len() <= ComparisonMetricKind::ALL.len());
        assert!(!regressions.is_empty());
    }

    #[test]
    fn test_filter_excludes_client() {
        let reference = one_client(100.0, 0.0, 100.0);
        let current = one_client(200.0, 0.0, 100.0);
        let filter = DetectionFilter {
            exclude_clients: vec!["geth".to_string()],
            ..Default::default()
        };
        let regressions = detect_against_reference(
            "run-2",
            "run-1",
            &current,
            &reference,
            &RegressionThresholds::default(),
            &filter,
        );
        assert!(regressions.is_empty());
    }

    #[test]
    fn test_rolling_average_reference() {
        let snapshots = [
            snapshot(100.0, 1.0, 500.0),
            snapshot(140.0, 2.0, 700.0),
            snapshot(120.0, 3.0, 600.0),
        ];
        let refs: Vec<&ClientSnapshot> = snapshots.iter().collect();
        let mean = average_snapshots(&refs);
        assert!((mean.avg_latency_ms - 120.0).abs() < 1e-9);
        assert!((mean.error_rate - 2.0).abs() < 1e-9);
        assert!((mean.throughput - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_scores_and_risk() {
        // 2 critical + 1 major-weight (high) = 80 ⇒ overall risk critical.
        let make = |severity| Regression {
            id: Uuid::new_v4().to_string(),
            run_id: "run-2".to_string(),
            baseline_run_id: "run-1".to_string(),
            client: "geth".to_string(),
            metric: "avg_latency".to_string(),
            method: None,
            baseline_value: 100.0,
            current_value: 200.0,
            abs_change: 100.0,
            pct_change: 100.0,
            severity,
            is_significant: true,
            detected_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
        };
        let report = build_report(
            "run-2",
            vec![
                make(RegressionSeverity::Critical),
                make(RegressionSeverity::Critical),
                make(RegressionSeverity::Major),
            ],
        );
        assert_eq!(report.risk_score, 80);
        assert_eq!(report.health_score, 20);
        assert_eq!(report.overall_risk, benchwatch_types::RiskLevel::Critical);
        assert_eq!(report.clients["geth"].regression_count, 3);
        assert_eq!(
            report.clients["geth"].worst_severity,
            Some(RegressionSeverity::Critical)
        );
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_empty_report_is_healthy() {
        let report = build_report("run-1", Vec::new());
        assert_eq!(report.risk_score, 0);
        assert_eq!(report.health_score, 100);
        assert_eq!(report.overall_risk, benchwatch_types::RiskLevel::Low);
        assert!(report.regressions.is_empty());
    }
}
