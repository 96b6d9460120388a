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

// ABOUTME: PostgreSQL-backed historic store for runs and expanded metrics
// Summary row and metric rows for a run commit in one transaction; file
// artifacts are best-effort and never gate DB state.

pub mod artifacts;
pub mod expand;
pub mod schema;

use benchwatch_types::{
    BenchmarkResult, BenchwatchError, HistoricRun, MetricName, MetricQuery, Result, RunConfig,
    RunFilter, RunListing, StorageConfig, TimeSeriesMetric, TrendPoint,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::future::Future;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Hard cap on `list_runs` page size; the default is 50.
pub const DEFAULT_RUN_LIMIT: u32 = 50;
pub const MAX_RUN_LIMIT: u32 = 1000;

/// Clamp a requested page size into [1, MAX_RUN_LIMIT].
pub fn effective_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
}

/// Map driver errors onto the domain error kinds.
///
/// Connection-level failures are retriable (`Transient`); unknown rows are
/// `NotFound`; everything else is `Fatal`.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> BenchwatchError {
    match e {
        sqlx::Error::RowNotFound => BenchwatchError::NotFound("row not found".to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            BenchwatchError::Transient(e.to_string())
        }
        sqlx::Error::Database(ref db) => {
            // 40001: serialization_failure, 40P01: deadlock_detected,
            // 57P01: admin_shutdown. All safe to retry.
            let retriable = matches!(
                db.code().as_deref(),
                Some("40001") | Some("40P01") | Some("57P01")
            );
            if retriable {
                BenchwatchError::Transient(e.to_string())
            } else {
                BenchwatchError::Fatal(e.to_string())
            }
        }
        other => BenchwatchError::Fatal(other.to_string()),
    }
}

/// Retry transient failures up to three attempts with exponential backoff.
pub(crate) async fn with_retry<T, F, Fut>(op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(100);
    let mut attempt = 1u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < 3 => {
                warn!(op, attempt, error = %e, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Aggregate counters for the dashboard stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_runs: i64,
    pub total_tests: i64,
    pub active_baselines: i64,
    pub regressions_last_7d: i64,
    pub runs_last_24h: i64,
    pub latest_run_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct IdState {
    last_base: String,
    counter: u32,
}

/// The historic store: one bounded pool shared by every engine.
pub struct HistoricStore {
    pool: PgPool,
    config: StorageConfig,
    id_state: Mutex<IdState>,
}

impl HistoricStore {
    /// Connect, bound the pool per config, and apply migrations.
    #[instrument(skip(config), fields(db = %config.postgres.database))]
    pub async fn connect(config: StorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres.max_open_conns)
            .min_connections(config.postgres.max_idle_conns.min(config.postgres.max_open_conns))
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.postgres.connection_url())
            .await
            .map_err(map_sqlx_error)?;

        schema::apply_migrations(&pool, &config.postgres).await?;
        info!("historic store ready");

        Ok(Self {
            pool,
            config,
            id_state: Mutex::new(IdState::default()),
        })
    }

    /// Build a store over an existing pool (integration tests).
    pub fn with_pool(pool: PgPool, config: StorageConfig) -> Self {
        Self {
            pool,
            config,
            id_state: Mutex::new(IdState::default()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn runs_table(&self) -> &str {
        &self.config.postgres.runs_table
    }

    fn metrics_table(&self) -> &str {
        &self.config.postgres.metrics_table
    }

    /// Assign a unique run id, resolving same-second collisions with a
    /// counter suffix.
    fn assign_run_id(&self, result: &BenchmarkResult, config: &RunConfig) -> String {
        let base = expand::format_run_id(result.start_time, &config.short_commit());
        let mut state = self.id_state.lock().expect("id state lock poisoned");
        if state.last_base == base {
            state.counter += 1;
            format!("{base}-{}", state.counter)
        } else {
            state.last_base = base.clone();
            state.counter = 0;
            base
        }
    }

    /// Persist a completed benchmark result.
    ///
    /// The summary row and every expanded metric row commit in a single
    /// transaction; a reader can never observe metrics without their
    /// summary. Artifacts are written afterwards, best-effort.
    #[instrument(skip_all, fields(test_name = %result.test_name))]
    pub async fn save_run(
        &self,
        result: &BenchmarkResult,
        run_config: &RunConfig,
    ) -> Result<HistoricRun> {
        result.validate()?;
        if !self.config.enable_historic {
            return Err(BenchwatchError::validation(
                "historic persistence is disabled by configuration",
            ));
        }

        let id = self.assign_run_id(result, run_config);
        let run = expand::build_summary(id.clone(), result, run_config);
        let rows = expand::expand_metrics(&id, result);
        let blob = expand::encode_result_blob(result)
            .map_err(|e| BenchwatchError::Fatal(format!("result serialization failed: {e}")))?;

        with_retry("save_run", || self.insert_run_tx(&run, &rows, &blob)).await?;
        debug!(run_id = %run.id, metric_rows = rows.len(), "run persisted");

        artifacts::write_run_artifacts(&self.config.historic_path, &run, result, run_config).await;

        Ok(run)
    }

    async fn insert_run_tx(
        &self,
        run: &HistoricRun,
        rows: &[TimeSeriesMetric],
        blob: &[u8],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let insert_run = format!(
            "INSERT INTO {} (id, timestamp, git_commit, git_branch, test_name, description, \
             config_hash, duration_seconds, total_requests, total_errors, overall_error_rate, \
             success_rate, avg_latency_ms, p50_latency_ms, p95_latency_ms, p99_latency_ms, \
             max_latency_ms, clients, methods, tags, performance_scores, metrics_incomplete, \
             full_result) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23)",
            self.runs_table()
        );
        sqlx::query(&insert_run)
            .bind(&run.id)
            .bind(run.timestamp)
            .bind(&run.git_commit)
            .bind(&run.git_branch)
            .bind(&run.test_name)
            .bind(&run.description)
            .bind(&run.config_hash)
            .bind(run.duration_seconds)
            .bind(run.total_requests as i64)
            .bind(run.total_errors as i64)
            .bind(run.overall_error_rate)
            .bind(run.success_rate)
            .bind(run.avg_latency_ms)
            .bind(run.p50_latency_ms)
            .bind(run.p95_latency_ms)
            .bind(run.p99_latency_ms)
            .bind(run.max_latency_ms)
            .bind(serde_json::json!(run.clients))
            .bind(serde_json::json!(run.methods))
            .bind(serde_json::json!(run.tags))
            .bind(serde_json::json!(run.performance_scores))
            .bind(run.metrics_incomplete)
            .bind(blob)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let insert_metric = format!(
            "INSERT INTO {} (time, run_id, client, method, metric_name, value, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.metrics_table()
        );
        for row in rows {
            sqlx::query(&insert_metric)
                .bind(row.time)
                .bind(&row.run_id)
                .bind(&row.client)
                .bind(&row.method)
                .bind(row.metric_name.as_str())
                .bind(row.value)
                .bind(serde_json::json!(row.tags))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    /// Fetch one run including its rehydrated full result.
    #[instrument(skip(self))]
    pub async fn get_run(&self, id: &str) -> Result<HistoricRun> {
        let sql = format!(
            "SELECT r.*, EXISTS(SELECT 1 FROM baselines b WHERE b.run_id = r.id AND b.active) \
             AS is_baseline FROM {} r WHERE r.id = $1",
            self.runs_table()
        );
        let row = with_retry("get_run", || async {
            sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?
        .ok_or_else(|| BenchwatchError::not_found(format!("run {id}")))?;

        let mut run = run_from_row(&row, true)?;
        run.is_baseline = row.try_get("is_baseline").unwrap_or(false);
        Ok(run)
    }

    fn build_list_query(&self, filter: &RunFilter, limit: u32) -> QueryBuilder<'static, Postgres> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT r.*, EXISTS(SELECT 1 FROM baselines b WHERE b.run_id = r.id AND b.active) \
             AS is_baseline FROM {} r WHERE 1=1",
            self.runs_table()
        ));

        if let Some(test_name) = &filter.test_name {
            qb.push(" AND r.test_name = ").push_bind(test_name.clone());
        }
        if let Some(branch) = &filter.git_branch {
            qb.push(" AND r.git_branch = ").push_bind(branch.clone());
        }
        if let Some(client) = &filter.client {
            qb.push(" AND r.clients @> ")
                .push_bind(serde_json::json!([client]));
        }
        if let Some(method) = &filter.method {
            qb.push(" AND r.methods @> ")
                .push_bind(serde_json::json!([method]));
        }
        if filter.baseline_only {
            qb.push(
                " AND EXISTS(SELECT 1 FROM baselines b2 WHERE b2.run_id = r.id AND b2.active)",
            );
        }
        if let Some(from) = filter.from {
            qb.push(" AND r.timestamp >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND r.timestamp <= ").push_bind(to);
        }
        qb.push(" ORDER BY r.timestamp DESC LIMIT ")
            .push_bind(limit as i64);
        qb
    }

    /// List runs newest-first with optional filters.
    #[instrument(skip(self, filter))]
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<RunListing> {
        let limit = effective_limit(filter.limit);

        // A fresh builder per attempt: a QueryBuilder cannot be rebuilt
        // after `build()` without a reset.
        let rows = with_retry("list_runs", || {
            let mut qb = self.build_list_query(filter, limit);
            async move {
                qb.build()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
        })
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut run = run_from_row(row, false)?;
            run.is_baseline = row.try_get("is_baseline").unwrap_or(false);
            runs.push(run);
        }

        Ok(RunListing {
            count: runs.len(),
            limit,
            runs,
        })
    }

    /// Newest-first runs of one test strictly before `before`, blobs included.
    /// Used by sequential and rolling regression detection.
    pub async fn runs_before(
        &self,
        test_name: &str,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<HistoricRun>> {
        let sql = format!(
            "SELECT r.* FROM {} r WHERE r.test_name = $1 AND r.timestamp < $2 \
             ORDER BY r.timestamp DESC LIMIT $3",
            self.runs_table()
        );
        let rows = with_retry("runs_before", || async {
            sqlx::query(&sql)
                .bind(test_name)
                .bind(before)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        rows.iter().map(|row| run_from_row(row, true)).collect()
    }

    fn build_metric_query(&self, query: &MetricQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT m.time, m.run_id, m.client, m.method, m.metric_name, m.value, m.tags \
             FROM {} m WHERE 1=1",
            self.metrics_table()
        ));

        if !query.metric_names.is_empty() {
            let names: Vec<String> = query
                .metric_names
                .iter()
                .map(|n| n.as_str().to_string())
                .collect();
            qb.push(" AND m.metric_name = ANY(").push_bind(names).push(")");
        }
        if let Some(test_name) = &query.test_name {
            qb.push(format!(
                " AND m.run_id IN (SELECT id FROM {} WHERE test_name = ",
                self.runs_table()
            ))
            .push_bind(test_name.clone())
            .push(")");
        }
        if let Some(client) = &query.client {
            qb.push(" AND m.client = ").push_bind(client.clone());
        }
        if let Some(method) = &query.method {
            qb.push(" AND m.method = ").push_bind(method.clone());
        }
        if let Some(from) = query.from {
            qb.push(" AND m.time >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND m.time <= ").push_bind(to);
        }
        qb.push(" ORDER BY m.time ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        qb
    }

    /// Select raw time-series points.
    #[instrument(skip(self, query))]
    pub async fn query_metrics(&self, query: &MetricQuery) -> Result<Vec<TimeSeriesMetric>> {
        let rows = with_retry("query_metrics", || {
            let mut qb = self.build_metric_query(query);
            async move {
                qb.build()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
        })
        .await?;

        rows.iter().map(metric_from_row).collect()
    }

    /// Time-ordered series of one metric for a test, for trend analysis.
    ///
    /// With a client the series reads that client's rows (method defaults to
    /// the `all` aggregate); without one it averages the aggregate rows
    /// across clients per run.
    pub async fn metric_series(
        &self,
        test_name: &str,
        metric: MetricName,
        client: Option<&str>,
        method: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>> {
        let method = method.unwrap_or(benchwatch_types::METHOD_ALL);

        let rows = with_retry("metric_series", || {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "SELECT m.time, m.run_id, AVG(m.value) AS value FROM {} m \
                 JOIN {} r ON r.id = m.run_id WHERE r.test_name = ",
                self.metrics_table(),
                self.runs_table()
            ));
            qb.push_bind(test_name.to_string());
            qb.push(" AND m.metric_name = ").push_bind(metric.as_str());
            qb.push(" AND m.method = ").push_bind(method.to_string());
            if let Some(client) = client {
                qb.push(" AND m.client = ").push_bind(client.to_string());
            }
            qb.push(" AND m.time >= ").push_bind(from);
            qb.push(" AND m.time <= ").push_bind(to);
            qb.push(" GROUP BY m.time, m.run_id ORDER BY m.time ASC");

            async move {
                qb.build()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)
            }
        })
        .await?;

        let points = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                Ok(TrendPoint {
                    index,
                    timestamp: row.try_get("time").map_err(map_sqlx_error)?,
                    run_id: row.try_get("run_id").map_err(map_sqlx_error)?,
                    value: row.try_get("value").map_err(map_sqlx_error)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(points)
    }

    /// Drop non-baseline runs older than the cutoff, with their metric rows
    /// and artifacts. Returns the number of runs removed.
    #[instrument(skip(self))]
    pub async fn delete_old(&self, before: DateTime<Utc>) -> Result<u64> {
        let select_victims = format!(
            "SELECT id FROM {} r WHERE r.timestamp < $1 AND NOT EXISTS \
             (SELECT 1 FROM baselines b WHERE b.run_id = r.id AND b.active)",
            self.runs_table()
        );
        let victims: Vec<String> = with_retry("delete_old/select", || async {
            sqlx::query(&select_victims)
                .bind(before)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?
        .iter()
        .map(|row| row.get::<String, _>("id"))
        .collect();

        if victims.is_empty() {
            return Ok(0);
        }

        let delete_metrics = format!(
            "DELETE FROM {} WHERE run_id = ANY($1)",
            self.metrics_table()
        );
        let delete_runs = format!("DELETE FROM {} WHERE id = ANY($1)", self.runs_table());

        with_retry("delete_old", || async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            sqlx::query(&delete_metrics)
                .bind(&victims)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            sqlx::query(&delete_runs)
                .bind(&victims)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            tx.commit().await.map_err(map_sqlx_error)
        })
        .await?;

        for id in &victims {
            artifacts::remove_run_artifacts(&self.config.historic_path, id).await;
        }

        info!(removed = victims.len(), "retention pass complete");
        Ok(victims.len() as u64)
    }

    /// One round-trip liveness probe for health checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Latest-known client list per test, for the Grafana target catalog.
    pub async fn test_catalog(&self) -> Result<Vec<(String, Vec<String>)>> {
        let sql = format!(
            "SELECT DISTINCT ON (test_name) test_name, clients FROM {} \
             ORDER BY test_name, timestamp DESC",
            self.runs_table()
        );
        let rows = with_retry("test_catalog", || async {
            sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        rows.iter()
            .map(|row| {
                let test_name: String = row.try_get("test_name").map_err(map_sqlx_error)?;
                let clients: Vec<String> =
                    serde_json::from_value(row.try_get("clients").map_err(map_sqlx_error)?)?;
                Ok((test_name, clients))
            })
            .collect()
    }

    /// Aggregate counters for the dashboard.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let sql = format!(
            "SELECT \
             (SELECT COUNT(*) FROM {runs}) AS total_runs, \
             (SELECT COUNT(DISTINCT test_name) FROM {runs}) AS total_tests, \
             (SELECT COUNT(*) FROM baselines WHERE active) AS active_baselines, \
             (SELECT COUNT(*) FROM regressions WHERE detected_at > now() - INTERVAL '7 days') \
                 AS regressions_last_7d, \
             (SELECT COUNT(*) FROM {runs} WHERE timestamp > now() - INTERVAL '24 hours') \
                 AS runs_last_24h, \
             (SELECT MAX(timestamp) FROM {runs}) AS latest_run_at",
            runs = self.runs_table()
        );
        let row = with_retry("dashboard_stats", || async {
            sqlx::query(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        Ok(DashboardStats {
            total_runs: row.try_get("total_runs").map_err(map_sqlx_error)?,
            total_tests: row.try_get("total_tests").map_err(map_sqlx_error)?,
            active_baselines: row.try_get("active_baselines").map_err(map_sqlx_error)?,
            regressions_last_7d: row
                .try_get("regressions_last_7d")
                .map_err(map_sqlx_error)?,
            runs_last_24h: row.try_get("runs_last_24h").map_err(map_sqlx_error)?,
            latest_run_at: row.try_get("latest_run_at").map_err(map_sqlx_error)?,
        })
    }
}

/// Map a runs-table row into a `HistoricRun`.
///
/// With `decode_blob` the full result is rehydrated; the blob's schema
/// version is checked and unknown versions are `Fatal`.
fn run_from_row(row: &PgRow, decode_blob: bool) -> Result<HistoricRun> {
    let clients: Vec<String> =
        serde_json::from_value(row.try_get("clients").map_err(map_sqlx_error)?)?;
    let methods: Vec<String> =
        serde_json::from_value(row.try_get("methods").map_err(map_sqlx_error)?)?;
    let tags: Vec<String> = serde_json::from_value(row.try_get("tags").map_err(map_sqlx_error)?)?;
    let performance_scores =
        serde_json::from_value(row.try_get("performance_scores").map_err(map_sqlx_error)?)?;

    let full_result = if decode_blob {
        let blob: Vec<u8> = row.try_get("full_result").map_err(map_sqlx_error)?;
        Some(expand::decode_result_blob(&blob).map_err(BenchwatchError::Fatal)?)
    } else {
        None
    };

    Ok(HistoricRun {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        timestamp: row.try_get("timestamp").map_err(map_sqlx_error)?,
        git_commit: row.try_get("git_commit").map_err(map_sqlx_error)?,
        git_branch: row.try_get("git_branch").map_err(map_sqlx_error)?,
        test_name: row.try_get("test_name").map_err(map_sqlx_error)?,
        description: row.try_get("description").map_err(map_sqlx_error)?,
        config_hash: row.try_get("config_hash").map_err(map_sqlx_error)?,
        duration_seconds: row.try_get("duration_seconds").map_err(map_sqlx_error)?,
        total_requests: row.try_get::<i64, _>("total_requests").map_err(map_sqlx_error)?.max(0)
            as u64,
        total_errors: row.try_get::<i64, _>("total_errors").map_err(map_sqlx_error)?.max(0) as u64,
        overall_error_rate: row.try_get("overall_error_rate").map_err(map_sqlx_error)?,
        success_rate: row.try_get("success_rate").map_err(map_sqlx_error)?,
        avg_latency_ms: row.try_get("avg_latency_ms").map_err(map_sqlx_error)?,
        p50_latency_ms: row
            .try_get::<Option<f64>, _>("p50_latency_ms")
            .map_err(map_sqlx_error)?
            .unwrap_or_default(),
        p95_latency_ms: row.try_get("p95_latency_ms").map_err(map_sqlx_error)?,
        p99_latency_ms: row
            .try_get::<Option<f64>, _>("p99_latency_ms")
            .map_err(map_sqlx_error)?
            .unwrap_or_default(),
        max_latency_ms: row
            .try_get::<Option<f64>, _>("max_latency_ms")
            .map_err(map_sqlx_error)?
            .unwrap_or_default(),
        clients,
        methods,
        tags,
        performance_scores,
        is_baseline: false,
        metrics_incomplete: row.try_get("metrics_incomplete").map_err(map_sqlx_error)?,
        full_result,
    })
}

fn metric_from_row(row: &PgRow) -> Result<TimeSeriesMetric> {
    let name: String = row.try_get("metric_name").map_err(map_sqlx_error)?;
    Ok(TimeSeriesMetric {
        time: row.try_get("time").map_err(map_sqlx_error)?,
        run_id: row.try_get("run_id").map_err(map_sqlx_error)?,
        client: row.try_get("client").map_err(map_sqlx_error)?,
        method: row.try_get("method").map_err(map_sqlx_error)?,
        metric_name: MetricName::from_str(&name)?,
        value: row.try_get("value").map_err(map_sqlx_error)?,
        tags: serde_json::from_value(row.try_get("tags").map_err(map_sqlx_error)?)
            .unwrap_or_default(),
    })
}
