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

// ABOUTME: Versioned schema migrations for runs, metrics, baselines and regressions
// Migration 3 upgrades the metrics table to a TimescaleDB hypertable when the
// extension is present; its failure is logged and never fatal.

use crate::store::map_sqlx_error;
use benchwatch_types::{PostgresConfig, Result};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

/// One schema migration step.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    /// Statements executed inside one transaction
    pub statements: Vec<String>,
}

/// The ordered migration list for the configured table names.
pub fn migrations(config: &PostgresConfig) -> Vec<Migration> {
    let runs = &config.runs_table;
    let metrics = &config.metrics_table;

    vec![
        Migration {
            version: 1,
            name: "base schema",
            statements: vec![
                format!(
                    r#"CREATE TABLE IF NOT EXISTS {runs} (
                        id TEXT PRIMARY KEY,
                        timestamp TIMESTAMPTZ NOT NULL,
                        git_commit TEXT NOT NULL DEFAULT '',
                        git_branch TEXT NOT NULL DEFAULT '',
                        test_name TEXT NOT NULL,
                        description TEXT NOT NULL DEFAULT '',
                        config_hash TEXT NOT NULL DEFAULT '',
                        duration_seconds DOUBLE PRECISION NOT NULL DEFAULT 0,
                        total_requests BIGINT NOT NULL DEFAULT 0,
                        total_errors BIGINT NOT NULL DEFAULT 0,
                        overall_error_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
                        success_rate DOUBLE PRECISION NOT NULL DEFAULT 100,
                        avg_latency_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                        p95_latency_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                        clients JSONB NOT NULL DEFAULT '[]',
                        methods JSONB NOT NULL DEFAULT '[]',
                        tags JSONB NOT NULL DEFAULT '[]',
                        performance_scores JSONB NOT NULL DEFAULT '{{}}',
                        metrics_incomplete BOOLEAN NOT NULL DEFAULT FALSE,
                        full_result BYTEA NOT NULL
                    )"#
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{runs}_test_time \
                     ON {runs} (test_name, timestamp DESC)"
                ),
                format!(
                    r#"CREATE TABLE IF NOT EXISTS {metrics} (
                        time TIMESTAMPTZ NOT NULL,
                        run_id TEXT NOT NULL,
                        client TEXT NOT NULL,
                        method TEXT NOT NULL,
                        metric_name TEXT NOT NULL,
                        value DOUBLE PRECISION NOT NULL,
                        tags JSONB NOT NULL DEFAULT '{{}}',
                        PRIMARY KEY (time, run_id, client, method, metric_name)
                    )"#
                ),
                format!("CREATE INDEX IF NOT EXISTS idx_{metrics}_run ON {metrics} (run_id)"),
                format!("CREATE INDEX IF NOT EXISTS idx_{metrics}_time ON {metrics} (time DESC)"),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{metrics}_client_method \
                     ON {metrics} (client, method)"
                ),
                r#"CREATE TABLE IF NOT EXISTS baselines (
                    name TEXT PRIMARY KEY,
                    test_name TEXT NOT NULL,
                    run_id TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    metrics JSONB NOT NULL,
                    tags JSONB NOT NULL DEFAULT '[]',
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    active BOOLEAN NOT NULL DEFAULT TRUE
                )"#
                .to_string(),
                "CREATE INDEX IF NOT EXISTS idx_baselines_test ON baselines (test_name, created_at DESC)"
                    .to_string(),
                r#"CREATE TABLE IF NOT EXISTS regressions (
                    id TEXT PRIMARY KEY,
                    run_id TEXT NOT NULL,
                    baseline_run_id TEXT NOT NULL DEFAULT '',
                    client TEXT NOT NULL,
                    metric TEXT NOT NULL,
                    method TEXT,
                    baseline_value DOUBLE PRECISION NOT NULL,
                    current_value DOUBLE PRECISION NOT NULL,
                    abs_change DOUBLE PRECISION NOT NULL,
                    pct_change DOUBLE PRECISION NOT NULL,
                    severity TEXT NOT NULL,
                    is_significant BOOLEAN NOT NULL,
                    detected_at TIMESTAMPTZ NOT NULL,
                    acknowledged_at TIMESTAMPTZ,
                    acknowledged_by TEXT
                )"#
                .to_string(),
                "CREATE INDEX IF NOT EXISTS idx_regressions_run ON regressions (run_id)".to_string(),
            ],
        },
        // The original schema carried only avg+p95 and synthesized p99/max on
        // read. These columns make the percentiles first-class; the backfill
        // keeps old rows readable (p99/max degrade to the stored p95).
        Migration {
            version: 2,
            name: "first-class latency percentiles",
            statements: vec![
                format!(
                    "ALTER TABLE {runs} ADD COLUMN IF NOT EXISTS p50_latency_ms DOUBLE PRECISION"
                ),
                format!(
                    "ALTER TABLE {runs} ADD COLUMN IF NOT EXISTS p99_latency_ms DOUBLE PRECISION"
                ),
                format!(
                    "ALTER TABLE {runs} ADD COLUMN IF NOT EXISTS max_latency_ms DOUBLE PRECISION"
                ),
                format!(
                    "UPDATE {runs} SET p99_latency_ms = p95_latency_ms \
                     WHERE p99_latency_ms IS NULL"
                ),
                format!(
                    "UPDATE {runs} SET max_latency_ms = p95_latency_ms \
                     WHERE max_latency_ms IS NULL"
                ),
                format!(
                    "UPDATE {runs} SET p50_latency_ms = avg_latency_ms \
                     WHERE p50_latency_ms IS NULL"
                ),
            ],
        },
    ]
}

/// Apply all pending migrations, then attempt the optional hypertable.
pub async fn apply_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    for migration in migrations(config) {
        let applied: Option<i64> =
            sqlx::query("SELECT version FROM schema_migrations WHERE version = $1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx_error)?
                .map(|row| row.get("version"));

        if applied.is_some() {
            debug!(version = migration.version, "migration already applied");
            continue;
        }

        info!(version = migration.version, name = migration.name, "applying migration");
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        for statement in &migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
    }

    ensure_hypertable(pool, config).await;
    Ok(())
}

/// Best-effort TimescaleDB hypertable upgrade for the metrics table.
async fn ensure_hypertable(pool: &PgPool, config: &PostgresConfig) {
    let sql = format!(
        "SELECT create_hypertable('{}', 'time', if_not_exists => TRUE, migrate_data => TRUE)",
        config.metrics_table
    );
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => info!(table = %config.metrics_table, "hypertable ready"),
        Err(e) => warn!(
            table = %config.metrics_table,
            error = %e,
            "hypertable creation skipped; continuing with a plain table"
        ),
    }
}
