// ABOUTME: Best-effort per-run file artifacts under the historic root
// Absence or write failure of any artifact never invalidates DB state.

use benchwatch_types::{BenchmarkResult, HistoricRun, RunConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Sidecar metadata written next to the result blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub id: String,
    pub test_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

/// Resolved client list written as `run_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfigArtifact {
    pub clients: Vec<benchwatch_types::ClientEndpoint>,
}

/// Directory holding one run's artifacts.
pub fn run_dir(historic_root: &Path, run_id: &str) -> PathBuf {
    historic_root.join(run_id)
}

/// Write `result.json`, `metadata.json` and `run_config.json` for a run.
///
/// Failures are logged at WARN and swallowed; the caller has already
/// committed the database state.
pub async fn write_run_artifacts(
    historic_root: &Path,
    run: &HistoricRun,
    result: &BenchmarkResult,
    config: &RunConfig,
) {
    let dir = run_dir(historic_root, &run.id);
    if let Err(e) = fs::create_dir_all(&dir).await {
        warn!(run_id = %run.id, error = %e, "skipping artifacts: cannot create run directory");
        return;
    }

    write_json(&dir.join("result.json"), result).await;
    write_json(
        &dir.join("metadata.json"),
        &RunMetadata {
            id: run.id.clone(),
            test_name: run.test_name.clone(),
            start_time: result.start_time,
            end_time: result.end_time,
            saved_at: Utc::now(),
        },
    )
    .await;
    write_json(
        &dir.join("run_config.json"),
        &RunConfigArtifact {
            clients: config.clients.clone(),
        },
    )
    .await;

    debug!(run_id = %run.id, dir = %dir.display(), "run artifacts written");
}

async fn write_json<T: Serialize>(path: &Path, value: &T) {
    let bytes = match serde_json::to_vec_pretty(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact serialization failed");
            return;
        }
    };
    if let Err(e) = fs::write(path, bytes).await {
        warn!(path = %path.display(), error = %e, "artifact write failed");
    }
}

/// Read a run's `result.json` if present.
pub async fn read_result_artifact(
    historic_root: &Path,
    run_id: &str,
) -> Option<BenchmarkResult> {
    let path = run_dir(historic_root, run_id).join("result.json");
    let bytes = fs::read(&path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable result artifact");
            None
        }
    }
}

/// Remove a run's artifact directory, tolerating absence.
pub async fn remove_run_artifacts(historic_root: &Path, run_id: &str) {
    let dir = run_dir(historic_root, run_id);
    match fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(run_id, "run artifacts removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(run_id, error = %e, "failed to remove run artifacts"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::expand::build_summary;
    use benchwatch_types::{ClientEndpoint, ClientMetrics, LatencyMetrics};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn sample() -> (HistoricRun, BenchmarkResult, RunConfig) {
        let result = BenchmarkResult {
            test_name: "suite".to_string(),
            description: String::new(),
            start_time: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 7, 1, 0, 5, 0).unwrap(),
            duration_seconds: 300.0,
            client_metrics: HashMap::from([(
                "geth".to_string(),
                ClientMetrics {
                    total_requests: 10,
                    total_errors: 0,
                    error_rate: 0.0,
                    latency: LatencyMetrics::default(),
                    methods: HashMap::new(),
                },
            )]),
        };
        let config = RunConfig {
            clients: vec![ClientEndpoint {
                name: "geth".to_string(),
                url: "http://localhost:8545".to_string(),
            }],
            ..Default::default()
        };
        let run = build_summary("20250701-000000-abc1234".to_string(), &result, &config);
        (run, result, config)
    }

    #[tokio::test]
    async fn test_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (run, result, config) = sample();

        write_run_artifacts(dir.path(), &run, &result, &config).await;

        let read_back = read_result_artifact(dir.path(), &run.id).await.unwrap();
        assert_eq!(read_back, result);

        let config_path = run_dir(dir.path(), &run.id).join("run_config.json");
        let artifact: RunConfigArtifact =
            serde_json::from_slice(&std::fs::read(config_path).unwrap()).unwrap();
        assert_eq!(artifact.clients[0].name, "geth");
        assert_eq!(artifact.clients[0].url, "http://localhost:8545");
    }

    #[tokio::test]
    async fn test_missing_artifacts_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_result_artifact(dir.path(), "nonexistent").await.is_none());
        // Removing something that never existed is not an error.
        remove_run_artifacts(dir.path(), "nonexistent").await;
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        // Point the root at a file so create_dir_all fails.
        let file = tempfile::NamedTempFile::new().unwrap();
        let (run, result, config) = sample();
        write_run_artifacts(file.path(), &run, &result, &config).await;
    }
}
