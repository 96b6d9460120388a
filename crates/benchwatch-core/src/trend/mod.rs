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

// ABOUTME: Trend analyzer over historic metric series with a TTL result cache
// Stale cache entries are recomputed, never served.

pub mod stats;

use crate::store::HistoricStore;
use benchwatch_types::{
    BenchwatchError, MetricName, Result, TrendAnalysis, TrendDirection, TrendPoint, TrendStrength,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Analyzer tuning knobs.
#[derive(Debug, Clone)]
pub struct TrendConfig {
    /// Series shorter than this fail with a validation error
    pub min_sample_size: usize,
    /// Moving-average window
    pub moving_average_window: usize,
    /// Anomaly z-score threshold in σ
    pub anomaly_sensitivity: f64,
    /// Cache entry lifetime
    pub cache_ttl: Duration,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 10,
            moving_average_window: 5,
            anomaly_sensitivity: 2.0,
            cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Slope magnitude below which a trend is "stable".
const STABLE_SLOPE_EPSILON: f64 = 0.01;

/// Direction of a fitted slope under the metric's semantics.
pub fn trend_direction(slope: f64, metric: MetricName) -> TrendDirection {
    if slope.abs() < STABLE_SLOPE_EPSILON {
        return TrendDirection::Stable;
    }
    let decreasing = slope < 0.0;
    if decreasing == metric.lower_is_better() {
        TrendDirection::Improving
    } else {
        TrendDirection::Degrading
    }
}

fn build_insights(analysis: &TrendAnalysis) -> Vec<String> {
    let mut insights = Vec::new();
    let stats = &analysis.statistics;

    insights.push(format!(
        "{} is {} over {} samples (slope {:.4}/run, R² {:.2} — heuristic fit)",
        analysis.metric,
        analysis.direction,
        analysis.points.len(),
        stats.slope,
        stats.r_squared,
    ));
    if stats.volatility > 0.3 {
        insights.push(format!(
            "High volatility ({:.0}% of mean); direction confidence is reduced",
            stats.volatility * 100.0
        ));
    }
    if !analysis.anomalies.is_empty() {
        insights.push(format!(
            "{} anomalous sample(s) deviate more than the sensitivity threshold",
            analysis.anomalies.len()
        ));
    }
    if let Some(cp) = analysis.change_points.first() {
        insights.push(format!(
            "Level shift of {:+.1}% around run index {}",
            cp.magnitude_pct, cp.index
        ));
    }
    insights
}

/// Assemble a complete analysis from a fetched series. Pure; the analyzer
/// adds I/O and caching around it.
pub fn build_analysis(
    test_name: &str,
    metric: MetricName,
    client: Option<String>,
    method: Option<String>,
    points: Vec<TrendPoint>,
    config: &TrendConfig,
    forecast_horizon: usize,
) -> Result<TrendAnalysis> {
    if points.len() < config.min_sample_size {
        return Err(BenchwatchError::validation(format!(
            "{} samples, need at least {} for trend analysis",
            points.len(),
            config.min_sample_size
        )));
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let statistics = stats::compute_statistics(&values);
    let direction = trend_direction(statistics.slope, metric);
    let confidence = (statistics.r_squared * (1.0 - statistics.volatility)).clamp(0.0, 1.0);
    let strength = TrendStrength::from_score(confidence);

    let moving_average = stats::moving_average(&points, config.moving_average_window);
    let anomalies = stats::detect_anomalies(&points, config.anomaly_sensitivity);
    let change_points = stats::detect_change_points(&points);
    let forecast = if forecast_horizon > 0 {
        stats::forecast(&values, forecast_horizon)
    } else {
        None
    };
    let autocorrelation = stats::autocorrelation(&values, stats::MAX_AUTOCORRELATION_LAG);

    let mut analysis = TrendAnalysis {
        test_name: test_name.to_string(),
        metric,
        client,
        method,
        points,
        statistics,
        direction,
        strength,
        confidence,
        moving_average,
        anomalies,
        change_points,
        forecast,
        autocorrelation,
        insights: Vec::new(),
        generated_at: Utc::now(),
    };
    analysis.insights = build_insights(&analysis);
    Ok(analysis)
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct CacheKey {
    test_name: String,
    metric: MetricName,
    client: Option<String>,
    method: Option<String>,
    window_days: u32,
    forecast_horizon: usize,
}

struct CacheEntry {
    computed_at: Instant,
    analysis: TrendAnalysis,
}

/// Trend analyzer bound to the historic store.
pub struct TrendAnalyzer {
    store: Arc<HistoricStore>,
    config: TrendConfig,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl TrendAnalyzer {
    pub fn new(store: Arc<HistoricStore>, config: TrendConfig) -> Self {
        Self {
            store,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Analyze one metric series over the trailing window, serving cached
    /// results while they are fresh.
    #[instrument(skip(self))]
    pub async fn analyze(
        &self,
        test_name: &str,
        metric: MetricName,
        client: Option<String>,
        method: Option<String>,
        window_days: u32,
        forecast_horizon: usize,
    ) -> Result<TrendAnalysis> {
        let key = CacheKey {
            test_name: test_name.to_string(),
            metric,
            client: client.clone(),
            method: method.clone(),
            window_days,
            forecast_horizon,
        };

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.computed_at.elapsed() < self.config.cache_ttl {
                    debug!(test_name, metric = %metric, "trend served from cache");
                    return Ok(entry.analysis.clone());
                }
            }
        }

        let to = Utc::now();
        let from = to - ChronoDuration::days(window_days.max(1) as i64);
        let points = self
            .store
            .metric_series(
                test_name,
                metric,
                client.as_deref(),
                method.as_deref(),
                from,
                to,
            )
            .await?;

        let analysis = build_analysis(
            test_name,
            metric,
            client,
            method,
            points,
            &self.config,
            forecast_horizon,
        )?;

        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.computed_at.elapsed() < self.config.cache_ttl);
        cache.insert(
            key,
            CacheEntry {
                computed_at: Instant::now(),
                analysis: analysis.clone(),
            },
        );
        Ok(analysis)
    }

    /// Drop every cached analysis (after ingesting a new run).
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
