// ABOUTME: Response model definitions for dashboard and Grafana endpoints

use benchwatch_types::MethodMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// `GET /api/health` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status string
    pub status: String,

    /// Server version
    pub version: String,

    /// Seconds since server start
    pub uptime_seconds: u64,

    /// Per-component health
    pub components: HashMap<String, ComponentHealth>,
}

/// One component's health entry.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// `GET /api/runs/{id}/methods` payload: per-client method breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct MethodBreakdownResponse {
    pub run_id: String,
    /// client → method → metrics
    pub clients: HashMap<String, HashMap<String, MethodMetrics>>,
}

/// One Grafana time series: [value, unix milliseconds] pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrafanaTimeSeries {
    pub target: String,
    pub datapoints: Vec<[f64; 2]>,
}

/// One Grafana table column descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct GrafanaColumn {
    pub text: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// One Grafana table response.
#[derive(Debug, Clone, Serialize)]
pub struct GrafanaTable {
    pub columns: Vec<GrafanaColumn>,
    pub rows: Vec<Vec<serde_json::Value>>,
    #[serde(rename = "type")]
    pub response_type: String,
}

/// Either shape the query endpoint may return per target.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GrafanaQueryResponse {
    TimeSeries(GrafanaTimeSeries),
    Table(GrafanaTable),
}

/// One Grafana annotation marker.
#[derive(Debug, Clone, Serialize)]
pub struct GrafanaAnnotation {
    pub annotation: crate::models::requests::GrafanaAnnotationQuery,
    /// Unix milliseconds
    pub time: i64,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
}

/// Metadata entry for `GET /grafana/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct GrafanaMetricMetadata {
    pub name: String,
    pub unit: String,
    pub help: String,
    pub labels: Vec<String>,
}
