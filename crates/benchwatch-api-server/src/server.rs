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

// ABOUTME: HTTP server assembly: router, middleware stack and graceful shutdown

use crate::config::ApiServerConfig;
use crate::middleware::{cors, logging};
use crate::models::errors::ApiError;
use crate::routes::{baselines, compare, dashboard, grafana, health, metrics, runs, trends, ws};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
};
use tracing::{error, info, instrument};
use utoipa::OpenApi;

/// OpenAPI documentation definition
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        runs::ingest_run,
        runs::list_runs,
        runs::get_run,
        runs::get_run_report,
        runs::get_run_methods,
        runs::get_run_regressions,
        runs::acknowledge_regression,
        trends::get_trends,
        trends::get_method_trend,
        trends::get_client_trend,
        baselines::list_baselines,
        baselines::create_baseline,
        baselines::delete_baseline,
        baselines::baseline_history,
        compare::compare_runs,
        metrics::query_metrics,
        dashboard::dashboard_stats,
        dashboard::list_clients,
        grafana::grafana_search,
        grafana::grafana_query,
        grafana::grafana_annotations,
        grafana::grafana_metrics,
    ),
    tags(
        (name = "Health", description = "Liveness and component status"),
        (name = "Runs", description = "Benchmark run history and regression reports"),
        (name = "Trends", description = "Statistical trend analysis over metric series"),
        (name = "Baselines", description = "Named reference runs and comparisons"),
        (name = "Compare", description = "Pairwise run comparison"),
        (name = "Metrics", description = "Raw time-series selection"),
        (name = "Dashboard", description = "Aggregate counters"),
        (name = "Grafana", description = "Simple-JSON datasource adaptor")
    ),
    info(
        title = "Benchwatch API Server",
        version = "0.1.0",
        description = "Performance observatory over JSON-RPC benchmark history"
    )
)]
struct ApiDoc;

/// The API server: configuration plus the assembled router.
pub struct ApiServer {
    pub config: ApiServerConfig,
    pub app: Router,
    pub state: AppState,
}

impl ApiServer {
    /// Assemble the router and middleware over an initialized state.
    #[instrument(skip(config, state))]
    pub fn new(config: ApiServerConfig, state: AppState) -> Result<Self> {
        info!(
            "Initializing API server on {}:{}",
            config.host, config.port
        );
        let app = Self::build_router(&config, state.clone());
        Ok(Self { config, app, state })
    }

    fn build_router(config: &ApiServerConfig, state: AppState) -> Router {
        let api_routes = Router::new()
            .route("/api/health", get(health::health_check))
            .route("/api/runs", post(runs::ingest_run))
            .route("/api/runs", get(runs::list_runs))
            .route("/api/runs/{id}", get(runs::get_run))
            .route("/api/runs/{id}/report", get(runs::get_run_report))
            .route("/api/runs/{id}/methods", get(runs::get_run_methods))
            .route("/api/runs/{id}/regressions", get(runs::get_run_regressions))
            .route(
                "/api/regressions/{id}/acknowledge",
                post(runs::acknowledge_regression),
            )
            .route("/api/trends", get(trends::get_trends))
            .route("/api/trends/method/{method}", get(trends::get_method_trend))
            .route("/api/trends/client/{client}", get(trends::get_client_trend))
            .route("/api/baselines", get(baselines::list_baselines))
            .route("/api/baselines", post(baselines::create_baseline))
            .route("/api/baselines/{id}", delete(baselines::delete_baseline))
            .route(
                "/api/baselines/{id}/history",
                get(baselines::baseline_history),
            )
            .route("/api/compare", get(compare::compare_runs))
            .route("/api/metrics/query", post(metrics::query_metrics))
            .route("/api/dashboard/stats", get(dashboard::dashboard_stats))
            .route("/api/clients", get(dashboard::list_clients));

        let mut app = api_routes;

        if *config.features.get("websocket").unwrap_or(&true) {
            app = app.route("/api/ws", get(ws::websocket_handler));
        }

        if *config.features.get("grafana").unwrap_or(&true) {
            let grafana_routes = Router::new()
                .route("/grafana/", get(grafana::grafana_health))
                .route("/grafana/search", post(grafana::grafana_search))
                .route("/grafana/query", post(grafana::grafana_query))
                .route("/grafana/annotations", post(grafana::grafana_annotations))
                .route("/grafana/metrics", get(grafana::grafana_metrics));
            app = app.merge(grafana_routes);
        }

        let app = app
            .route("/api-docs/openapi.json", get(Self::serve_openapi_json))
            .route("/docs", get(Self::serve_docs))
            .fallback(Self::handle_404)
            .with_state(state);

        // Middleware is applied in reverse order (last = innermost).
        app.layer(CompressionLayer::new())
            .layer(cors::create_cors_layer())
            .layer(logging::create_trace_layer::<axum::body::Body>())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(CatchPanicLayer::custom(Self::handle_panic))
    }

    /// Handle 404 errors for unknown routes
    async fn handle_404() -> impl IntoResponse {
        ApiError::NotFound("the requested endpoint was not found".to_string()).into_response()
    }

    /// Serve the OpenAPI specification in JSON format
    async fn serve_openapi_json() -> impl IntoResponse {
        use axum::http::header;
        let openapi_json = serde_json::to_string_pretty(&ApiDoc::openapi()).unwrap_or_else(|_| {
            r#"{"openapi":"3.0.3","info":{"title":"Benchwatch API","version":"0.1.0"}}"#.to_string()
        });
        ([(header::CONTENT_TYPE, "application/json")], openapi_json)
    }

    /// Minimal docs page loading Swagger UI against the served spec
    async fn serve_docs() -> impl IntoResponse {
        use axum::http::header;
        let html = r#"<!DOCTYPE html>
<html>
<head>
    <title>Benchwatch API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@4.15.5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@4.15.5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({ url: '/api-docs/openapi.json', dom_id: '#swagger-ui' });
        };
    </script>
</body>
</html>"#;
        ([(header::CONTENT_TYPE, "text/html")], html)
    }

    /// Handle panic recovery
    fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
        error!("Service panic occurred");
        ApiError::Internal("internal server error occurred".to_string()).into_response()
    }

    /// Run the server with graceful shutdown
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Server listening on {}", bind_addr);

        let shutdown_signal = async {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install CTRL+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
                _ = terminate => info!("Received SIGTERM signal"),
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        info!("Server shutdown complete");
        Ok(())
    }
}
