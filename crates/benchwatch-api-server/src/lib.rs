// ABOUTME: Benchwatch API server library: dashboard routes, Grafana adaptor, WebSocket events
// Serves the performance observatory over HTTP with permissive CORS.

pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ApiServerConfig;
pub use server::ApiServer;
pub use state::AppState;
