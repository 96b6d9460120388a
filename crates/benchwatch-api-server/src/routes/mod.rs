// ABOUTME: Route handlers for the dashboard API, Grafana adaptor and WebSocket

pub mod baselines;
pub mod compare;
pub mod dashboard;
pub mod grafana;
pub mod health;
pub mod metrics;
pub mod runs;
pub mod trends;
pub mod ws;
