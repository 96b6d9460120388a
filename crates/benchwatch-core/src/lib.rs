// ABOUTME: Benchwatch core engines: historic store, baselines, trends, regressions, notifications
//! This crate implements the analytics and history service behind the
//! Benchwatch API: the PostgreSQL-backed historic store with its schema
//! migrations and on-disk artifacts, the baseline manager, the trend
//! analyzer, the regression detector, the notification hub, and the
//! retention sweeper.

pub mod baseline;
pub mod notify;
pub mod registry;
pub mod regression;
pub mod retention;
pub mod store;
pub mod trend;

pub use baseline::BaselineManager;
pub use notify::{HubConfig, HubStats, NotificationHub};
pub use registry::ClientRegistry;
pub use regression::RegressionDetector;
pub use retention::RetentionSweeper;
pub use store::HistoricStore;
pub use trend::{TrendAnalyzer, TrendConfig};
