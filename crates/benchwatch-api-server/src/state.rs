// ABOUTME: Shared application state handed to every route handler

use crate::config::ApiServerConfig;
use benchwatch_core::{
    BaselineManager, ClientRegistry, HistoricStore, HubConfig, NotificationHub,
    RegressionDetector, TrendAnalyzer, TrendConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Every engine the handlers reach, behind shared ownership. Aggregates link
/// to each other by id only; the state is the single place holding them all.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HistoricStore>,
    pub baselines: Arc<BaselineManager>,
    pub trends: Arc<TrendAnalyzer>,
    pub detector: Arc<RegressionDetector>,
    pub registry: Arc<ClientRegistry>,
    pub hub: NotificationHub,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the engines over one historic store.
    pub fn new(store: HistoricStore, config: &ApiServerConfig) -> Self {
        let store = Arc::new(store);
        let baselines = Arc::new(BaselineManager::new(store.clone()));
        let trends = Arc::new(TrendAnalyzer::new(store.clone(), TrendConfig::default()));
        let detector = Arc::new(RegressionDetector::new(store.clone(), baselines.clone()));
        let hub = NotificationHub::spawn(HubConfig {
            max_subscribers: config.websocket.max_subscribers,
            max_message_bytes: config.websocket.max_message_bytes,
            ping_interval: Duration::from_secs(config.websocket.ping_interval_secs),
            pong_deadline: Duration::from_secs(config.websocket.pong_deadline_secs),
            ..Default::default()
        });

        Self {
            store,
            baselines,
            trends,
            detector,
            registry: Arc::new(ClientRegistry::new()),
            hub,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
