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

// ABOUTME: Configuration management for the Benchwatch API server
// HTTP settings come from BENCHWATCH_* environment variables; the storage
// layer is configured from a YAML file with env-var substitution.

use anyhow::{anyhow, Result};
use benchwatch_types::StorageConfig;
use serde::{Deserialize, Serialize};
use std::env;
use validator::Validate;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiServerConfig {
    /// Server port
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Server host address
    pub host: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub request_timeout: u64,

    /// WebSocket limits and heartbeat settings
    #[validate(nested)]
    pub websocket: WebSocketConfig,

    /// Feature flags
    pub features: std::collections::HashMap<String, bool>,
}

/// WebSocket surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebSocketConfig {
    /// Maximum concurrent subscribers
    #[validate(range(min = 1, max = 10000))]
    pub max_subscribers: usize,

    /// Maximum serialized event size in bytes
    #[validate(range(min = 1024, max = 16777216))]
    pub max_message_bytes: usize,

    /// Server ping cadence in seconds
    #[validate(range(min = 1, max = 300))]
    pub ping_interval_secs: u64,

    /// Missed-pong deadline in seconds
    #[validate(range(min = 1, max = 600))]
    pub pong_deadline_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 256,
            max_message_bytes: 512 * 1024,
            ping_interval_secs: 54,
            pong_deadline_secs: 60,
        }
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        let mut features = std::collections::HashMap::new();
        features.insert("grafana".to_string(), true);
        features.insert("websocket".to_string(), true);

        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            request_timeout: 10,
            websocket: WebSocketConfig::default(),
            features,
        }
    }
}

impl ApiServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("BENCHWATCH_API_PORT") {
            config.port = port.parse().map_err(|_| anyhow!("Invalid BENCHWATCH_API_PORT"))?;
        }
        if let Ok(host) = env::var("BENCHWATCH_API_HOST") {
            config.host = host;
        }
        if let Ok(timeout) = env::var("BENCHWATCH_API_REQUEST_TIMEOUT") {
            config.request_timeout = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid BENCHWATCH_API_REQUEST_TIMEOUT"))?;
        }
        if let Ok(max_subs) = env::var("BENCHWATCH_WS_MAX_SUBSCRIBERS") {
            config.websocket.max_subscribers = max_subs
                .parse()
                .map_err(|_| anyhow!("Invalid BENCHWATCH_WS_MAX_SUBSCRIBERS"))?;
        }
        if let Ok(ping) = env::var("BENCHWATCH_WS_PING_INTERVAL") {
            config.websocket.ping_interval_secs = ping
                .parse()
                .map_err(|_| anyhow!("Invalid BENCHWATCH_WS_PING_INTERVAL"))?;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
        Ok(config)
    }

    /// Load the storage configuration: from the YAML file named by
    /// `BENCHWATCH_STORAGE_CONFIG`, or defaults.
    pub fn load_storage_config() -> Result<StorageConfig> {
        match env::var("BENCHWATCH_STORAGE_CONFIG") {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow!("cannot read storage config {path}: {e}"))?;
                Ok(StorageConfig::from_yaml(&contents)?)
            }
            Err(_) => Ok(StorageConfig::default()),
        }
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
