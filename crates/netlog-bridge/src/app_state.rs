//! Shared application state for the relay.

use std::sync::Arc;
use std::time::Duration;

use crate::config::NetlogConfig;
use crate::obs::RelayMetrics;
use crate::relay::ViewerRegistry;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<NetlogConfig>,
    viewers: Arc<ViewerRegistry>,
    metrics: Arc<RelayMetrics>,
}

impl AppState {
    pub fn new(cfg: NetlogConfig) -> Self {
        let send_timeout = Duration::from_millis(cfg.bridge.viewer_send_timeout_ms);
        Self {
            cfg: Arc::new(cfg),
            viewers: Arc::new(ViewerRegistry::with_send_timeout(send_timeout)),
            metrics: Arc::new(RelayMetrics::default()),
        }
    }

    pub fn cfg(&self) -> &NetlogConfig {
        &self.cfg
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }
}
