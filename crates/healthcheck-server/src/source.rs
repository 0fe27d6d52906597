//! System metrics source: the boundary to external collectors.

use crate::types::SystemMetrics;
use async_trait::async_trait;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Pull-based provider of the latest system metrics reading
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Most recent reading, `None` if nothing has been collected yet
    async fn latest(&self) -> Option<SystemMetrics>;
}

/// Source for deployments without a collector
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetrics;

#[async_trait]
impl MetricsSource for NoMetrics {
    async fn latest(&self) -> Option<SystemMetrics> {
        None
    }
}

/// Source fed by an external collector through [`StaticMetricsSource::update`]
#[derive(Debug, Default)]
pub struct StaticMetricsSource {
    current: RwLock<Option<SystemMetrics>>,
}

impl StaticMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current reading; stamps it if the collector did not
    pub async fn update(&self, mut metrics: SystemMetrics) {
        if metrics.timestamp.is_none() {
            metrics.timestamp = Some(SystemTime::now());
        }
        *self.current.write().await = Some(metrics);
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn latest(&self) -> Option<SystemMetrics> {
        self.current.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_metrics() {
        assert!(NoMetrics.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_static_source_update() {
        let source = StaticMetricsSource::new();
        assert!(source.latest().await.is_none());

        let mut metrics = SystemMetrics::default();
        metrics.cpu.total_usage = 42.0;
        source.update(metrics).await;

        let latest = source.latest().await.unwrap();
        assert_eq!(latest.cpu.total_usage, 42.0);
        assert!(latest.timestamp.is_some());

        source.clear().await;
        assert!(source.latest().await.is_none());
    }
}
