//! Snapshot publisher: consistent read views for the API and dashboard.

use crate::metrics::MetricsRegistry;
use crate::registry::CheckRegistry;
use crate::source::MetricsSource;
use crate::types::{CheckView, Snapshot, StatusSummary, SystemMetrics};
use common::Result;
use healthcheck::CheckId;
use std::sync::Arc;
use std::time::SystemTime;

pub struct SnapshotPublisher {
    registry: Arc<CheckRegistry>,
    source: Arc<dyn MetricsSource>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SnapshotPublisher {
    pub fn new(
        registry: Arc<CheckRegistry>,
        source: Arc<dyn MetricsSource>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            source,
            metrics,
        }
    }

    /// Every check with its state, plus the latest system metrics.
    ///
    /// Definitions and states are read under the registry's read lock, so a
    /// concurrent delete is either fully visible or not visible at all.
    pub async fn snapshot(&self) -> Snapshot {
        let checks = self.views().await;
        let summary = StatusSummary::from_views(&checks);
        if let Some(ref m) = self.metrics {
            m.update_checks_by_status(&summary);
        }

        Snapshot {
            generated_at: SystemTime::now(),
            checks,
            summary,
            system: self.source.latest().await,
        }
    }

    /// Check views without system metrics
    pub async fn views(&self) -> Vec<CheckView> {
        self.registry
            .checks_with_state()
            .await
            .into_iter()
            .map(|(definition, state)| CheckView::new(definition, state))
            .collect()
    }

    pub async fn summary(&self) -> StatusSummary {
        StatusSummary::from_views(&self.views().await)
    }

    /// Single check view, e.g. to pre-fill an edit form
    pub async fn check(&self, id: CheckId) -> Result<CheckView> {
        let (definition, state) = self.registry.check_with_state(id).await?;
        Ok(CheckView::new(definition, state))
    }

    pub async fn system_metrics(&self) -> Option<SystemMetrics> {
        self.source.latest().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::source::{NoMetrics, StaticMetricsSource};
    use crate::store::MemoryStore;
    use crate::types::SchedulerConfig;
    use healthcheck::{CheckKind, CheckSpec, CheckStatus, ProbeSet, StatusTracker};
    use std::time::Duration;

    fn publisher(source: Arc<dyn MetricsSource>) -> (SnapshotPublisher, Arc<CheckRegistry>) {
        let tracker = Arc::new(StatusTracker::default());
        let scheduler = Arc::new(Scheduler::new(
            ProbeSet::with_defaults().unwrap(),
            tracker.clone(),
            SchedulerConfig::default(),
            None,
        ));
        let registry = Arc::new(CheckRegistry::new(
            Arc::new(MemoryStore::new()),
            tracker,
            scheduler,
            None,
        ));
        (SnapshotPublisher::new(registry.clone(), source, None), registry)
    }

    fn spec(name: &str) -> CheckSpec {
        CheckSpec::new(
            name,
            CheckKind::Tcp,
            "10.0.0.1:443",
            Duration::from_secs(60),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_new_check_visible_as_unknown() {
        let (publisher, registry) = publisher(Arc::new(NoMetrics));
        let id = registry.create(spec("lb")).await.unwrap();

        let snapshot = publisher.snapshot().await;
        assert_eq!(snapshot.checks.len(), 1);
        assert_eq!(snapshot.checks[0].definition.id, id);
        assert_eq!(snapshot.checks[0].status(), CheckStatus::Unknown);
        assert_eq!(snapshot.summary.unknown, 1);
        assert!(snapshot.system.is_none());
    }

    #[tokio::test]
    async fn test_repeated_snapshots_are_equal() {
        let source = Arc::new(StaticMetricsSource::new());
        source.update(SystemMetrics::default()).await;
        let (publisher, registry) = publisher(source);
        for name in ["a", "b", "c"] {
            registry.create(spec(name)).await.unwrap();
        }

        let first = publisher.snapshot().await;
        let second = publisher.snapshot().await;
        assert_eq!(first, second);

        registry.delete(first.checks[1].definition.id).await.unwrap();
        let third = publisher.snapshot().await;
        assert_ne!(first, third);
        assert_eq!(third.summary.total, 2);
    }

    #[tokio::test]
    async fn test_single_check_view() {
        let (publisher, registry) = publisher(Arc::new(NoMetrics));
        let id = registry.create(spec("edit-me")).await.unwrap();

        let view = publisher.check(id).await.unwrap();
        assert_eq!(view.definition.name(), "edit-me");
        assert_eq!(
            publisher.check(CheckId(999)).await.unwrap_err().kind(),
            "not_found"
        );
    }
}
