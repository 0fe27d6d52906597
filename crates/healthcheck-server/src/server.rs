//! Server assembly: wires the engine components and the HTTP API.

use crate::http_server::{ApiServer, ApiState};
use crate::metrics::MetricsRegistry;
use crate::registry::CheckRegistry;
use crate::scheduler::Scheduler;
use crate::snapshot::SnapshotPublisher;
use crate::source::{MetricsSource, NoMetrics};
use crate::store::{CheckStore, FileStore, MemoryStore};
use crate::types::{ServerConfig, StoreConfig};
use healthcheck::{ProbeSet, StatusTracker};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// The running engine: registry, scheduler, tracker and publisher
pub struct Engine {
    pub registry: Arc<CheckRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub tracker: Arc<StatusTracker>,
    pub publisher: Arc<SnapshotPublisher>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl Engine {
    /// Build the engine and restore checks from the configured store
    pub async fn start(
        config: &ServerConfig,
        probes: ProbeSet,
        source: Arc<dyn MetricsSource>,
    ) -> common::Result<Self> {
        let store: Arc<dyn CheckStore> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File(path) => Arc::new(FileStore::open(path.clone()).await?),
        };
        Self::start_with_store(config, probes, source, store).await
    }

    /// Build the engine on top of an explicit store
    pub async fn start_with_store(
        config: &ServerConfig,
        probes: ProbeSet,
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn CheckStore>,
    ) -> common::Result<Self> {
        let metrics = if config.metrics_enabled {
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let tracker = Arc::new(StatusTracker::new(config.failure_threshold));
        let scheduler = Arc::new(Scheduler::new(
            probes,
            tracker.clone(),
            config.scheduler.clone(),
            metrics.clone(),
        ));
        let registry = Arc::new(CheckRegistry::new(
            store,
            tracker.clone(),
            scheduler.clone(),
            metrics.clone(),
        ));
        registry.restore().await?;

        let publisher = Arc::new(SnapshotPublisher::new(
            registry.clone(),
            source,
            metrics.clone(),
        ));

        Ok(Self {
            registry,
            scheduler,
            tracker,
            publisher,
            metrics,
        })
    }

    /// State for the HTTP API
    pub fn api_state(&self) -> ApiState {
        ApiState {
            registry: self.registry.clone(),
            publisher: self.publisher.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Stop all timers and wait for in-flight probes
    pub async fn shutdown(&self) -> bool {
        self.scheduler.shutdown(self.scheduler.shutdown_grace()).await
    }
}

/// Monitoring server
pub struct HealthcheckServer {
    config: ServerConfig,
    probes: Option<ProbeSet>,
    source: Arc<dyn MetricsSource>,
}

impl HealthcheckServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            probes: None,
            source: Arc::new(NoMetrics),
        }
    }

    /// Use a custom probe set, e.g. with plugins registered
    pub fn with_probes(mut self, probes: ProbeSet) -> Self {
        self.probes = Some(probes);
        self
    }

    /// Attach an external system metrics collector
    pub fn with_metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = source;
        self
    }

    /// Run until `shutdown` resolves, then drain the scheduler
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> common::Result<()> {
        info!(listen_addr = %self.config.listen_addr, "Starting monitoring server");

        let probes = match self.probes {
            Some(probes) => probes,
            None => ProbeSet::with_defaults()?,
        };
        let engine = Engine::start(&self.config, probes, self.source).await?;
        info!(checks = engine.registry.len().await, "Engine started");

        let api = ApiServer::new(engine.api_state(), self.config.listen_addr.clone());
        let served = api.run(shutdown).await;

        engine.shutdown().await;
        info!("Monitoring server stopped");
        served
    }

    /// Run until Ctrl-C
    pub async fn run_until_ctrl_c(self) -> common::Result<()> {
        self.run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => {
                    warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
                    std::future::pending::<()>().await
                }
            }
        })
        .await
    }
}
