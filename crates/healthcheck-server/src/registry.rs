//! Check registry: the authoritative set of check definitions.

use crate::metrics::MetricsRegistry;
use crate::scheduler::Scheduler;
use crate::store::CheckStore;
use common::{Error, Result};
use healthcheck::{
    CheckDefinition, CheckId, CheckKind, CheckRuntimeState, CheckSpec, StatusTracker,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Owns check definitions and keeps the scheduler and tracker in step.
///
/// Every mutation happens under the write lock: the store is written first,
/// then the in-memory map, runtime state and timers. Readers holding the
/// read lock therefore always see definitions and runtime state that agree.
pub struct CheckRegistry {
    checks: RwLock<BTreeMap<CheckId, Arc<CheckDefinition>>>,
    next_id: AtomicU64,
    store: Arc<dyn CheckStore>,
    tracker: Arc<StatusTracker>,
    scheduler: Arc<Scheduler>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl CheckRegistry {
    pub fn new(
        store: Arc<dyn CheckStore>,
        tracker: Arc<StatusTracker>,
        scheduler: Arc<Scheduler>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            checks: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            store,
            tracker,
            scheduler,
            metrics,
        }
    }

    /// Load every stored definition and start its timer.
    ///
    /// Definitions that no longer validate are skipped. Returns the number of
    /// checks restored.
    pub async fn restore(&self) -> Result<usize> {
        let stored = self.store.load_all().await?;
        let mut checks = self.checks.write().await;

        let mut restored = 0;
        for check in stored {
            // Skipped ids stay reserved so a later create cannot overwrite them
            self.next_id.fetch_max(check.id.0 + 1, Ordering::SeqCst);
            if let Err(e) = self.validate(&check.spec) {
                warn!(id = %check.id, error = %e, "Skipping invalid stored check");
                continue;
            }

            let id = check.id;
            let check = Arc::new(check);
            self.tracker.register(id);
            checks.insert(id, check.clone());
            self.scheduler.on_check_added(check);
            restored += 1;
        }

        info!(restored, "Restored checks from store");
        Ok(restored)
    }

    /// Register a new check; returns its id
    pub async fn create(&self, spec: CheckSpec) -> Result<CheckId> {
        let result = self.create_inner(spec).await;
        self.record("create", &result);
        result
    }

    async fn create_inner(&self, spec: CheckSpec) -> Result<CheckId> {
        self.validate(&spec)?;

        let mut checks = self.checks.write().await;
        let id = CheckId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let check = CheckDefinition::new(id, spec);
        self.store.save(&check).await?;

        let check = Arc::new(check);
        self.tracker.register(id);
        checks.insert(id, check.clone());
        self.scheduler.on_check_added(check.clone());

        info!(id = %id, name = %check.name(), kind = check.kind().name(), target = %check.target(), "Check created");
        Ok(id)
    }

    pub async fn get(&self, id: CheckId) -> Result<CheckDefinition> {
        self.checks
            .read()
            .await
            .get(&id)
            .map(|check| CheckDefinition::clone(check))
            .ok_or_else(|| not_found(id))
    }

    /// All definitions in creation order
    pub async fn list(&self) -> Vec<CheckDefinition> {
        self.checks
            .read()
            .await
            .values()
            .map(|check| CheckDefinition::clone(check))
            .collect()
    }

    /// Replace a check's definition, keeping its id and runtime state
    pub async fn update(&self, id: CheckId, spec: CheckSpec) -> Result<CheckDefinition> {
        let result = self.update_inner(id, spec).await;
        self.record("update", &result);
        result
    }

    async fn update_inner(&self, id: CheckId, spec: CheckSpec) -> Result<CheckDefinition> {
        self.validate(&spec)?;

        let mut checks = self.checks.write().await;
        let existing = checks.get(&id).ok_or_else(|| not_found(id))?;

        let was_kind = existing.kind().name();
        let check = CheckDefinition {
            id,
            spec,
            created_at: existing.created_at,
            updated_at: SystemTime::now(),
        };
        self.store.save(&check).await?;

        let check = Arc::new(check);
        checks.insert(id, check.clone());
        self.scheduler.on_check_updated(check.clone());

        // After the scheduler relabels, so late results cannot revive old series
        if was_kind != check.kind().name() {
            if let Some(ref m) = self.metrics {
                m.remove_check(id, was_kind);
            }
        }

        info!(id = %id, name = %check.name(), enabled = check.enabled(), "Check updated");
        Ok(CheckDefinition::clone(&check))
    }

    /// Remove a check, its runtime state and its timer
    pub async fn delete(&self, id: CheckId) -> Result<()> {
        let result = self.delete_inner(id).await;
        self.record("delete", &result);
        result
    }

    async fn delete_inner(&self, id: CheckId) -> Result<()> {
        let mut checks = self.checks.write().await;
        let Some(kind) = checks.get(&id).map(|check| check.kind().name()) else {
            return Err(not_found(id));
        };

        self.store.remove(id).await?;
        checks.remove(&id);
        self.tracker.remove(id);
        self.scheduler.on_check_removed(id);

        if let Some(ref m) = self.metrics {
            m.remove_check(id, kind);
        }

        info!(id = %id, "Check deleted");
        Ok(())
    }

    /// Enable or disable a check without changing anything else
    pub async fn set_enabled(&self, id: CheckId, enabled: bool) -> Result<CheckDefinition> {
        let mut spec = self.get(id).await?.spec;
        if spec.enabled == enabled {
            return self.get(id).await;
        }
        spec.enabled = enabled;
        self.update(id, spec).await
    }

    pub async fn len(&self) -> usize {
        self.checks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checks.read().await.is_empty()
    }

    /// Every definition joined with its runtime state, read atomically
    pub async fn checks_with_state(&self) -> Vec<(CheckDefinition, CheckRuntimeState)> {
        let checks = self.checks.read().await;
        checks
            .values()
            .map(|check| {
                let state = self.tracker.get(check.id).unwrap_or_default();
                (CheckDefinition::clone(check), state)
            })
            .collect()
    }

    /// One definition joined with its runtime state
    pub async fn check_with_state(
        &self,
        id: CheckId,
    ) -> Result<(CheckDefinition, CheckRuntimeState)> {
        let checks = self.checks.read().await;
        let check = checks.get(&id).ok_or_else(|| not_found(id))?;
        let state = self.tracker.get(id).unwrap_or_default();
        Ok((CheckDefinition::clone(check), state))
    }

    fn validate(&self, spec: &CheckSpec) -> Result<()> {
        spec.validate()?;
        if let CheckKind::Plugin { plugin } = &spec.kind {
            if !self.scheduler.supports(&spec.kind) {
                return Err(Error::invalid(format!("plugin '{}' is not registered", plugin)));
            }
        }
        Ok(())
    }

    fn record<T>(&self, op: &str, result: &Result<T>) {
        if let Some(ref m) = self.metrics {
            let outcome = match result {
                Ok(_) => "ok",
                Err(e) => e.kind(),
            };
            m.record_registry_op(op, outcome);
        }
    }
}

fn not_found(id: CheckId) -> Error {
    Error::not_found(format!("check {}", id))
}
