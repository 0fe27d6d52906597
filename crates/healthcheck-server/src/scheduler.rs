//! Scheduler: one periodic timer per enabled check.

use crate::metrics::MetricsRegistry;
use crate::types::SchedulerConfig;
use dashmap::DashMap;
use healthcheck::{
    ApplyOutcome, CheckDefinition, CheckId, CheckKind, Probe, ProbeOutcome, ProbeResult, ProbeSet,
    StatusTracker,
};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Scheduling state for a single check
struct TimerEntry {
    /// Dispatch sequence counter; survives update, disable and enable
    seq: Arc<AtomicU64>,

    /// Running timer, `None` while the check is disabled
    cancel: Option<CancellationToken>,
}

/// Shared context handed to timer and dispatch tasks
#[derive(Clone)]
struct DispatchContext {
    probes: Arc<ProbeSet>,
    tracker: Arc<StatusTracker>,
    permits: Option<Arc<Semaphore>>,
    in_flight: TaskTracker,
    metrics: Option<Arc<MetricsRegistry>>,

    /// Metric `kind` label of every live check. Results are recorded under
    /// the current label while its entry is held, so series for a deleted
    /// or retyped check are never recreated.
    kinds: Arc<DashMap<CheckId, &'static str>>,
}

/// Runs every enabled check on its own interval.
///
/// Timers never share a worker: each one is its own task and each firing
/// spawns its own probe task, so a slow target only delays itself.
pub struct Scheduler {
    timers: DashMap<CheckId, TimerEntry>,
    ctx: DispatchContext,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        probes: ProbeSet,
        tracker: Arc<StatusTracker>,
        config: SchedulerConfig,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        let permits = match config.max_concurrent_probes {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Self {
            timers: DashMap::new(),
            ctx: DispatchContext {
                probes: Arc::new(probes),
                tracker,
                permits,
                in_flight: TaskTracker::new(),
                metrics,
                kinds: Arc::new(DashMap::new()),
            },
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Whether a probe is available for this check type
    pub fn supports(&self, kind: &CheckKind) -> bool {
        self.ctx.probes.supports(kind)
    }

    /// A check was registered: start its timer if enabled
    pub fn on_check_added(&self, check: Arc<CheckDefinition>) {
        self.ctx.kinds.insert(check.id, check.kind().name());
        let seq = Arc::new(AtomicU64::new(0));
        let cancel = check
            .enabled()
            .then(|| self.start_timer(check.clone(), seq.clone()));

        if let Some(old) = self.timers.insert(check.id, TimerEntry { seq, cancel }) {
            // Re-registration of a live id; never leave the old timer running
            if let Some(token) = old.cancel {
                token.cancel();
            }
        }

        info!(id = %check.id, name = %check.name(), kind = check.kind().name(), enabled = check.enabled(), "Check scheduled");
        self.update_active_gauge();
    }

    /// A check changed: replace its timer with one for the new parameters.
    ///
    /// Probes already in flight finish and report under the same id.
    pub fn on_check_updated(&self, check: Arc<CheckDefinition>) {
        self.ctx.kinds.insert(check.id, check.kind().name());
        let mut entry = self.timers.entry(check.id).or_insert_with(|| TimerEntry {
            seq: Arc::new(AtomicU64::new(0)),
            cancel: None,
        });

        if let Some(token) = entry.cancel.take() {
            token.cancel();
        }
        if check.enabled() {
            entry.cancel = Some(self.start_timer(check.clone(), entry.seq.clone()));
        }
        drop(entry);

        info!(id = %check.id, interval = ?check.interval(), timeout = ?check.timeout(), enabled = check.enabled(), "Check rescheduled");
        self.update_active_gauge();
    }

    /// A check was deleted: stop its timer.
    ///
    /// In-flight probes run to completion; the tracker drops their results.
    pub fn on_check_removed(&self, id: CheckId) {
        self.ctx.kinds.remove(&id);
        if let Some((_, entry)) = self.timers.remove(&id) {
            if let Some(token) = entry.cancel {
                token.cancel();
            }
            info!(id = %id, "Check unscheduled");
        }
        self.update_active_gauge();
    }

    /// Pause a check's timer without touching its runtime state
    pub fn on_check_disabled(&self, id: CheckId) {
        if let Some(mut entry) = self.timers.get_mut(&id) {
            if let Some(token) = entry.cancel.take() {
                token.cancel();
                info!(id = %id, "Check paused");
            }
        }
        self.update_active_gauge();
    }

    /// Resume a paused check
    pub fn on_check_enabled(&self, check: Arc<CheckDefinition>) {
        let Some(mut entry) = self.timers.get_mut(&check.id) else {
            return self.on_check_added(check);
        };

        if entry.cancel.is_none() {
            entry.cancel = Some(self.start_timer(check.clone(), entry.seq.clone()));
            info!(id = %check.id, "Check resumed");
        }
        drop(entry);
        self.update_active_gauge();
    }

    /// Whether the check currently has a running timer
    pub fn is_active(&self, id: CheckId) -> bool {
        self.timers
            .get(&id)
            .map(|entry| entry.cancel.is_some())
            .unwrap_or(false)
    }

    /// Number of running timers
    pub fn active_count(&self) -> usize {
        self.timers.iter().filter(|entry| entry.cancel.is_some()).count()
    }

    /// Number of dispatched probes for a check so far
    pub fn dispatched(&self, id: CheckId) -> u64 {
        self.timers
            .get(&id)
            .map(|entry| entry.seq.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Probes currently running or queued
    pub fn in_flight(&self) -> usize {
        self.ctx.in_flight.len()
    }

    /// Stop all timers and give in-flight probes `grace` to finish.
    ///
    /// Returns `true` if every probe finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!(timers = self.timers.len(), in_flight = self.in_flight(), "Scheduler stopping");

        self.shutdown.cancel();
        for mut entry in self.timers.iter_mut() {
            entry.cancel = None;
        }
        self.update_active_gauge();

        self.ctx.in_flight.close();
        let drained = timeout(grace, self.ctx.in_flight.wait()).await.is_ok();
        if drained {
            info!("Scheduler stopped");
        } else {
            warn!(remaining = self.in_flight(), "Grace period elapsed with probes still running");
        }
        drained
    }

    /// Shutdown grace period from configuration
    pub fn shutdown_grace(&self) -> Duration {
        self.config.shutdown_grace
    }

    fn start_timer(&self, check: Arc<CheckDefinition>, seq: Arc<AtomicU64>) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        let first_fire = check.interval() + self.jitter(check.interval());

        debug!(id = %check.id, first_fire = ?first_fire, "Starting timer");
        tokio::spawn(run_timer(check, seq, self.ctx.clone(), cancel.clone(), first_fire));

        cancel
    }

    /// Random offset in `[0, interval)` to spread checks created together
    fn jitter(&self, interval: Duration) -> Duration {
        if !self.config.jitter {
            return Duration::ZERO;
        }
        let nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
    }

    fn update_active_gauge(&self) {
        if let Some(ref m) = self.ctx.metrics {
            m.update_active_checks(self.active_count());
        }
    }
}

/// Timer loop for one check configuration
async fn run_timer(
    check: Arc<CheckDefinition>,
    seq: Arc<AtomicU64>,
    ctx: DispatchContext,
    cancel: CancellationToken,
    first_fire: Duration,
) {
    let mut ticker = interval_at(Instant::now() + first_fire, check.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(id = %check.id, "Timer stopped");
                break;
            }
            _ = ticker.tick() => {
                let n = seq.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.in_flight.spawn(dispatch(check.clone(), n, ctx.clone()));
            }
        }
    }
}

/// Run one probe and feed its result to the tracker
async fn dispatch(check: Arc<CheckDefinition>, seq: u64, ctx: DispatchContext) {
    // Saturation queues probes here; nothing is dropped
    let _permit = match &ctx.permits {
        Some(permits) => permits.clone().acquire_owned().await.ok(),
        None => None,
    };

    let kind = check.kind().name();
    let outcome = match ctx.probes.resolve(check.kind()) {
        Some(probe) => run_probe(probe, check.clone()).await,
        None => {
            warn!(id = %check.id, kind, "No probe registered for check type");
            ProbeOutcome::failure(Duration::ZERO, format!("no probe registered for type {}", kind))
        }
    };

    let result = ProbeResult::new(check.id, seq, outcome);
    let (success, latency) = (result.outcome.success, result.outcome.latency);
    match ctx.tracker.apply(&result) {
        ApplyOutcome::Dropped => {
            if let Some(ref m) = ctx.metrics {
                m.record_discarded("deleted");
            }
        }
        ApplyOutcome::Stale => {
            if let Some(ref m) = ctx.metrics {
                m.record_discarded("stale");
            }
        }
        ApplyOutcome::Applied(change) => {
            let Some(ref m) = ctx.metrics else {
                return;
            };
            // Deleted since the result was applied
            let Some(label) = ctx.kinds.get(&check.id) else {
                m.record_discarded("deleted");
                return;
            };

            m.record_probe(check.id, *label, success, latency);
            if let Some(change) = change {
                m.record_state_transition(check.id, *label, change.from, change.to);
            }
            if let Some(state) = ctx.tracker.get(check.id) {
                m.update_check_state(check.id, *label, state.status, state.consecutive_failures);
            }
        }
    }
}

/// Run a probe under the check's hard deadline.
///
/// The probe runs in its own task so a panic is contained and reported as
/// a failed result instead of taking the timer down.
async fn run_probe(probe: Arc<dyn Probe>, check: Arc<CheckDefinition>) -> ProbeOutcome {
    let deadline = check.timeout();
    let id = check.id;
    let start = Instant::now();

    let mut handle = tokio::spawn(async move { probe.probe(&check).await });

    match timeout(deadline, &mut handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(id = %id, error = %e, "Probe crashed");
            ProbeOutcome::internal(start.elapsed())
        }
        Err(_) => {
            handle.abort();
            debug!(id = %id, deadline = ?deadline, "Probe exceeded deadline");
            ProbeOutcome::timeout(deadline)
        }
    }
}
