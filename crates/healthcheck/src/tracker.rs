//! Status tracking: turns probe results into a debounced status per check.

use crate::types::{Applied, CheckId, CheckRuntimeState, CheckStatus, ProbeResult};
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Default number of consecutive failures before a check is `Down`
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// A status transition produced by applying a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub id: CheckId,
    pub from: CheckStatus,
    pub to: CheckStatus,
}

/// What happened to a result handed to [`StatusTracker::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The check no longer exists
    Dropped,
    /// A newer result was already applied
    Stale,
    /// Applied; carries the transition when the status changed
    Applied(Option<StatusChange>),
}

/// Runtime state store with per-check serialization.
///
/// Each entry is only ever locked on its own shard, so results for different
/// checks are applied in parallel while updates to one check are serialized.
pub struct StatusTracker {
    states: DashMap<CheckId, CheckRuntimeState>,
    failure_threshold: u32,
}

impl StatusTracker {
    /// Create a tracker; a threshold of 0 is treated as 1
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            states: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Create the runtime state for a new check (status `Unknown`)
    pub fn register(&self, id: CheckId) {
        self.states.entry(id).or_default();
    }

    /// Destroy the runtime state of a deleted check
    pub fn remove(&self, id: CheckId) -> Option<CheckRuntimeState> {
        self.states.remove(&id).map(|(_, state)| state)
    }

    pub fn contains(&self, id: CheckId) -> bool {
        self.states.contains_key(&id)
    }

    /// Copy of the current state for one check
    pub fn get(&self, id: CheckId) -> Option<CheckRuntimeState> {
        self.states.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Apply a probe result.
    ///
    /// Results for checks that no longer exist are dropped, results older
    /// than the last applied one are ignored.
    pub fn apply(&self, result: &ProbeResult) -> ApplyOutcome {
        let Some(mut entry) = self.states.get_mut(&result.check_id) else {
            debug!(id = %result.check_id, seq = result.seq, "Dropping result for deleted check");
            return ApplyOutcome::Dropped;
        };

        let state = entry.value_mut();
        match state.apply(result, self.failure_threshold) {
            Applied::Stale => {
                debug!(
                    id = %result.check_id,
                    seq = result.seq,
                    last_applied = state.last_applied_seq,
                    "Ignoring stale probe result"
                );
                ApplyOutcome::Stale
            }
            Applied::Updated { from, to } => {
                let consecutive = state.consecutive_failures;
                drop(entry);

                if from == to {
                    return ApplyOutcome::Applied(None);
                }

                match to {
                    CheckStatus::Up => info!(id = %result.check_id, from = %from, "Check is now UP"),
                    CheckStatus::Warning => warn!(
                        id = %result.check_id,
                        from = %from,
                        consecutive,
                        error = result.outcome.error.as_deref().unwrap_or("unknown"),
                        "Check is now WARNING"
                    ),
                    CheckStatus::Down => warn!(
                        id = %result.check_id,
                        from = %from,
                        consecutive,
                        error = result.outcome.error.as_deref().unwrap_or("unknown"),
                        "Check is now DOWN (failure threshold met)"
                    ),
                    CheckStatus::Unknown => {}
                }

                ApplyOutcome::Applied(Some(StatusChange {
                    id: result.check_id,
                    from,
                    to,
                }))
            }
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeOutcome;
    use std::sync::Arc;
    use std::time::Duration;

    fn failure(id: u64, seq: u64) -> ProbeResult {
        ProbeResult::new(CheckId(id), seq, ProbeOutcome::timeout(Duration::from_secs(2)))
    }

    fn success(id: u64, seq: u64) -> ProbeResult {
        ProbeResult::new(CheckId(id), seq, ProbeOutcome::success(Duration::from_millis(12)))
    }

    #[test]
    fn test_register_starts_unknown() {
        let tracker = StatusTracker::default();
        tracker.register(CheckId(1));

        let state = tracker.get(CheckId(1)).unwrap();
        assert_eq!(state.status, CheckStatus::Unknown);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_checked_at.is_none());
    }

    #[test]
    fn test_register_is_idempotent() {
        let tracker = StatusTracker::default();
        tracker.register(CheckId(1));
        tracker.apply(&success(1, 1));
        tracker.register(CheckId(1));

        assert_eq!(tracker.get(CheckId(1)).unwrap().status, CheckStatus::Up);
    }

    #[test]
    fn test_transitions_are_reported_once() {
        let tracker = StatusTracker::default();
        tracker.register(CheckId(1));

        assert_eq!(
            tracker.apply(&failure(1, 1)),
            ApplyOutcome::Applied(Some(StatusChange {
                id: CheckId(1),
                from: CheckStatus::Unknown,
                to: CheckStatus::Warning,
            }))
        );
        assert_eq!(tracker.apply(&failure(1, 2)), ApplyOutcome::Applied(None));
        assert!(matches!(
            tracker.apply(&failure(1, 3)),
            ApplyOutcome::Applied(Some(StatusChange {
                to: CheckStatus::Down,
                ..
            }))
        ));

        let state = tracker.get(CheckId(1)).unwrap();
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
        assert_eq!(state.last_response_time, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_result_for_removed_check_is_dropped() {
        let tracker = StatusTracker::default();
        tracker.register(CheckId(1));
        assert!(tracker.remove(CheckId(1)).is_some());

        assert_eq!(tracker.apply(&success(1, 1)), ApplyOutcome::Dropped);
        assert!(!tracker.contains(CheckId(1)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_out_of_order_results() {
        let tracker = StatusTracker::default();
        tracker.register(CheckId(1));

        // seq 2 (success) lands before seq 1 (failure)
        tracker.apply(&success(1, 2));
        assert_eq!(tracker.apply(&failure(1, 1)), ApplyOutcome::Stale);

        let state = tracker.get(CheckId(1)).unwrap();
        assert_eq!(state.status, CheckStatus::Up);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_parallel_updates_to_distinct_checks() {
        let tracker = Arc::new(StatusTracker::new(3));
        for id in 0..16 {
            tracker.register(CheckId(id));
        }

        let handles: Vec<_> = (0..16u64)
            .map(|id| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for seq in 1..=100 {
                        tracker.apply(&failure(id, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in 0..16 {
            let state = tracker.get(CheckId(id)).unwrap();
            assert_eq!(state.consecutive_failures, 100);
            assert_eq!(state.status, CheckStatus::Down);
            assert_eq!(state.total_checks, 100);
        }
    }
}
