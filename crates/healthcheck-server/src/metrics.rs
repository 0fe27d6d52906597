//! Prometheus metrics for the health-check engine.

use crate::types::StatusSummary;
use healthcheck::{CheckId, CheckStatus};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

const ALL_STATUSES: [CheckStatus; 4] = [
    CheckStatus::Unknown,
    CheckStatus::Up,
    CheckStatus::Warning,
    CheckStatus::Down,
];

/// Labels for per-check metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    /// Check ID
    pub id: String,
    /// Check type (http, tcp, ping, dns, plugin)
    pub kind: String,
}

/// Labels for probe result counters
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    pub id: String,
    pub kind: String,
    /// success or failure
    pub result: String,
}

/// Labels for status transition counters
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub id: String,
    pub kind: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

/// Labels for discarded probe results
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DiscardLabels {
    /// stale or deleted
    pub reason: String,
}

/// Labels for registry mutations
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RegistryOpLabels {
    /// create, update, delete
    pub op: String,
    /// ok or the error kind
    pub outcome: String,
}

fn probe_duration_histogram() -> Histogram {
    // 1ms to ~16s
    Histogram::new(exponential_buckets(0.001, 2.0, 15))
}

/// Numeric encoding of a status for the status gauge
pub fn status_value(status: CheckStatus) -> i64 {
    match status {
        CheckStatus::Unknown => 0,
        CheckStatus::Up => 1,
        CheckStatus::Warning => 2,
        CheckStatus::Down => 3,
    }
}

/// Metrics registry with all engine metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    probes_total: Family<ProbeLabels, Counter>,
    probe_duration_seconds: Family<CheckLabels, Histogram, fn() -> Histogram>,
    /// Current status (0=unknown, 1=up, 2=warning, 3=down)
    status: Family<CheckLabels, Gauge>,
    consecutive_failures: Family<CheckLabels, Gauge>,
    status_transitions_total: Family<TransitionLabels, Counter>,

    checks_active: Gauge,
    checks_by_status: Family<StatusLabels, Gauge>,
    results_discarded_total: Family<DiscardLabels, Counter>,
    registry_operations_total: Family<RegistryOpLabels, Counter>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "golem_probes",
            "Total probes executed",
            probes_total.clone(),
        );

        let probe_duration_seconds: Family<CheckLabels, Histogram, fn() -> Histogram> =
            Family::new_with_constructor(probe_duration_histogram);
        registry.register(
            "golem_probe_duration_seconds",
            "Probe latency in seconds",
            probe_duration_seconds.clone(),
        );

        let status = Family::<CheckLabels, Gauge>::default();
        registry.register(
            "golem_status",
            "Current check status (0=unknown, 1=up, 2=warning, 3=down)",
            status.clone(),
        );

        let consecutive_failures = Family::<CheckLabels, Gauge>::default();
        registry.register(
            "golem_consecutive_failures",
            "Current consecutive failure count",
            consecutive_failures.clone(),
        );

        let status_transitions_total = Family::<TransitionLabels, Counter>::default();
        registry.register(
            "golem_status_transitions",
            "Total status transitions",
            status_transitions_total.clone(),
        );

        let checks_active = Gauge::default();
        registry.register(
            "golem_checks_active",
            "Checks with a running timer",
            checks_active.clone(),
        );

        let checks_by_status = Family::<StatusLabels, Gauge>::default();
        registry.register(
            "golem_checks_by_status",
            "Checks by current status",
            checks_by_status.clone(),
        );

        let results_discarded_total = Family::<DiscardLabels, Counter>::default();
        registry.register(
            "golem_probe_results_discarded",
            "Probe results not applied",
            results_discarded_total.clone(),
        );

        let registry_operations_total = Family::<RegistryOpLabels, Counter>::default();
        registry.register(
            "golem_registry_operations",
            "Registry mutations by outcome",
            registry_operations_total.clone(),
        );

        Self {
            registry,
            probes_total,
            probe_duration_seconds,
            status,
            consecutive_failures,
            status_transitions_total,
            checks_active,
            checks_by_status,
            results_discarded_total,
            registry_operations_total,
        }
    }

    /// Record a finished probe
    pub fn record_probe(&self, id: CheckId, kind: &str, success: bool, latency: Duration) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                id: id.to_string(),
                kind: kind.to_string(),
                result: result_label(success).to_string(),
            })
            .inc();

        self.probe_duration_seconds
            .get_or_create(&check_labels(id, kind))
            .observe(latency.as_secs_f64());
    }

    /// Update status and failure streak gauges
    pub fn update_check_state(
        &self,
        id: CheckId,
        kind: &str,
        status: CheckStatus,
        consecutive_failures: u32,
    ) {
        let labels = check_labels(id, kind);
        self.status.get_or_create(&labels).set(status_value(status));
        self.consecutive_failures
            .get_or_create(&labels)
            .set(i64::from(consecutive_failures));
    }

    pub fn record_state_transition(
        &self,
        id: CheckId,
        kind: &str,
        from: CheckStatus,
        to: CheckStatus,
    ) {
        self.status_transitions_total
            .get_or_create(&TransitionLabels {
                id: id.to_string(),
                kind: kind.to_string(),
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
            .inc();
    }

    /// Drop every series labelled with a deleted check
    pub fn remove_check(&self, id: CheckId, kind: &str) {
        let labels = check_labels(id, kind);
        self.probe_duration_seconds.remove(&labels);
        self.status.remove(&labels);
        self.consecutive_failures.remove(&labels);

        for success in [true, false] {
            self.probes_total.remove(&ProbeLabels {
                id: labels.id.clone(),
                kind: labels.kind.clone(),
                result: result_label(success).to_string(),
            });
        }

        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                self.status_transitions_total.remove(&TransitionLabels {
                    id: labels.id.clone(),
                    kind: labels.kind.clone(),
                    from: from.as_str().to_string(),
                    to: to.as_str().to_string(),
                });
            }
        }
    }

    pub fn update_active_checks(&self, count: usize) {
        self.checks_active.set(count as i64);
    }

    pub fn update_checks_by_status(&self, summary: &StatusSummary) {
        let counts = [
            (CheckStatus::Up, summary.up),
            (CheckStatus::Warning, summary.warning),
            (CheckStatus::Down, summary.down),
            (CheckStatus::Unknown, summary.unknown),
        ];
        for (status, count) in counts {
            self.checks_by_status
                .get_or_create(&StatusLabels {
                    status: status.as_str().to_string(),
                })
                .set(count as i64);
        }
    }

    /// Record a result that was not applied (stale or deleted)
    pub fn record_discarded(&self, reason: &str) {
        self.results_discarded_total
            .get_or_create(&DiscardLabels {
                reason: reason.to_string(),
            })
            .inc();
    }

    pub fn record_registry_op(&self, op: &str, outcome: &str) {
        self.registry_operations_total
            .get_or_create(&RegistryOpLabels {
                op: op.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Text exposition of all metrics
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_labels(id: CheckId, kind: &str) -> CheckLabels {
    CheckLabels {
        id: id.to_string(),
        kind: kind.to_string(),
    }
}

fn result_label(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}
