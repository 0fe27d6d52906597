//! Probing and status classification for the Golem monitoring service.
//!
//! This crate provides the leaf building blocks of the health-check engine:
//! - the check data model (definitions, runtime state, probe results)
//! - the [`Probe`] trait with TCP, HTTP, ping, DNS and database implementations,
//!   plus runtime-registered plugin probes through [`ProbeSet`]
//! - the [`StatusTracker`], which debounces raw probe outcomes into
//!   `up` / `warning` / `down`
//!
//! Scheduling, the registry and the HTTP API live in `healthcheck-server`.
//!
//! # Example
//!
//! ```no_run
//! use healthcheck::{CheckDefinition, CheckId, CheckKind, CheckSpec, ProbeResult, ProbeSet, StatusTracker};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let check = CheckDefinition::new(
//!     CheckId(1),
//!     CheckSpec::new("db", CheckKind::Tcp, "10.0.0.5:5432", Duration::from_secs(10), Duration::from_secs(2)),
//! );
//!
//! let probes = ProbeSet::with_defaults()?;
//! let tracker = StatusTracker::default();
//! tracker.register(check.id);
//!
//! let probe = probes.resolve(check.kind()).expect("tcp probe installed");
//! let outcome = probe.probe(&check).await;
//! tracker.apply(&ProbeResult::new(check.id, 1, outcome));
//!
//! let status = tracker.get(check.id).map(|s| s.status);
//! # Ok(())
//! # }
//! ```

pub mod checkers;
pub mod tracker;
pub mod types;

pub use checkers::{DatabaseProbe, DnsProbe, HttpProbe, PingProbe, Probe, ProbeSet, TcpProbe, USER_AGENT};
pub use tracker::{ApplyOutcome, DEFAULT_FAILURE_THRESHOLD, StatusChange, StatusTracker};
pub use types::{
    Applied, CheckDefinition, CheckId, CheckKind, CheckRuntimeState, CheckSpec, CheckStatus,
    ProbeOutcome, ProbeResult, is_database_url,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_probe_outcome_constructors() {
        let ok = ProbeOutcome::success(Duration::from_millis(100));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let timeout = ProbeOutcome::timeout(Duration::from_secs(2));
        assert!(!timeout.success);
        assert_eq!(timeout.latency, Duration::from_secs(2));
        assert_eq!(timeout.error.as_deref(), Some("timeout"));

        let crashed = ProbeOutcome::internal(Duration::from_millis(5));
        assert_eq!(crashed.error.as_deref(), Some("internal probe error"));
    }

    #[test]
    fn test_definition_json_shape() {
        let def = CheckDefinition::new(
            CheckId(7),
            CheckSpec::new("web", CheckKind::http(), "http://x/health", Duration::from_secs(10), Duration::from_secs(2)),
        );

        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["type"], "http");
        assert_eq!(value["method"], "GET");
        assert_eq!(value["interval"], "10s");
        assert_eq!(value["timeout"], "2s");
        assert_eq!(value["enabled"], true);

        let back: CheckDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, def.id);
        assert_eq!(back.spec, def.spec);
    }
}
