//! Health check types and structures.

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Health check identifier.
///
/// Allocated from a monotonically increasing counter, so ordering by id is
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckId(pub u64);

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health check status as exposed to consumers.
///
/// The lowercase spelling is part of the external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// No probe result applied yet
    Unknown,
    /// Last probe succeeded
    Up,
    /// Failing, but below the failure threshold
    Warning,
    /// Failure threshold reached
    Down,
}

impl CheckStatus {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Unknown => "unknown",
            CheckStatus::Up => "up",
            CheckStatus::Warning => "warning",
            CheckStatus::Down => "down",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health check type, with type-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckKind {
    /// HTTP/HTTPS request against a URL target; `api` is accepted as an alias
    #[serde(alias = "api")]
    Http {
        /// HTTP method (GET, POST, etc.)
        #[serde(default = "default_method")]
        method: String,
        /// Extra request headers
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        /// Optional request body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        /// Exact status code required; 2xx-3xx when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_code: Option<u16>,
        /// Substring the response body must contain
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_body: Option<String>,
    },

    /// TCP connection check against `host:port`
    Tcp,

    /// ICMP ping check against a host
    Ping,

    /// DNS resolution check against a hostname
    Dns {
        /// Expected IP addresses (any match succeeds)
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expected_ips: Vec<String>,
    },

    /// Connect and ping a `postgres://`, `mysql://` or `sqlite:` URL
    Database,

    /// Probe registered at runtime under a name
    Plugin {
        /// Registered probe name
        plugin: String,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_enabled() -> bool {
    true
}

impl CheckKind {
    /// Plain HTTP GET with default success classification.
    pub fn http() -> Self {
        CheckKind::Http {
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            expect_code: None,
            expect_body: None,
        }
    }

    /// Type name used for logging and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Http { .. } => "http",
            CheckKind::Tcp => "tcp",
            CheckKind::Ping => "ping",
            CheckKind::Dns { .. } => "dns",
            CheckKind::Database => "database",
            CheckKind::Plugin { .. } => "plugin",
        }
    }
}

/// User-supplied part of a check definition (create/update payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,

    #[serde(flatten)]
    pub kind: CheckKind,

    /// Address or URL, depending on the check type
    pub target: String,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl CheckSpec {
    /// Create an enabled spec.
    pub fn new(
        name: impl Into<String>,
        kind: CheckKind,
        target: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            interval,
            timeout,
            enabled: true,
        }
    }

    /// Validate the definition. Violations are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("name must not be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(Error::invalid("target must not be empty"));
        }
        if self.interval.is_zero() {
            return Err(Error::invalid("interval must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid("timeout must be positive"));
        }
        if self.timeout > self.interval {
            return Err(Error::invalid(format!(
                "timeout ({}) must not exceed interval ({})",
                humantime_serde::re::humantime::format_duration(self.timeout),
                humantime_serde::re::humantime::format_duration(self.interval),
            )));
        }

        match &self.kind {
            CheckKind::Http { method, .. } => {
                if reqwest::Method::from_bytes(method.as_bytes()).is_err() {
                    return Err(Error::invalid(format!("invalid HTTP method: {}", method)));
                }
                if !self.target.starts_with("http://") && !self.target.starts_with("https://") {
                    return Err(Error::invalid("HTTP target must start with http:// or https://"));
                }
            }
            CheckKind::Tcp => {
                let port = self.target.rsplit_once(':').map(|(host, port)| (host, port.parse::<u16>()));
                if !matches!(port, Some((host, Ok(_))) if !host.is_empty()) {
                    return Err(Error::invalid("TCP target must be host:port"));
                }
            }
            CheckKind::Database if !is_database_url(&self.target) => {
                return Err(Error::invalid(
                    "database target must start with postgres://, mysql:// or sqlite:",
                ));
            }
            CheckKind::Plugin { plugin } if plugin.trim().is_empty() => {
                return Err(Error::invalid("plugin name must not be empty"));
            }
            _ => {}
        }

        Ok(())
    }
}

/// Whether a target names a supported database driver
pub fn is_database_url(target: &str) -> bool {
    ["postgres://", "postgresql://", "mysql://", "sqlite:"]
        .iter()
        .any(|scheme| target.starts_with(scheme))
}

/// A registered check definition. Owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub id: CheckId,

    #[serde(flatten)]
    pub spec: CheckSpec,

    #[serde(with = "humantime_serde")]
    pub created_at: SystemTime,

    #[serde(with = "humantime_serde")]
    pub updated_at: SystemTime,
}

impl CheckDefinition {
    pub fn new(id: CheckId, spec: CheckSpec) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            spec,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind(&self) -> &CheckKind {
        &self.spec.kind
    }

    pub fn target(&self) -> &str {
        &self.spec.target
    }

    pub fn interval(&self) -> Duration {
        self.spec.interval
    }

    pub fn timeout(&self) -> Duration {
        self.spec.timeout
    }

    pub fn enabled(&self) -> bool {
        self.spec.enabled
    }
}

/// Outcome of a single probe attempt, as returned by a [`crate::Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,

    /// Time taken by the attempt
    pub latency: Duration,

    /// Failure reason
    pub error: Option<String>,

    /// Response code (for HTTP checks)
    pub response_code: Option<u16>,
}

impl ProbeOutcome {
    /// Create a successful outcome
    pub fn success(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
            error: None,
            response_code: None,
        }
    }

    /// Create a failed outcome
    pub fn failure(latency: Duration, message: impl Into<String>) -> Self {
        Self {
            success: false,
            latency,
            error: Some(message.into()),
            response_code: None,
        }
    }

    /// Deadline exceeded; latency is the deadline itself
    pub fn timeout(deadline: Duration) -> Self {
        Self::failure(deadline, "timeout")
    }

    /// Probe implementation crashed
    pub fn internal(latency: Duration) -> Self {
        Self::failure(latency, "internal probe error")
    }

    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }
}

/// A probe outcome tagged for the status tracker.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub check_id: CheckId,

    /// Per-check dispatch sequence number, starting at 1
    pub seq: u64,

    pub outcome: ProbeOutcome,

    pub timestamp: SystemTime,
}

impl ProbeResult {
    pub fn new(check_id: CheckId, seq: u64, outcome: ProbeOutcome) -> Self {
        Self {
            check_id,
            seq,
            outcome,
            timestamp: SystemTime::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.success
    }
}

/// Runtime state kept 1:1 with each registered check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRuntimeState {
    pub status: CheckStatus,

    pub consecutive_failures: u32,

    #[serde(with = "humantime_serde", default)]
    pub last_response_time: Option<Duration>,

    #[serde(with = "humantime_serde", default)]
    pub last_checked_at: Option<SystemTime>,

    pub last_error: Option<String>,

    pub total_checks: u64,

    pub total_failures: u64,

    /// Sequence number of the last applied result
    #[serde(skip)]
    pub last_applied_seq: u64,
}

impl Default for CheckRuntimeState {
    fn default() -> Self {
        Self {
            status: CheckStatus::Unknown,
            consecutive_failures: 0,
            last_response_time: None,
            last_checked_at: None,
            last_error: None,
            total_checks: 0,
            total_failures: 0,
            last_applied_seq: 0,
        }
    }
}

/// Result of feeding a probe result into a runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Older than the last applied result; ignored
    Stale,
    /// State updated
    Updated { from: CheckStatus, to: CheckStatus },
}

impl CheckRuntimeState {
    /// Apply a probe result with the given failure threshold.
    ///
    /// Success resets the failure streak and yields `Up`. A failure yields
    /// `Warning` while the streak is below `failure_threshold`, `Down` once it
    /// reaches it.
    pub fn apply(&mut self, result: &ProbeResult, failure_threshold: u32) -> Applied {
        if result.seq <= self.last_applied_seq {
            return Applied::Stale;
        }

        let from = self.status;
        self.last_applied_seq = result.seq;
        self.total_checks += 1;
        self.last_response_time = Some(result.outcome.latency);
        self.last_checked_at = Some(result.timestamp);
        self.last_error = result.outcome.error.clone();

        if result.outcome.success {
            self.consecutive_failures = 0;
            self.status = CheckStatus::Up;
        } else {
            self.total_failures += 1;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.status = if self.consecutive_failures >= failure_threshold.max(1) {
                CheckStatus::Down
            } else {
                CheckStatus::Warning
            };
        }

        Applied::Updated {
            from,
            to: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(seq: u64, success: bool) -> ProbeResult {
        let outcome = if success {
            ProbeOutcome::success(Duration::from_millis(20))
        } else {
            ProbeOutcome::failure(Duration::from_millis(20), "connection refused")
        };
        ProbeResult::new(CheckId(1), seq, outcome)
    }

    fn spec() -> CheckSpec {
        CheckSpec::new(
            "web",
            CheckKind::http(),
            "http://x/health",
            Duration::from_secs(10),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_status_spelling() {
        assert_eq!(CheckStatus::Up.to_string(), "up");
        assert_eq!(CheckStatus::Warning.to_string(), "warning");
        assert_eq!(CheckStatus::Down.to_string(), "down");
        assert_eq!(CheckStatus::Unknown.to_string(), "unknown");
        assert_eq!(serde_json::to_string(&CheckStatus::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_failure_streak_classification() {
        let mut state = CheckRuntimeState::default();

        state.apply(&result(1, false), 3);
        assert_eq!(state.status, CheckStatus::Warning);
        assert_eq!(state.consecutive_failures, 1);

        state.apply(&result(2, false), 3);
        assert_eq!(state.status, CheckStatus::Warning);

        state.apply(&result(3, false), 3);
        assert_eq!(state.status, CheckStatus::Down);
        assert_eq!(state.consecutive_failures, 3);

        let applied = state.apply(&result(4, true), 3);
        assert_eq!(
            applied,
            Applied::Updated {
                from: CheckStatus::Down,
                to: CheckStatus::Up
            }
        );
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());
        assert_eq!(state.total_checks, 4);
        assert_eq!(state.total_failures, 3);
    }

    #[test]
    fn test_threshold_of_one_goes_straight_down() {
        let mut state = CheckRuntimeState::default();
        state.apply(&result(1, false), 1);
        assert_eq!(state.status, CheckStatus::Down);
    }

    #[test]
    fn test_stale_result_is_ignored() {
        let mut state = CheckRuntimeState::default();
        state.apply(&result(2, true), 3);

        assert_eq!(state.apply(&result(1, false), 3), Applied::Stale);
        assert_eq!(state.status, CheckStatus::Up);
        assert_eq!(state.total_checks, 1);
    }

    #[test]
    fn test_spec_validation() {
        assert!(spec().validate().is_ok());

        let mut s = spec();
        s.timeout = Duration::from_secs(11);
        assert!(matches!(s.validate(), Err(Error::InvalidDefinition(_))));

        let mut s = spec();
        s.timeout = s.interval;
        assert!(s.validate().is_ok());

        let mut s = spec();
        s.name = "   ".into();
        assert!(s.validate().is_err());

        let mut s = spec();
        s.target = "".into();
        assert!(s.validate().is_err());

        let mut s = spec();
        s.interval = Duration::ZERO;
        assert!(s.validate().is_err());

        let mut s = spec();
        s.target = "x/health".into();
        assert!(s.validate().is_err());

        let mut s = spec();
        s.kind = CheckKind::Http {
            method: "GE T".into(),
            headers: BTreeMap::new(),
            body: None,
            expect_code: None,
            expect_body: None,
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_spec_json_uses_humantime_durations() {
        let json = r#"{
            "name": "web",
            "type": "http",
            "target": "http://x/health",
            "interval": "10s",
            "timeout": "2s"
        }"#;

        let spec: CheckSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.interval, Duration::from_secs(10));
        assert_eq!(spec.timeout, Duration::from_secs(2));
        assert!(spec.enabled);
        assert_eq!(spec.kind, CheckKind::http());

        // Bare integers are ambiguous and rejected
        let json = r#"{"name":"db","type":"tcp","target":"db:5432","interval":10,"timeout":2}"#;
        assert!(serde_json::from_str::<CheckSpec>(json).is_err());
    }

    #[test]
    fn test_target_shape_per_type() {
        let tcp = |target: &str| {
            CheckSpec::new("db", CheckKind::Tcp, target, Duration::from_secs(10), Duration::from_secs(2))
        };
        assert!(tcp("db.internal:5432").validate().is_ok());
        assert!(tcp("[::1]:5432").validate().is_ok());
        assert!(tcp("db.internal").validate().is_err());
        assert!(tcp("db.internal:postgres").validate().is_err());
        assert!(tcp(":5432").validate().is_err());

        let db = |target: &str| {
            CheckSpec::new("db", CheckKind::Database, target, Duration::from_secs(10), Duration::from_secs(2))
        };
        assert!(db("postgres://golem@db.internal/golem").validate().is_ok());
        assert!(db("mysql://root@127.0.0.1:3306/app").validate().is_ok());
        assert!(db("sqlite:///var/lib/golem/app.db").validate().is_ok());
        assert!(db("redis://127.0.0.1:6379").validate().is_err());
    }

    #[test]
    fn test_api_is_an_http_alias() {
        let json = r#"{
            "name": "orders",
            "type": "api",
            "target": "https://api.internal/orders",
            "interval": "30s",
            "timeout": "5s"
        }"#;

        let spec: CheckSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, CheckKind::http());
        assert_eq!(serde_json::to_value(&spec).unwrap()["type"], "http");

        let json = r#"{"name":"pg","type":"database","target":"postgres://db/app","interval":"1m","timeout":"5s"}"#;
        let spec: CheckSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, CheckKind::Database);
        assert_eq!(spec.kind.name(), "database");
    }
}
