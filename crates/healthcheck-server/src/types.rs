//! Types shared by the server components and the HTTP API.

use healthcheck::{CheckDefinition, CheckRuntimeState, CheckStatus, DEFAULT_FAILURE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Server configuration, built from the YAML config or defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub listen_addr: String,

    /// Scheduler tuning
    pub scheduler: SchedulerConfig,

    /// Consecutive failures before a check is `down`
    pub failure_threshold: u32,

    /// Where check definitions are persisted
    pub store: StoreConfig,

    /// Whether Prometheus metrics are collected and served
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            scheduler: SchedulerConfig::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            store: StoreConfig::Memory,
            metrics_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Add a random offset in `[0, interval)` to each check's first fire
    pub jitter: bool,

    /// Global cap on running probes, 0 for unlimited
    pub max_concurrent_probes: usize,

    /// How long shutdown waits for in-flight probes
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jitter: true,
            max_concurrent_probes: 0,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    File(PathBuf),
}

/// A check definition joined with its runtime state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckView {
    #[serde(flatten)]
    pub definition: CheckDefinition,

    #[serde(flatten)]
    pub state: CheckRuntimeState,
}

impl CheckView {
    pub fn new(definition: CheckDefinition, state: CheckRuntimeState) -> Self {
        Self { definition, state }
    }

    pub fn status(&self) -> CheckStatus {
        self.state.status
    }
}

/// Count of checks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub up: usize,
    pub warning: usize,
    pub down: usize,
    pub unknown: usize,
}

impl StatusSummary {
    pub fn add(&mut self, status: CheckStatus) {
        self.total += 1;
        match status {
            CheckStatus::Up => self.up += 1,
            CheckStatus::Warning => self.warning += 1,
            CheckStatus::Down => self.down += 1,
            CheckStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn from_views(views: &[CheckView]) -> Self {
        let mut summary = Self::default();
        for view in views {
            summary.add(view.status());
        }
        summary
    }
}

/// Point-in-time view of every check plus the latest system metrics
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(with = "humantime_serde")]
    pub generated_at: SystemTime,

    pub checks: Vec<CheckView>,

    pub summary: StatusSummary,

    pub system: Option<SystemMetrics>,
}

// generated_at is not part of the observable state
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.checks == other.checks && self.summary == other.summary && self.system == other.system
    }
}

/// System metrics reading supplied by an external collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    #[serde(default, with = "humantime_serde")]
    pub timestamp: Option<SystemTime>,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    pub processes: Vec<ProcessMetrics>,
    pub uptime: UptimeMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub total_usage: f64,
    pub per_core_usage: BTreeMap<String, f64>,
    pub load_average: [f64; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub partitions: Vec<DiskPartition>,
    pub io_counters: BTreeMap<String, DiskIo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskPartition {
    pub device: String,
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIo {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time: u64,
    pub write_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub interfaces: BTreeMap<String, NetworkInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pid: i32,
    pub name: String,
    pub username: String,
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub status: String,
    pub create_time: i64,
    pub num_threads: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_counters: Option<ProcessIo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIo {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeMetrics {
    /// Seconds since boot
    pub uptime: f64,
    pub boot_time: u64,
}
