//! Golem monitoring server
//!
//! Runs user-defined health checks on independent timers, classifies each
//! target as up, warning or down, and serves a consistent view of checks and
//! system metrics over HTTP.
//!
//! # Components
//!
//! - **Registry**: authoritative set of check definitions, persisted through a
//!   [`CheckStore`]
//! - **Scheduler**: one timer per enabled check, each firing runs a probe in
//!   its own task under a hard deadline
//! - **Status tracker** (from the `healthcheck` crate): debounced status per
//!   check, tolerant of out-of-order and late results
//! - **Snapshot publisher**: joins definitions, runtime state and the latest
//!   system metrics into one read view
//! - **HTTP API**: CRUD for checks plus snapshot and Prometheus endpoints

pub mod config;
pub mod http_server;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::{Config, ConfigError};
pub use http_server::{ApiServer, ApiState, router};
pub use metrics::MetricsRegistry;
pub use registry::CheckRegistry;
pub use scheduler::Scheduler;
pub use server::{Engine, HealthcheckServer};
pub use snapshot::SnapshotPublisher;
pub use source::{MetricsSource, NoMetrics, StaticMetricsSource};
pub use store::{CheckStore, FileStore, MemoryStore};
pub use telemetry::{OtlpProtocol, TelemetryGuard, setup_tracing_with_otel};
pub use types::{
    CheckView, SchedulerConfig, ServerConfig, Snapshot, StatusSummary, StoreConfig, SystemMetrics,
};
