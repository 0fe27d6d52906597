//! Configuration loading and validation for the monitoring server

use crate::telemetry::OtlpProtocol;
use crate::types::{SchedulerConfig, ServerConfig, StoreConfig};
use healthcheck::DEFAULT_FAILURE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub scheduler: SchedulerSettings,
    pub tracker: TrackerSettings,
    pub store: StoreSettings,
    pub metrics: MetricsSettings,
    pub telemetry: TelemetrySettings,
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.server.validate()?;
        self.scheduler.validate()?;
        self.tracker.validate()?;
        self.store.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// Probe scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerSettings {
    pub jitter: bool,

    /// 0 disables the cap
    #[validate(range(max = 100000))]
    pub max_concurrent_probes: usize,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_shutdown_grace")]
    pub shutdown_grace: Duration,
}

/// Status classification settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrackerSettings {
    #[validate(range(min = 1, max = 100))]
    pub failure_threshold: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

/// Check definition persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: Option<PathBuf>,
}

impl Validate for StoreSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.kind == StoreKind::File && self.path.is_none() {
            let mut errors = ValidationErrors::new();
            errors.add("path", ValidationError::new("store_path_required"));
            return Err(errors);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

/// OpenTelemetry export settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,

    #[validate(length(min = 1))]
    pub service_name: String,

    #[validate(length(min = 1))]
    pub otlp_endpoint: String,

    pub protocol: OtlpProtocol,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            jitter: true,
            max_concurrent_probes: 0,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "golem-monitor".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            protocol: OtlpProtocol::Grpc,
        }
    }
}

// Custom validators

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.trim()
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

fn validate_shutdown_grace(grace: &Duration) -> Result<(), ValidationError> {
    if *grace > Duration::from_secs(300) {
        return Err(ValidationError::new("shutdown_grace_out_of_range"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        Self::search_paths()
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Candidate config files, most global first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/golem/healthcheck-server.yaml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/golem/healthcheck-server.yaml"));
        }

        paths.push(PathBuf::from("./healthcheck-server.yaml"));
        paths
    }

    /// Convert to the plain config handed to the components
    pub fn to_server_config(&self) -> ServerConfig {
        let store = match (self.store.kind, &self.store.path) {
            (StoreKind::File, Some(path)) => StoreConfig::File(path.clone()),
            _ => StoreConfig::Memory,
        };

        ServerConfig {
            listen_addr: self.server.listen_addr.trim().to_string(),
            scheduler: SchedulerConfig {
                jitter: self.scheduler.jitter,
                max_concurrent_probes: self.scheduler.max_concurrent_probes,
                shutdown_grace: self.scheduler.shutdown_grace,
            },
            failure_threshold: self.tracker.failure_threshold,
            store,
            metrics_enabled: self.metrics.enabled,
        }
    }
}
