//! Golem monitoring server binary

use healthcheck_server::{Config, HealthcheckServer, ServerConfig, setup_tracing_with_otel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (needed for logging and telemetry settings)
    let yaml_config = match Config::load() {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            // Can't use tracing yet - not initialized
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            None
        }
    };

    let defaults = Config::default();
    let cfg = yaml_config.as_ref().unwrap_or(&defaults);

    let _telemetry_guard = setup_tracing_with_otel(
        &cfg.telemetry.service_name,
        &cfg.telemetry.otlp_endpoint,
        cfg.telemetry.protocol,
        cfg.telemetry.enabled,
        cfg.logging.level.as_deref().unwrap_or("info"),
        cfg.logging.format.as_deref(),
    )?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Golem monitoring server starting");

    let server_config = match yaml_config {
        Some(cfg) => cfg.to_server_config(),
        None => ServerConfig::default(),
    };

    HealthcheckServer::new(server_config)
        .run_until_ctrl_c()
        .await?;

    // Telemetry guard flushes spans on drop
    Ok(())
}
