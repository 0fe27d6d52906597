//! OpenTelemetry integration for distributed tracing.
//!
//! When enabled, every `tracing` span (probe dispatch, API requests) is
//! exported to an OTLP collector next to the regular log output.

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Transport used to reach the OTLP collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// OTLP over gRPC, usually port 4317
    #[default]
    Grpc,
    /// OTLP over HTTP/protobuf, usually port 4318
    Http,
}

/// Flushes pending spans and shuts the provider down when dropped
pub struct TelemetryGuard {
    provider: TracerProvider,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("failed to shut down tracer provider: {}", e);
        }
    }
}

/// Build a tracer provider exporting to `otlp_endpoint`.
///
/// Must be called from within a tokio runtime.
pub fn init_tracer_provider(
    service_name: &str,
    otlp_endpoint: &str,
    protocol: OtlpProtocol,
) -> Result<TracerProvider, Box<dyn std::error::Error>> {
    let exporter = match protocol {
        OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otlp_endpoint)
            .build()?,
        OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(otlp_endpoint)
            .build()?,
    };

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .build())
}

/// Install the global subscriber: log output plus, when `enabled`, an
/// OpenTelemetry layer.
///
/// Returns a guard that must live until shutdown when telemetry is enabled.
pub fn setup_tracing_with_otel(
    service_name: &str,
    otlp_endpoint: &str,
    protocol: OtlpProtocol,
    enabled: bool,
    log_level: &str,
    log_format: Option<&str>,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    if !enabled {
        common::logging::init(log_level, log_format);
        tracing::info!("OpenTelemetry tracing disabled");
        return Ok(None);
    }

    let provider = init_tracer_provider(service_name, otlp_endpoint, protocol)?;
    let tracer = provider.tracer(service_name.to_string());
    opentelemetry::global::set_tracer_provider(provider.clone());

    let fmt_layer = match log_format {
        Some("json") => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(common::logging::env_filter(log_level))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    tracing::info!(
        service_name,
        otlp_endpoint,
        protocol = ?protocol,
        "Tracing initialized with OpenTelemetry export"
    );

    Ok(Some(TelemetryGuard { provider }))
}
