//! Tracing setup: console logs plus optional OTLP span export.
//!
//! Log lines go to stdout, pretty or JSON depending on
//! `telemetry.log_format`. Verbosity comes from `RUST_LOG` and falls back to
//! [`DEFAULT_FILTER`]. When `telemetry.otlp_endpoint` is set, spans are also
//! exported over OTLP/HTTP (protobuf) with a batch processor.
//!
//! Call [`shutdown_telemetry`] before exit so pending spans are flushed.

use std::sync::OnceLock;

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use filegate_shared::{LogFormat, TelemetryConfig};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "filegate=info,filegate_api=info,filegate_core=info,tower_http=info";

// tracing-opentelemetry holds the tracer, not the provider; keep it for shutdown
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    let otel = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| create_otlp_tracer(endpoint, &config.service_name))
        .transpose()?
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
    let otlp_enabled = otel.is_some();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .with(otel)
        .try_init()?;

    info!(
        log_format = ?config.log_format,
        otlp_enabled,
        service_name = %config.service_name,
        "Telemetry initialized"
    );
    Ok(())
}

fn create_otlp_tracer(endpoint: &str, service_name: &str) -> anyhow::Result<Tracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::HttpBinary)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_attribute(KeyValue::new("service.name", service_name.to_string()))
                .build(),
        )
        .build();

    let tracer = provider.tracer(service_name.to_string());
    let _ = TRACER_PROVIDER.set(provider);

    Ok(tracer)
}

/// Flush and stop span export.
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        tracing::error!(error = %e, "Failed to shutdown tracer provider");
    }
}
