//! Logging and optional trace export.
//!
//! Log output always goes to stderr through the fmt layer. With the `otel`
//! feature and an `[telemetry.opentelemetry]` section, spans are also shipped
//! over OTLP under the configured service name.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[cfg(feature = "otel")]
use crate::config::OpenTelemetryConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace::SdkTracerProvider;
#[cfg(feature = "otel")]
use std::sync::OnceLock;

#[cfg(feature = "otel")]
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init(config: &TelemetryConfig) -> Result<(), InitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "otel")]
    {
        use opentelemetry::trace::TracerProvider;

        let otel_layer = match config.opentelemetry {
            Some(ref otel_config) => {
                let provider = tracer_provider(otel_config)?;
                let tracer = provider.tracer(otel_config.service_name.clone());
                let _ = TRACER_PROVIDER.set(provider);
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            None => None,
        };
        registry.with(otel_layer).try_init()?;

        if let Some(ref otel_config) = config.opentelemetry {
            tracing::info!(
                endpoint = %otel_config.endpoint,
                service = %otel_config.service_name,
                "exporting spans over OTLP"
            );
        }
    }

    #[cfg(not(feature = "otel"))]
    {
        registry.try_init()?;
        if config.opentelemetry.is_some() {
            tracing::warn!("telemetry.opentelemetry is set but the otel feature is disabled");
        }
    }

    Ok(())
}

#[cfg(feature = "otel")]
fn tracer_provider(otel_config: &OpenTelemetryConfig) -> Result<SdkTracerProvider, InitError> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otel_config.endpoint)
        .build()?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, otel_config.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Flush pending spans. A no-op without the `otel` feature.
pub fn shutdown() {
    #[cfg(feature = "otel")]
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "failed to shut down tracer provider");
        }
    }
}
