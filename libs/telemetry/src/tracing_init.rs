use std::sync::OnceLock;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{HasExportConfig, SpanExporter};
use opentelemetry_sdk::{Resource, propagation::TraceContextPropagator, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{TelemetryConfig, TelemetryProtocol};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_telemetry(cfg: TelemetryConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let otel = if cfg.exporter_enabled() {
        Some(otel_layer(&cfg)?)
    } else {
        None
    };

    // A subscriber installed elsewhere (tests) wins.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(log_layer(cfg.json_logs))
        .with(otel)
        .try_init()
        .ok();

    INIT.set(()).ok();
    Ok(())
}

fn log_layer<S>(json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    }
}

fn otel_layer<S>(cfg: &TelemetryConfig) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    let exporter = span_exporter(cfg)
        .with_context(|| format!("building otlp exporter for {}", cfg.endpoint))?;
    let provider = SdkTracerProvider::builder()
        .with_resource(
            Resource::builder_empty()
                .with_service_name(cfg.service_name.clone())
                .with_attributes([
                    KeyValue::new("service.version", cfg.service_version.clone()),
                    KeyValue::new("deployment.environment", cfg.environment.clone()),
                ])
                .build(),
        )
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer(cfg.service_name.clone());
    global::set_tracer_provider(provider);
    global::set_text_map_propagator(TraceContextPropagator::new());
    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

fn span_exporter(
    cfg: &TelemetryConfig,
) -> Result<SpanExporter, opentelemetry_otlp::ExporterBuildError> {
    let endpoint = Some(cfg.endpoint.clone());
    match cfg.protocol {
        TelemetryProtocol::Grpc => {
            let mut builder = SpanExporter::builder().with_tonic();
            builder.export_config().endpoint = endpoint;
            builder.build()
        }
        TelemetryProtocol::HttpProtobuf => {
            let mut builder = SpanExporter::builder().with_http();
            builder.export_config().endpoint = endpoint;
            builder.build()
        }
    }
}
