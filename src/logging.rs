use crate::app_env;
use crate::config::OtelEndpoints;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::{Resource, runtime};
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{EnvFilter, prelude::*, registry};

/// The name of the client as it should appear in OpenTelemetry collectors
const SERVICE_NAME: &str = "todo-sync";

/// Struct containing OpenTelemetry primitives which export data to a tracing server
pub struct OtelExporters {
    pub tracer: Tracer,
    pub trace_provider: TracerProvider,
    pub meter: SdkMeterProvider,
}

/// Handle kept alive for the lifetime of the client so buffered telemetry can be flushed on exit
pub struct TelemetryGuard {
    providers: Option<(TracerProvider, SdkMeterProvider)>,
}

impl TelemetryGuard {
    /// Flushes and stops the OpenTelemetry exporters, if any were started. The providers block
    /// while flushing, so this happens off the runtime thread that drives their export tasks.
    pub async fn shutdown(self) {
        let Some((trace_provider, meter_provider)) = self.providers else {
            return;
        };

        let flushed = tokio::task::spawn_blocking(move || {
            (trace_provider.shutdown(), meter_provider.shutdown())
        })
        .await;

        match flushed {
            Ok((trace_result, meter_result)) => {
                if let Err(err) = trace_result {
                    warn!("Failed to shut down span exporter: {err}");
                }
                if let Err(err) = meter_result {
                    warn!("Failed to shut down metrics exporter: {err}");
                }
            }
            Err(err) => warn!("Telemetry shutdown task failed: {err}"),
        }
    }
}

/// Instantiates OpenTelemetry exporters which run in the background and send tracing/logging/metrics
/// data to an opentelemetry-compatible gRPC endpoint (typically http://localhost:4317 with a standard
/// collector setup)
pub fn init_exporters(endpoints: &OtelExporterEndpoints<'_>) -> Result<OtelExporters, anyhow::Error> {
    let span_export = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoints.traces)
        .build()?;
    let meter_export = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoints.metrics)
        .build()?;

    let metrics_reader = PeriodicReader::builder(meter_export, runtime::Tokio).build();

    let trace_provider = TracerProvider::builder()
        .with_batch_exporter(span_export, runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build();
    let meter_provider = SdkMeterProvider::builder()
        .with_reader(metrics_reader)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build();

    Ok(OtelExporters {
        tracer: trace_provider.tracer(SERVICE_NAME),
        trace_provider,
        meter: meter_provider,
    })
}

/// Borrowed pair of OTLP endpoints handed to [init_exporters]
pub struct OtelExporterEndpoints<'urls> {
    pub traces: &'urls str,
    pub metrics: &'urls str,
}

impl<'urls> From<&'urls OtelEndpoints> for OtelExporterEndpoints<'urls> {
    fn from(value: &'urls OtelEndpoints) -> Self {
        OtelExporterEndpoints {
            traces: &value.spans,
            metrics: &value.metrics,
        }
    }
}

/// Constructs a filter which uses [app_env::LOG_LEVEL] to configure per-module logging. Filters
/// to the "info" level by default.
pub fn init_env_filter() -> Result<EnvFilter, anyhow::Error> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(app_env::LOG_LEVEL)
        .from_env()?;

    Ok(filter)
}

/// Sets up the global logging and tracing sinks. All logs and metrics at the "debug" level and above
/// will automatically be sent to OpenTelemetry sinks if [otel_exporters] is provided. [env_filter] is
/// applied specifically to the JSON logger, which prints to stderr so it stays out of the rendered
/// to-do list on stdout. Though the logger is set up with the "tracing" crate, it also provides a
/// bridge for libraries still using "log" for logging.
pub fn setup_logging_and_tracing(
    env_filter: EnvFilter,
    otel_exporters: Option<OtelExporters>,
) -> TelemetryGuard {
    global::set_text_map_propagator(TraceContextPropagator::new());

    if let Some(exporters) = otel_exporters {
        registry()
            .with(LevelFilter::DEBUG)
            .with(OpenTelemetryLayer::new(exporters.tracer))
            .with(MetricsLayer::new(exporters.meter.clone()))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter),
            )
            .init();

        TelemetryGuard {
            providers: Some((exporters.trace_provider, exporters.meter)),
        }
    } else {
        registry()
            .with(LevelFilter::DEBUG)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter),
            )
            .init();

        TelemetryGuard { providers: None }
    }
}
