use crate::logging::install_subscriber;
use crate::{Environment, env_or};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;

const DEFAULT_METRIC_INTERVAL_MS: u64 = 10_000;

/// Export tuning read from the standard `OTEL_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// `OTEL_METRIC_EXPORT_INTERVAL`, in milliseconds
    pub metric_interval: Duration,
    /// `OTEL_TRACES_SAMPLER_ARG`, clamped to [0, 1]
    pub trace_ratio: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            metric_interval: Duration::from_millis(DEFAULT_METRIC_INTERVAL_MS),
            trace_ratio: 1.0,
        }
    }
}

impl ExportSettings {
    pub fn from_env() -> Self {
        let interval_ms = env_or("OTEL_METRIC_EXPORT_INTERVAL", DEFAULT_METRIC_INTERVAL_MS);
        let trace_ratio: f64 = env_or("OTEL_TRACES_SAMPLER_ARG", 1.0);

        Self {
            metric_interval: Duration::from_millis(interval_ms.max(1)),
            trace_ratio: if trace_ratio.is_nan() {
                1.0
            } else {
                trace_ratio.clamp(0.0, 1.0)
            },
        }
    }

    /// Every trace when the ratio is 1, otherwise a trace-id ratio under the parent's decision.
    fn sampler(&self) -> Sampler {
        let root = if self.trace_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else {
            Sampler::TraceIdRatioBased(self.trace_ratio)
        };
        Sampler::ParentBased(Box::new(root))
    }
}

/// Flushes and shuts down the tracer and meter providers when dropped.
///
/// # Example
/// ```ignore
/// let _telemetry = TelemetryGuard::init("xray-gateway", "http://localhost:4317", Environment::Production)?;
/// ```
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Install OTLP trace and metric export plus the global subscriber.
    ///
    /// Replaces [`crate::setup_logging`] when an exporter endpoint is configured.
    pub fn init(
        service_name: &str,
        endpoint: &str,
        environment: Environment,
    ) -> anyhow::Result<Self> {
        let settings = ExportSettings::from_env();
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(service_name);
        let tracer_provider = tracer_provider(endpoint, resource.clone(), &settings)?;
        let meter_provider = meter_provider(endpoint, resource, &settings)?;

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        let otel_layer =
            tracing_opentelemetry::layer().with_tracer(global::tracer(service_name.to_string()));
        install_subscriber(environment, otel_layer);

        tracing::info!(
            endpoint,
            metric_interval_ms = settings.metric_interval.as_millis() as u64,
            trace_ratio = settings.trace_ratio,
            "Telemetry export enabled"
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

fn service_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build()
}

fn tracer_provider(
    endpoint: &str,
    resource: Resource,
    settings: &ExportSettings,
) -> anyhow::Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(settings.sampler())
        .with_batch_exporter(exporter)
        .build())
}

fn meter_provider(
    endpoint: &str,
    resource: Resource,
    settings: &ExportSettings,
) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(settings.metric_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shutdown tracer provider: {:?}", e);
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Failed to shutdown meter provider: {:?}", e);
        }
    }
}

/// Creates an info-level span and enters it.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
}

/// Creates a debug-level span and enters it.
#[macro_export]
macro_rules! span_debug {
    ($name:literal) => {
        tracing::debug_span!($name).entered()
    };
}
