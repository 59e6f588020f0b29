use crate::config::Environment;
use opentelemetry::global::{self, BoxedTracer};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// Uses RUST_LOG environment variable for filtering (defaults to "info" if not set).
///
/// Also adds an OpenTelemetry layer bound to the global tracer provider, so spans
/// are exported once a provider is installed (see [`crate::TelemetryGuard::init`]).
pub fn setup_logging(service_name: &str, environment: Environment) {
    let otel_layer = tracing_opentelemetry::layer().with_tracer(global::tracer(service_name.to_string()));
    install_subscriber(environment, otel_layer);
}

pub(crate) fn install_subscriber(
    environment: Environment,
    otel_layer: OpenTelemetryLayer<FilteredRegistry, BoxedTracer>,
) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    let result = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Global subscriber already installed: {}", e);
    }
}
