use crate::config::{GatewayConfig, SERVICE_NAME};
use common::TelemetryGuard;

/// Install the global subscriber, exporting over OTLP when an endpoint is configured.
///
/// The returned guard must be held for the life of the process so spans and
/// metrics are flushed on shutdown.
pub fn setup_logging(config: &GatewayConfig) -> Option<TelemetryGuard> {
    if let Some(endpoint) = &config.otel_endpoint {
        match TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment) {
            Ok(guard) => return Some(guard),
            Err(e) => eprintln!("Failed to initialize telemetry, falling back to logs only: {e:#}"),
        }
    }

    common::setup_logging(SERVICE_NAME, config.environment);
    None
}
