use anyhow::Context;
use gateway::{
    AppState,
    config::GatewayConfig,
    logging::setup_logging,
    server::run_server,
};
use inference::{InferenceInvoker, load_detector};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("Failed to load configuration")?;
    let _telemetry = setup_logging(&config);

    tracing::info!(
        environment = config.environment.as_str(),
        model_path = %config.inference.model_path.display(),
        runs_dir = %config.inference.runs_dir.display(),
        "Gateway starting"
    );

    // Weights are loaded before binding so a missing model stops startup
    let detector = load_detector(&config.inference).with_context(|| {
        format!(
            "Failed to load detector from {}",
            config.inference.model_path.display()
        )
    })?;
    tracing::info!("Detector loaded");

    let invoker = InferenceInvoker::new(Arc::new(detector))
        .with_confidence(config.inference.confidence_threshold);
    let state = AppState::new(invoker, config.max_upload_bytes);

    run_server(&config, state).await
}
