use common::{env_opt, env_or};
use inference::InferenceConfig;
use preprocess::MAX_UPLOAD_BYTES;

pub use common::Environment;

pub const SERVICE_NAME: &str = "gateway";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8501";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub addr: String,
    pub max_upload_bytes: usize,
    /// OTLP collector endpoint; logs only when unset
    pub otel_endpoint: Option<String>,
    pub inference: InferenceConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let max_upload_bytes = env_or("GATEWAY_MAX_UPLOAD_BYTES", MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            anyhow::bail!("GATEWAY_MAX_UPLOAD_BYTES must be greater than zero");
        }

        Ok(Self {
            environment: Environment::from_env(),
            addr: env_or("GATEWAY_ADDR", DEFAULT_ADDR.to_string()),
            max_upload_bytes,
            otel_endpoint: env_opt("OTEL_EXPORTER_OTLP_ENDPOINT"),
            inference: InferenceConfig::from_env()?,
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            addr: "127.0.0.1:0".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            otel_endpoint: None,
            inference: InferenceConfig::test_default(),
        }
    }
}
