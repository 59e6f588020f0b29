use common::{env_opt, env_or};
use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "best.onnx";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;
pub const DEFAULT_RUNS_KEEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    fn from_env() -> Self {
        match env_opt("EXECUTION_PROVIDER")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "cuda" | "gpu" => ExecutionProvider::Cuda,
            _ => ExecutionProvider::Cpu,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: PathBuf,
    pub execution_provider: ExecutionProvider,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub runs_dir: PathBuf,
    pub run_name: String,
    /// Save directories kept on disk, zero for all
    pub runs_keep: usize,
    pub class_names: Vec<String>,
    pub label_font_path: Option<PathBuf>,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path = PathBuf::from(
            env_opt("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
        );

        let input_size: u32 = env_or("INPUT_SIZE", 640);
        if input_size == 0 || input_size % 32 != 0 {
            anyhow::bail!("INPUT_SIZE must be a positive multiple of 32, got {}", input_size);
        }

        let confidence_threshold = env_or("CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            anyhow::bail!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                confidence_threshold
            );
        }

        let iou_threshold = env_or("IOU_THRESHOLD", DEFAULT_IOU_THRESHOLD);
        let max_detections = env_or("MAX_DETECTIONS", DEFAULT_MAX_DETECTIONS);

        let runs_dir = PathBuf::from(
            env_opt("RUNS_DIR").unwrap_or_else(|| "runs/detect".to_string()),
        );
        let run_name = env_opt("RUN_NAME").unwrap_or_else(|| "predict".to_string());
        let runs_keep = env_or("RUNS_KEEP", DEFAULT_RUNS_KEEP);

        let class_names = env_opt("CLASS_NAMES")
            .map(|names| parse_class_names(&names))
            .unwrap_or_default();

        let label_font_path = env_opt("LABEL_FONT_PATH").map(PathBuf::from);

        Ok(Self {
            model_path,
            execution_provider: ExecutionProvider::from_env(),
            input_size: (input_size, input_size),
            confidence_threshold,
            iou_threshold,
            max_detections,
            runs_dir,
            run_name,
            runs_keep,
            class_names,
            label_font_path,
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            model_path: PathBuf::from("/models/best.onnx"),
            execution_provider: ExecutionProvider::Cpu,
            input_size: (640, 640),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            runs_dir: PathBuf::from("runs/detect"),
            run_name: "predict".to_string(),
            runs_keep: DEFAULT_RUNS_KEEP,
            class_names: vec!["fracture".to_string()],
            label_font_path: None,
        }
    }
}

/// Split a comma-separated label list, dropping blanks.
pub fn parse_class_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
