use crate::detector::{Detector, PredictOptions, Prediction};
use image::{ImageFormat, RgbImage};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use thiserror::Error;

/// Name the uploaded image is written under inside the scoped workspace.
pub const INPUT_FILE_NAME: &str = "input.jpg";
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Failed to create temporary workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Failed to write input image: {0}")]
    WriteInput(#[source] image::ImageError),

    #[error("Detector failed: {0:#}")]
    Detector(anyhow::Error),

    #[error("Failed to load detector output {path:?}: {source}")]
    LoadOutput {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug)]
pub enum InferenceOutcome {
    /// The detector wrote an annotated image and it was read back.
    Annotated {
        image: RgbImage,
        path: PathBuf,
        detections: usize,
    },
    /// The detector ran but nothing exists at the expected output path.
    OutputMissing { expected: PathBuf },
}

struct InvokerMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    output_missing: Counter<u64>,
    detections: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> InvokerMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0,
    ];
    InvokerMetrics {
        duration: meter
            .f64_histogram("inference_duration_seconds")
            .with_description("Time to run one upload through the detector, including disk I/O")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        requests: meter
            .u64_counter("inference_requests_total")
            .with_description("Total detector invocations")
            .build(),
        output_missing: meter
            .u64_counter("inference_output_missing_total")
            .with_description("Invocations where no annotated output was found")
            .build(),
        detections: meter
            .u64_counter("inference_detections_total")
            .with_description("Total detections produced")
            .build(),
    }
}

/// Runs the detector against an in-memory image through a scoped temporary directory.
///
/// Every call gets its own workspace, which is removed on all exit paths.
pub struct InferenceInvoker {
    detector: Arc<dyn Detector>,
    confidence: f32,
    temp_root: Option<PathBuf>,
    metrics: InvokerMetrics,
}

impl InferenceInvoker {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            confidence: DEFAULT_CONFIDENCE,
            temp_root: None,
            metrics: init_metrics("inference"),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn run(&self, image: &RgbImage) -> Result<InferenceOutcome, InvokeError> {
        let _span = tracing::info_span!(
            "inference_invoke",
            width = image.width(),
            height = image.height()
        )
        .entered();
        let start = Instant::now();
        self.metrics.requests.add(1, &[]);

        let workspace = self.create_workspace()?;
        let result = self.invoke_in(image, workspace.path());

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            tracing::warn!(
                path = %workspace_path.display(),
                error = %e,
                "Failed to remove temporary workspace"
            );
        }

        let elapsed = start.elapsed();
        let status = match &result {
            Ok(InferenceOutcome::Annotated { .. }) => "annotated",
            Ok(InferenceOutcome::OutputMissing { .. }) => "output_missing",
            Err(_) => "error",
        };
        self.metrics
            .duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("outcome", status)]);
        tracing::info!(
            outcome = status,
            duration_ms = elapsed.as_millis() as u64,
            "Inference invocation complete"
        );

        result
    }

    /// Write the input into `workspace`, run the detector and read back its output.
    fn invoke_in(
        &self,
        image: &RgbImage,
        workspace: &Path,
    ) -> Result<InferenceOutcome, InvokeError> {
        let input_path = workspace.join(INPUT_FILE_NAME);
        image
            .save_with_format(&input_path, ImageFormat::Jpeg)
            .map_err(InvokeError::WriteInput)?;

        let options = PredictOptions {
            save: true,
            conf: self.confidence,
        };
        let prediction = self
            .detector
            .predict(&input_path, &options)
            .map_err(InvokeError::Detector)?;

        self.collect_output(&prediction)
    }

    fn create_workspace(&self) -> Result<TempDir, InvokeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("xray-");
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(InvokeError::Workspace)
    }

    fn collect_output(&self, prediction: &Prediction) -> Result<InferenceOutcome, InvokeError> {
        let expected = expected_output(prediction);

        if !expected.is_file() {
            tracing::warn!(
                expected = %expected.display(),
                save_dir = %prediction.save_dir.display(),
                "Detector did not produce an annotated image"
            );
            self.metrics.output_missing.add(1, &[]);
            return Ok(InferenceOutcome::OutputMissing { expected });
        }

        let image = image::open(&expected)
            .map_err(|source| InvokeError::LoadOutput {
                path: expected.clone(),
                source,
            })?
            .into_rgb8();

        self.metrics
            .detections
            .add(prediction.detections.len() as u64, &[]);

        Ok(InferenceOutcome::Annotated {
            image,
            path: expected,
            detections: prediction.detections.len(),
        })
    }
}

/// Where the annotated image should be: the path the detector reported,
/// otherwise `<save_dir>/input.jpg`.
pub fn expected_output(prediction: &Prediction) -> PathBuf {
    prediction
        .saved_path
        .clone()
        .unwrap_or_else(|| save_dir_output(&prediction.save_dir))
}

fn save_dir_output(save_dir: &Path) -> PathBuf {
    save_dir.join(INPUT_FILE_NAME)
}
