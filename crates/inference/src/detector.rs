use crate::{
    annotate::Annotator,
    backend::{InferenceBackend, InferenceOutput},
    config::InferenceConfig,
    processing::post::{Detection, PostProcessor, TransformParams},
    runs::RunsDir,
};
use anyhow::Context;
use image::RgbImage;
use preprocess::{LetterboxPreProcessor, PreprocessResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictOptions {
    /// Write an annotated copy of the source into the detector's save directory
    pub save: bool,
    /// Minimum confidence for a detection to be reported
    pub conf: f32,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub detections: Vec<Detection>,
    pub image_size: (u32, u32),
    /// Directory this call saved into (or would have, when `save` is off)
    pub save_dir: PathBuf,
    /// Exact path of the annotated image, when one was written
    pub saved_path: Option<PathBuf>,
}

/// A pretrained detector that reads an image from disk.
pub trait Detector: Send + Sync {
    fn predict(&self, source: &Path, options: &PredictOptions) -> anyhow::Result<Prediction>;
}

struct Engine<B> {
    backend: B,
    preprocessor: LetterboxPreProcessor,
}

pub struct YoloDetector<B: InferenceBackend> {
    engine: Mutex<Engine<B>>,
    annotator: Annotator,
    runs: RunsDir,
    iou_threshold: f32,
    max_detections: usize,
}

impl<B: InferenceBackend> YoloDetector<B> {
    pub fn new(backend: B, config: &InferenceConfig) -> anyhow::Result<Self> {
        let mut annotator = Annotator::new(config.class_names.clone());
        if let Some(font_path) = &config.label_font_path {
            annotator = annotator.with_font_file(font_path)?;
        }

        Ok(Self {
            engine: Mutex::new(Engine {
                backend,
                preprocessor: LetterboxPreProcessor::new(config.input_size),
            }),
            annotator,
            runs: RunsDir::new(&config.runs_dir, config.run_name.clone())
                .keep_last(config.runs_keep),
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }

    pub fn with_runs_dir(mut self, runs: RunsDir) -> Self {
        self.runs = runs;
        self
    }

    pub fn runs(&self) -> &RunsDir {
        &self.runs
    }

    /// Run the model on an in-memory image.
    pub fn detect(&self, image: &RgbImage, conf: f32) -> anyhow::Result<Vec<Detection>> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| anyhow::anyhow!("Detector engine lock poisoned"))?;
        let engine = &mut *engine;

        let PreprocessResult {
            input,
            scale,
            offset_x,
            offset_y,
        } = engine.preprocessor.preprocess(image)?;

        let InferenceOutput { predictions } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            engine.backend.infer(&input)?
        };

        let transform = TransformParams {
            orig_width: image.width(),
            orig_height: image.height(),
            scale,
            offset_x,
            offset_y,
        };

        PostProcessor::new(conf, self.iou_threshold, self.max_detections)
            .parse_detections(&predictions.view(), &transform)
    }

    fn save_annotated(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        file_name: &str,
    ) -> anyhow::Result<(PathBuf, PathBuf)> {
        let save_dir = self
            .runs
            .next_save_dir()
            .with_context(|| format!("Failed to create save directory under {}", self.runs.root().display()))?;

        let mut annotated = image.clone();
        self.annotator.annotate(&mut annotated, detections);

        let path = save_dir.join(file_name);
        annotated
            .save(&path)
            .with_context(|| format!("Failed to save annotated image to {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Saved annotated image");

        Ok((save_dir, path))
    }
}

impl<B: InferenceBackend> Detector for YoloDetector<B> {
    fn predict(&self, source: &Path, options: &PredictOptions) -> anyhow::Result<Prediction> {
        let _span = tracing::info_span!("detector_predict", source = %source.display()).entered();

        let image = image::open(source)
            .with_context(|| format!("Failed to read detector source {}", source.display()))?
            .into_rgb8();

        let detections = self.detect(&image, options.conf)?;

        tracing::info!(
            detections = detections.len(),
            conf = options.conf,
            width = image.width(),
            height = image.height(),
            "Prediction complete"
        );

        let (save_dir, saved_path) = if options.save {
            let file_name = source
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image.jpg");
            let (dir, path) = self.save_annotated(&image, &detections, file_name)?;
            (dir, Some(path))
        } else {
            (self.runs.base(), None)
        };

        Ok(Prediction {
            detections,
            image_size: image.dimensions(),
            save_dir,
            saved_path,
        })
    }
}

/// Build the process-wide detector from configuration, loading the ONNX weights.
#[cfg(feature = "ort-backend")]
pub fn load_detector(
    config: &InferenceConfig,
) -> anyhow::Result<YoloDetector<crate::backend::ort::OrtBackend>> {
    let backend = crate::backend::ort::OrtBackend::load_model_with_provider(
        &config.model_path,
        config.execution_provider,
    )?;
    YoloDetector::new(backend, config)
}
