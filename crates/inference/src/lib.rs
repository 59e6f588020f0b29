pub mod annotate;
pub mod backend;
pub mod config;
pub mod detector;
pub mod invoker;
pub mod processing;
pub mod runs;

// Re-export commonly used types for convenience
pub use annotate::Annotator;
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::InferenceConfig;
#[cfg(feature = "ort-backend")]
pub use detector::load_detector;
pub use detector::{Detector, PredictOptions, Prediction, YoloDetector};
pub use invoker::{InferenceInvoker, InferenceOutcome, InvokeError};
pub use processing::post::Detection;
pub use runs::RunsDir;
