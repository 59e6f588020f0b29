use ndarray::{Array, IxDyn};
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

pub trait InferenceBackend: Send {
    fn load_model(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a letterboxed NCHW batch
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

pub struct InferenceOutput {
    pub predictions: ndarray::ArrayD<f32>, // [1, 4 + num_classes, num_anchors] cxcywh in input pixels
}

/// Fail early, with the path in the message, when the weights file is absent.
pub fn ensure_weights_exist(path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!(
            "Model weights not found at {} (set MODEL_PATH to an exported ONNX model)",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_weights_error_names_the_path() {
        let err = ensure_weights_exist(Path::new("/definitely/not/here/best.onnx")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/definitely/not/here/best.onnx"), "{}", message);
        assert!(message.contains("not found"), "{}", message);
    }

    #[test]
    fn directory_is_not_accepted_as_weights() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_weights_exist(dir.path()).is_err());
    }
}
