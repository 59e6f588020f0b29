use ndarray::ArrayViewD;
use std::cmp::Ordering;

/// Mapping from letterboxed model input back to the source image.
#[derive(Debug, Clone, Copy)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// A single detection in source-image pixel coordinates (xyxy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over Union with another detection.
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0.0 { 0.0 } else { intersection / union }
    }
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Decode YOLO head output into filtered detections.
    ///
    /// `predictions` has shape `[1, 4 + num_classes, num_anchors]`: rows 0..4 are
    /// cx, cy, w, h in model-input pixels, the remaining rows are per-class scores
    /// (already sigmoid-activated by the exported graph).
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = predictions.shape();
        anyhow::ensure!(
            shape.len() == 3 && shape[0] == 1,
            "YOLO output must have shape [1, 4 + classes, anchors] (got {:?})",
            shape
        );
        anyhow::ensure!(
            shape[1] > 4,
            "YOLO output has no class rows (got {:?})",
            shape
        );

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];

        let mut detections = Vec::new();

        for i in 0..num_anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..num_classes {
                let score = predictions[[0, 4 + c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c;
                }
            }

            if !confidence.is_finite() || confidence < self.confidence_threshold {
                continue;
            }

            let (x1_input, y1_input, x2_input, y2_input) = cxcywh_to_xyxy(
                predictions[[0, 0, i]],
                predictions[[0, 1, i]],
                predictions[[0, 2, i]],
                predictions[[0, 3, i]],
            );

            // Inverse letterbox into original image coordinates
            let x1 = ((x1_input - transform.offset_x) / transform.scale)
                .clamp(0.0, transform.orig_width as f32);
            let y1 = ((y1_input - transform.offset_y) / transform.scale)
                .clamp(0.0, transform.orig_height as f32);
            let x2 = ((x2_input - transform.offset_x) / transform.scale)
                .clamp(0.0, transform.orig_width as f32);
            let y2 = ((y2_input - transform.offset_y) / transform.scale)
                .clamp(0.0, transform.orig_height as f32);

            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            detections.push(Detection {
                x1,
                y1,
                x2,
                y2,
                confidence,
                class_id,
            });
        }

        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        if self.iou_threshold > 0.0 && detections.len() > 1 {
            detections = non_max_suppression(detections, self.iou_threshold);
        }

        if self.max_detections > 0 && detections.len() > self.max_detections {
            detections.truncate(self.max_detections);
        }

        tracing::debug!(count = detections.len(), "Parsed detections");

        Ok(detections)
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

/// Class-aware NMS over detections sorted by descending confidence.
fn non_max_suppression(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == detection.class_id && detection.iou(k) > threshold);
        if !suppressed {
            kept.push(detection);
        }
    }
    kept
}
