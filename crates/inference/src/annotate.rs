//! Rendering detections onto the source image.

use crate::processing::post::Detection;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::path::Path;

const MIN_LINE_WIDTH: i32 = 2;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_PADDING: i32 = 2;
const LABEL_CHAR_WIDTH: f32 = 0.55; // fraction of font size, used when no font is loaded

/// DejaVu Sans Bold, see assets/DejaVuSans-LICENSE.txt
const DEFAULT_LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

// Box colours, cycled by class id
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

pub struct Annotator {
    class_names: Vec<String>,
    font: Option<FontVec>,
}

impl Annotator {
    /// Labels are drawn with the bundled DejaVu Sans Bold.
    pub fn new(class_names: Vec<String>) -> Self {
        let font = match FontVec::try_from_vec(DEFAULT_LABEL_FONT.to_vec()) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(error = %e, "Bundled label font is unusable, labels will have no text");
                None
            }
        };
        Self { class_names, font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Replace the bundled font with a TTF/OTF file.
    pub fn with_font_file(mut self, path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read label font {}: {}", path.display(), e))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("Invalid label font {}: {}", path.display(), e))?;
        tracing::info!(path = %path.display(), "Loaded label font");
        self.font = Some(font);
        Ok(self)
    }

    pub fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }

    pub fn color_for(class_id: usize) -> Rgb<u8> {
        Rgb(PALETTE[class_id % PALETTE.len()])
    }

    /// Line width grows with image size, as in most YOLO tooling.
    pub fn line_width(image: &RgbImage) -> i32 {
        let mean_side = (image.width() + image.height()) as f32 / 2.0;
        ((mean_side * 0.003).round() as i32).max(MIN_LINE_WIDTH)
    }

    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        let line_width = Self::line_width(image);
        for detection in detections {
            self.draw_detection(image, detection, line_width);
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, line_width: i32) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        if w == 0 || h == 0 {
            return;
        }

        let x_min = (detection.x1.floor() as i32).clamp(0, w - 1);
        let y_min = (detection.y1.floor() as i32).clamp(0, h - 1);
        let x_max = (detection.x2.ceil() as i32).clamp(0, w - 1);
        let y_max = (detection.y2.ceil() as i32).clamp(0, h - 1);

        if x_min >= x_max || y_min >= y_max {
            return;
        }

        let color = Self::color_for(detection.class_id);

        for t in 0..line_width {
            let box_w = x_max - x_min + 1 - 2 * t;
            let box_h = y_max - y_min + 1 - 2 * t;
            if box_w <= 0 || box_h <= 0 {
                break;
            }
            let rect = Rect::at(x_min + t, y_min + t).of_size(box_w as u32, box_h as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        let label = format!(
            "{} {:.2}",
            self.class_name(detection.class_id),
            detection.confidence
        );
        self.draw_label(image, &label, x_min, y_min, line_width, color);
    }

    fn draw_label(
        &self,
        image: &mut RgbImage,
        label: &str,
        x_min: i32,
        y_min: i32,
        line_width: i32,
        color: Rgb<u8>,
    ) {
        let font_size = (line_width as f32 * 8.0).max(12.0);
        let scale = PxScale::from(font_size);

        let (text_w, text_h) = match &self.font {
            Some(font) => {
                let (tw, th) = text_size(scale, font, label);
                (tw as i32, th as i32)
            }
            None => (
                (label.chars().count() as f32 * font_size * LABEL_CHAR_WIDTH) as i32,
                font_size as i32,
            ),
        };

        let tab_w = (text_w + 2 * LABEL_PADDING).min(image.width() as i32 - x_min);
        let tab_h = text_h + 2 * LABEL_PADDING;
        if tab_w <= 0 || tab_h <= 0 {
            return;
        }

        // Above the box when there is room, otherwise just inside it
        let tab_y = if y_min >= tab_h { y_min - tab_h } else { y_min };

        let rect = Rect::at(x_min, tab_y).of_size(tab_w as u32, tab_h as u32);
        draw_filled_rect_mut(image, rect, color);

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                LABEL_TEXT_COLOR,
                x_min + LABEL_PADDING,
                tab_y + LABEL_PADDING,
                scale,
                font,
                label,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32, class_id: usize) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.87,
            class_id,
        }
    }

    #[test]
    fn no_detections_leaves_image_untouched() {
        let original = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
        let mut image = original.clone();

        Annotator::new(vec![]).annotate(&mut image, &[]);

        assert_eq!(image, original);
    }

    #[test]
    fn box_edges_use_class_colour() {
        let mut image = RgbImage::from_pixel(400, 400, Rgb([0, 0, 0]));
        let annotator = Annotator::new(vec!["fracture".to_string()]);

        annotator.annotate(&mut image, &[detection(100.0, 150.0, 300.0, 350.0, 0)]);

        let color = Annotator::color_for(0);
        // Left and bottom edges are never covered by the label tab
        assert_eq!(image.get_pixel(100, 250), &color);
        assert_eq!(image.get_pixel(200, 350), &color);
        // Interior untouched
        assert_eq!(image.get_pixel(200, 250), &Rgb([0, 0, 0]));
        // Label tab sits above the box, text starts after the padding
        assert_eq!(image.get_pixel(100, 148), &color);
    }

    #[test]
    fn default_annotator_writes_label_text() {
        let mut image = RgbImage::from_pixel(400, 400, Rgb([0, 0, 0]));
        let annotator = Annotator::new(vec!["fracture".to_string()]);
        assert!(annotator.has_font());

        annotator.annotate(&mut image, &[detection(100.0, 150.0, 300.0, 350.0, 0)]);

        // White text blended over the red tab lifts the green channel
        let tab_color = Annotator::color_for(0);
        let text_pixels = (100..300)
            .flat_map(|x| (100..150).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y)[1] > tab_color[1].saturating_add(100))
            .count();
        assert!(text_pixels > 10, "only {} text pixels", text_pixels);
    }

    #[test]
    fn degenerate_and_edge_boxes_do_not_panic() {
        let mut image = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let annotator = Annotator::new(vec![]);

        annotator.annotate(
            &mut image,
            &[
                detection(10.0, 10.0, 10.0, 30.0, 0),
                detection(-20.0, -20.0, 80.0, 80.0, 1),
                detection(48.0, 0.0, 49.5, 2.0, 2),
            ],
        );
    }

    #[test]
    fn class_name_falls_back_to_index() {
        let annotator = Annotator::new(vec!["fracture".to_string()]);
        assert_eq!(annotator.class_name(0), "fracture");
        assert_eq!(annotator.class_name(3), "class3");
    }

    #[test]
    fn palette_cycles() {
        assert_eq!(Annotator::color_for(0), Annotator::color_for(PALETTE.len()));
        assert_ne!(Annotator::color_for(0), Annotator::color_for(1));
    }

    #[test]
    fn line_width_scales_with_image() {
        assert_eq!(Annotator::line_width(&RgbImage::new(100, 100)), 2);
        assert_eq!(Annotator::line_width(&RgbImage::new(2000, 2000)), 6);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let result = Annotator::new(vec![]).with_font_file(Path::new("/no/such/font.ttf"));
        assert!(result.is_err());
    }
}
