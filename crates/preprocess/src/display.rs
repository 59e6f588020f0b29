//! Upload decoding and fixed-height display scaling.
//!
//! Every uploaded X-ray is normalized to RGB and rescaled so its height is
//! [`DISPLAY_HEIGHT`], with the width scaled proportionally and rounded to the
//! nearest pixel.

use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{ImageError, ImageFormat, ImageReader, Limits, RgbImage, error::LimitError};
use std::io::Cursor;
use thiserror::Error;

/// Height, in pixels, of every image shown on the page.
pub const DISPLAY_HEIGHT: u32 = 420;

/// Maximum accepted upload size (10MB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Widest image the page will render at [`DISPLAY_HEIGHT`].
pub const MAX_DISPLAY_WIDTH: u32 = 4096;

/// Largest source width or height the decoder accepts.
pub const MAX_SOURCE_SIDE: u32 = 16_384;

/// Upper bound on decoder allocations (512MB)
pub const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format, expected JPEG or PNG")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Image exceeds decoder limits: {0}")]
    Limits(LimitError),

    #[error(
        "Image {width}x{height} would be {scaled_width} px wide at {target_height} px high (max: {max_width})"
    )]
    TooWide {
        width: u32,
        height: u32,
        target_height: u32,
        scaled_width: u32,
        max_width: u32,
    },

    #[error("Failed to resize image: {0}")]
    Resize(String),
}

/// Detect image format from magic bytes. Only JPEG and PNG are accepted.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, PrepareError> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Ok(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),
        _ => Err(PrepareError::UnsupportedFormat),
    }
}

/// Decode raw upload bytes into an RGB image, whatever the source color mode.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PrepareError> {
    decode_rgb_with_limit(bytes, MAX_UPLOAD_BYTES)
}

/// [`decode_rgb`] with a caller-supplied upload size limit.
///
/// Source dimensions are capped at [`MAX_SOURCE_SIDE`] and decoder memory at
/// [`MAX_DECODE_ALLOC`] whatever the byte limit.
pub fn decode_rgb_with_limit(bytes: &[u8], max_bytes: usize) -> Result<RgbImage, PrepareError> {
    if bytes.is_empty() {
        return Err(PrepareError::EmptyData);
    }

    if bytes.len() > max_bytes {
        return Err(PrepareError::TooLarge(bytes.len(), max_bytes));
    }

    let format = detect_format(bytes)?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_SIDE);
    limits.max_image_height = Some(MAX_SOURCE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(limits);
    let decoded = reader.decode().map_err(|e| match e {
        ImageError::Limits(limit) => PrepareError::Limits(limit),
        other => PrepareError::Decode(other),
    })?;

    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        format = ?format,
        "Decoded upload"
    );

    Ok(decoded.into_rgb8())
}

/// Width after scaling `width x height` to `target_height`, rounded to the
/// nearest pixel and never below one.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    let scaled = (width as f64 * target_height as f64 / height as f64).round();
    (scaled as u32).max(1)
}

/// Proportionally rescale `image` so its height equals `target_height`.
///
/// An image that already has the target height is returned unchanged.
pub fn resize_to_height(image: &RgbImage, target_height: u32) -> Result<RgbImage, PrepareError> {
    let _s = span!("resize_to_height");

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || target_height == 0 {
        return Err(PrepareError::InvalidDimensions { width, height });
    }

    let new_width = scaled_width(width, height, target_height);
    if new_width > MAX_DISPLAY_WIDTH {
        return Err(PrepareError::TooWide {
            width,
            height,
            target_height,
            scaled_width: new_width,
            max_width: MAX_DISPLAY_WIDTH,
        });
    }

    if height == target_height {
        return Ok(image.clone());
    }

    let src = ImageRef::new(width, height, image.as_raw(), PixelType::U8x3)
        .map_err(|e| PrepareError::Resize(e.to_string()))?;
    let mut dst = Image::new(new_width, target_height, PixelType::U8x3);

    Resizer::new()
        .resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )
        .map_err(|e| PrepareError::Resize(e.to_string()))?;

    RgbImage::from_raw(new_width, target_height, dst.into_vec())
        .ok_or_else(|| PrepareError::Resize("resized buffer has unexpected length".to_string()))
}

/// Decode an upload and scale it to [`DISPLAY_HEIGHT`].
pub fn prepare_for_display(bytes: &[u8]) -> Result<RgbImage, PrepareError> {
    let rgb = decode_rgb(bytes)?;
    resize_to_height(&rgb, DISPLAY_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_scaled_width_rounds_to_nearest() {
        assert_eq!(scaled_width(800, 600, 420), 560);
        // 1000 * 420 / 3000 = 140.0
        assert_eq!(scaled_width(1000, 3000, 420), 140);
        // 333 * 420 / 1000 = 139.86 -> 140 (truncation would give 139)
        assert_eq!(scaled_width(333, 1000, 420), 140);
        // 1001 * 420 / 1000 = 420.42 -> 420
        assert_eq!(scaled_width(1001, 1000, 420), 420);
    }

    #[test]
    fn test_scaled_width_never_zero() {
        assert_eq!(scaled_width(1, 10_000, 420), 1);
    }

    #[test]
    fn test_resize_produces_fixed_height_and_proportional_width() {
        let sizes = [(800, 600), (600, 800), (1, 1), (1234, 567), (420, 420), (3000, 970)];

        for (w, h) in sizes {
            let image = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
            let resized = resize_to_height(&image, DISPLAY_HEIGHT).unwrap();

            let expected_width = ((w as f64) * 420.0 / (h as f64)).round() as u32;
            assert_eq!(resized.height(), 420, "height for {}x{}", w, h);
            assert_eq!(resized.width(), expected_width.max(1), "width for {}x{}", w, h);
        }
    }

    #[test]
    fn test_resize_is_idempotent() {
        let image = RgbImage::from_pixel(800, 600, Rgb([200, 100, 50]));

        let once = resize_to_height(&image, DISPLAY_HEIGHT).unwrap();
        let twice = resize_to_height(&once, DISPLAY_HEIGHT).unwrap();

        assert_eq!(once.dimensions(), twice.dimensions());
        assert_eq!(once.as_raw(), twice.as_raw());
    }

    #[test]
    fn test_resize_rejects_zero_height() {
        let image = RgbImage::new(10, 0);
        let result = resize_to_height(&image, DISPLAY_HEIGHT);
        assert!(matches!(
            result,
            Err(PrepareError::InvalidDimensions { width: 10, height: 0 })
        ));
    }

    #[test]
    fn test_prepare_800x600_jpeg_gives_560x420() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([90, 90, 90])));
        let bytes = encode(image, ImageFormat::Jpeg);

        let prepared = prepare_for_display(&bytes).unwrap();
        assert_eq!(prepared.dimensions(), (560, 420));
    }

    #[test]
    fn test_grayscale_png_is_normalized_to_rgb() {
        let gray = GrayImage::from_pixel(40, 30, Luma([77]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let rgb = decode_rgb(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (40, 30));
        assert_eq!(rgb.get_pixel(5, 5), &Rgb([77, 77, 77]));
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        assert!(matches!(decode_rgb(&[]), Err(PrepareError::EmptyData)));
    }

    #[test]
    fn test_unknown_magic_bytes_are_unsupported() {
        let gif = b"GIF89a\x01\x00\x01\x00";
        assert!(matches!(decode_rgb(gif), Err(PrepareError::UnsupportedFormat)));
    }

    #[test]
    fn test_truncated_jpeg_fails_to_decode() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([1, 2, 3])));
        let bytes = encode(image, ImageFormat::Jpeg);

        let result = decode_rgb(&bytes[..20]);
        assert!(matches!(result, Err(PrepareError::Decode(_))));
    }

    #[test]
    fn test_error_display_formatting() {
        assert_eq!(
            PrepareError::TooLarge(11, 10).to_string(),
            "Image data is too large: 11 bytes (max: 10 bytes)"
        );
        assert_eq!(
            PrepareError::InvalidDimensions { width: 3, height: 0 }.to_string(),
            "Invalid image dimensions 3x0"
        );
    }

    #[test]
    fn test_extreme_aspect_ratio_is_rejected_before_allocating() {
        // 1000x1 would scale to 420000x420
        let image = RgbImage::from_pixel(1000, 1, Rgb([0, 0, 0]));

        let result = resize_to_height(&image, DISPLAY_HEIGHT);

        assert!(matches!(
            result,
            Err(PrepareError::TooWide {
                scaled_width: 420_000,
                max_width: MAX_DISPLAY_WIDTH,
                ..
            })
        ));
    }

    #[test]
    fn test_wide_image_at_display_height_is_still_checked() {
        let image = RgbImage::new(MAX_DISPLAY_WIDTH + 1, DISPLAY_HEIGHT);
        assert!(matches!(
            resize_to_height(&image, DISPLAY_HEIGHT),
            Err(PrepareError::TooWide { .. })
        ));
    }

    #[test]
    fn test_widest_allowed_image_resizes() {
        // 4096 * 420 / 840 = 2048
        let image = RgbImage::new(MAX_DISPLAY_WIDTH, 840);
        let resized = resize_to_height(&image, DISPLAY_HEIGHT).unwrap();
        assert_eq!(resized.dimensions(), (2048, 420));
    }

    #[test]
    fn test_tiny_upload_with_huge_width_hits_decoder_limits() {
        let gray = GrayImage::new(MAX_SOURCE_SIDE + 1, 1);
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        assert!(bytes.len() < 1024, "fixture should be tiny, got {}", bytes.len());

        assert!(matches!(decode_rgb(&bytes), Err(PrepareError::Limits(_))));
    }

    #[test]
    fn test_byte_limit_is_caller_supplied() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([9, 9, 9])));
        let bytes = encode(image, ImageFormat::Png);

        assert!(matches!(
            decode_rgb_with_limit(&bytes, 10),
            Err(PrepareError::TooLarge(_, 10))
        ));
        assert!(decode_rgb_with_limit(&bytes, bytes.len()).is_ok());
    }
}
