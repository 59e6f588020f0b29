pub mod display;
pub mod letterbox;

pub use display::{
    DISPLAY_HEIGHT, MAX_DECODE_ALLOC, MAX_DISPLAY_WIDTH, MAX_SOURCE_SIDE, MAX_UPLOAD_BYTES,
    PrepareError, decode_rgb, decode_rgb_with_limit, prepare_for_display, resize_to_height,
    scaled_width,
};
pub use letterbox::{DEFAULT_INPUT_SIZE, LetterboxPreProcessor, PreprocessResult};
