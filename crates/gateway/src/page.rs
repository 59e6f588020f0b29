//! Server-rendered HTML for the single detection page.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use preprocess::DISPLAY_HEIGHT;
use std::io::Cursor;

pub const PAGE_TITLE: &str = "Bone Fracture Detection";
pub const NAV_TITLE: &str = "🦴 Bone Fracture Detection System";
pub const NAV_SUBTITLE: &str = "AI-powered X-ray analysis using YOLO";
pub const HERO_TITLE: &str = "Automated Bone Fracture Detection";
pub const HERO_SUBTITLE: &str =
    "Upload an X-ray image to detect fractures with deep learning precision";
pub const UPLOAD_TITLE: &str = "📤 Upload X-ray Image";
pub const RESULTS_TITLE: &str = "🔍 Detection Results";
pub const UPLOAD_HINT: &str = "Supported formats: JPG, PNG";
pub const ORIGINAL_CAPTION: &str = "Original X-ray Image";
pub const OUTPUT_CAPTION: &str = "Fracture Detection Output";
pub const IDLE_MESSAGE: &str = "Upload an X-ray image to view detection results.";
pub const MISSING_OUTPUT_MESSAGE: &str = "Detection output could not be generated.";
pub const BUSY_MESSAGE: &str = "Analyzing X-ray using deep learning model...";
pub const ERROR_MESSAGE: &str = "Something went wrong while analyzing this image. Please try again.";

const STYLE: &str = r#"
@import url('https://fonts.googleapis.com/css2?family=Inter:wght@300;400;600;700;800&display=swap');
* { font-family: 'Inter', sans-serif; box-sizing: border-box; }
body { background-color: #f8fafc; margin: 0; }
.container { max-width: 1200px; margin: 0 auto; padding: 2rem 1rem 3rem; }
.navbar { background: linear-gradient(90deg, #020617, #0f172a); padding: 18px 36px; border-radius: 14px; margin-bottom: 40px; }
.nav-title { font-size: 26px; font-weight: 800; color: #f8fafc; }
.nav-subtitle { font-size: 14px; color: #cbd5e1; }
.hero { text-align: center; margin-bottom: 45px; }
.hero-title { font-size: 42px; font-weight: 800; color: #020617; }
.hero-subtitle { font-size: 18px; color: #475569; margin-top: 10px; }
.columns { display: grid; grid-template-columns: 1fr 1fr; gap: 3rem; }
.card { background: #ffffff; padding: 26px; border-radius: 18px; box-shadow: 0px 10px 30px rgba(2, 6, 23, 0.08); }
.section-title { font-size: 22px; font-weight: 700; margin-bottom: 14px; color: #020617; }
img { display: block; margin-left: auto; margin-right: auto; max-width: 100%; }
figure { margin: 1rem 0 0; }
figcaption { text-align: center; font-size: 14px; color: #64748b; margin-top: 6px; }
.notice { padding: 12px 16px; border-radius: 8px; font-size: 15px; margin-top: 12px; }
.info { background: #e0f2fe; color: #075985; }
.warning { background: #fef9c3; color: #854d0e; }
.error { background: #fee2e2; color: #991b1b; }
.busy { display: none; color: #475569; margin-top: 12px; }
form.submitting .busy { display: block; }
@media (max-width: 800px) { .columns { grid-template-columns: 1fr; } }
"#;

const SUBMIT_SCRIPT: &str = r#"
document.querySelectorAll('form[data-upload]').forEach(function (form) {
  var input = form.querySelector('input[type=file]');
  input.addEventListener('change', function () {
    if (input.files.length > 0) { form.classList.add('submitting'); form.submit(); }
  });
});
"#;

/// What the results card shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPanel {
    /// Nothing uploaded yet
    Placeholder,
    /// Data URI of the annotated image
    Annotated(String),
    /// Detector ran but produced no image
    OutputMissing,
}

/// A message shown under the upload control.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Rejected(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    /// Data URI of the uploaded image at display height
    pub original: Option<String>,
    pub result: ResultPanel,
    pub notice: Option<Notice>,
}

impl PageView {
    pub fn idle() -> Self {
        Self {
            original: None,
            result: ResultPanel::Placeholder,
            notice: None,
        }
    }

    pub fn with_notice(notice: Notice) -> Self {
        Self {
            notice: Some(notice),
            ..Self::idle()
        }
    }
}

/// Encode an image as a base64 JPEG data URI.
pub fn jpeg_data_uri(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Jpeg)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(bytes.into_inner())
    ))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn render(view: &PageView) -> String {
    let mut html = String::with_capacity(8 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", PAGE_TITLE));
    html.push_str("<link rel=\"icon\" href=\"data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>🦴</text></svg>\">\n");
    html.push_str("<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");

    html.push_str(&format!(
        "<div class=\"navbar\">\n<div class=\"nav-title\">{}</div>\n<div class=\"nav-subtitle\">{}</div>\n</div>\n",
        NAV_TITLE, NAV_SUBTITLE
    ));
    html.push_str(&format!(
        "<div class=\"hero\">\n<div class=\"hero-title\">{}</div>\n<div class=\"hero-subtitle\">{}</div>\n</div>\n",
        HERO_TITLE, HERO_SUBTITLE
    ));

    html.push_str("<div class=\"columns\">\n");
    render_upload_card(&mut html, view);
    render_results_card(&mut html, view);
    html.push_str("</div>\n</div>\n");

    html.push_str("<script>");
    html.push_str(SUBMIT_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");

    html
}

fn render_upload_card(html: &mut String, view: &PageView) {
    html.push_str(&format!(
        "<div class=\"card\">\n<div class=\"section-title\">{}</div>\n",
        UPLOAD_TITLE
    ));
    html.push_str(&format!(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\" data-upload>\n\
         <label for=\"file\">{}</label>\n\
         <input id=\"file\" type=\"file\" name=\"file\" accept=\".jpg,.jpeg,.png\" required>\n\
         <noscript><button type=\"submit\">Analyze</button></noscript>\n\
         <div class=\"busy\">{}</div>\n\
         </form>\n",
        UPLOAD_HINT, BUSY_MESSAGE
    ));

    match &view.notice {
        Some(Notice::Rejected(message)) => push_notice(html, "warning", message),
        Some(Notice::Error(message)) => push_notice(html, "error", message),
        None => {}
    }

    if let Some(original) = &view.original {
        push_figure(html, original, ORIGINAL_CAPTION);
    }

    html.push_str("</div>\n");
}

fn render_results_card(html: &mut String, view: &PageView) {
    html.push_str(&format!(
        "<div class=\"card\">\n<div class=\"section-title\">{}</div>\n",
        RESULTS_TITLE
    ));

    match &view.result {
        ResultPanel::Placeholder => push_notice(html, "info", IDLE_MESSAGE),
        ResultPanel::Annotated(uri) => push_figure(html, uri, OUTPUT_CAPTION),
        ResultPanel::OutputMissing => push_notice(html, "warning", MISSING_OUTPUT_MESSAGE),
    }

    html.push_str("</div>\n");
}

fn push_notice(html: &mut String, kind: &str, message: &str) {
    html.push_str(&format!(
        "<div class=\"notice {}\" role=\"status\">{}</div>\n",
        kind,
        escape_html(message)
    ));
}

fn push_figure(html: &mut String, src: &str, caption: &str) {
    html.push_str(&format!(
        "<figure>\n<img src=\"{}\" alt=\"{}\" height=\"{}\">\n<figcaption>{}</figcaption>\n</figure>\n",
        escape_html(src),
        caption,
        DISPLAY_HEIGHT,
        caption
    ));
}
