use crate::interaction::InteractionState;
use crate::page::{self, ERROR_MESSAGE, Notice, PageView};
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use inference::InvokeError;
use preprocess::PrepareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("No file was uploaded")]
    MissingFile,

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to encode image for display: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Upload ended in unexpected state: {}", .0.as_str())]
    UnexpectedState(InteractionState),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MissingFile | AppError::Prepare(PrepareError::EmptyData) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Multipart(e) => e.status(),
            AppError::Prepare(PrepareError::TooLarge(_, _)) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Prepare(
                PrepareError::TooWide { .. }
                | PrepareError::Limits(_)
                | PrepareError::InvalidDimensions { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Prepare(_)
            | AppError::Invoke(_)
            | AppError::Task(_)
            | AppError::Encode(_)
            | AppError::UnexpectedState(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the user sees. Server-side failures never leak details.
    fn notice(&self) -> Notice {
        match self {
            AppError::UnsupportedFileType(name) => Notice::Rejected(format!(
                "{} is not a supported file. {}.",
                name,
                page::UPLOAD_HINT
            )),
            AppError::MissingFile | AppError::Prepare(PrepareError::EmptyData) => {
                Notice::Rejected(format!("Choose an X-ray image to upload. {}.", page::UPLOAD_HINT))
            }
            AppError::Prepare(PrepareError::TooLarge(_, max)) => Notice::Rejected(format!(
                "File is too large (max {} MB).",
                max / (1024 * 1024)
            )),
            AppError::Prepare(PrepareError::TooWide { max_width, .. }) => Notice::Rejected(format!(
                "Image is too wide for its height (max {} px wide at {} px high).",
                max_width,
                preprocess::DISPLAY_HEIGHT
            )),
            AppError::Prepare(PrepareError::Limits(_) | PrepareError::InvalidDimensions { .. }) => {
                Notice::Rejected(format!(
                    "Image dimensions are not supported (max {} px per side).",
                    preprocess::MAX_SOURCE_SIDE
                ))
            }
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Notice::Rejected("File is too large.".to_string())
            }
            AppError::Multipart(_) => Notice::Rejected("The upload could not be read.".to_string()),
            _ => Notice::Error(ERROR_MESSAGE.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Upload rejected");
        }

        let body = page::render(&PageView::with_notice(self.notice()));
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            AppError::UnsupportedFileType("a.gif".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(AppError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Prepare(PrepareError::EmptyData).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Prepare(PrepareError::TooLarge(20, 10)).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn unrenderable_dimensions_are_unprocessable() {
        let too_wide = AppError::Prepare(PrepareError::TooWide {
            width: 65535,
            height: 1,
            target_height: 420,
            scaled_width: 27_524_700,
            max_width: 4096,
        });
        assert_eq!(too_wide.status(), StatusCode::UNPROCESSABLE_ENTITY);
        match too_wide.notice() {
            Notice::Rejected(message) => assert!(message.contains("4096")),
            other => panic!("Expected rejection notice, got {:?}", other),
        }

        let zero = AppError::Prepare(PrepareError::InvalidDimensions {
            width: 0,
            height: 10,
        });
        assert_eq!(zero.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unexpected_final_state_is_a_server_error() {
        let err = AppError::UnexpectedState(InteractionState::Inferring);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("inferring"));
    }

    #[test]
    fn decode_and_detector_failures_are_fatal() {
        assert_eq!(
            AppError::Prepare(PrepareError::UnsupportedFormat).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Invoke(InvokeError::Detector(anyhow::anyhow!("boom"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let err = AppError::Invoke(InvokeError::Detector(anyhow::anyhow!("/secret/path.onnx")));
        match err.notice() {
            Notice::Error(message) => assert!(!message.contains("secret")),
            other => panic!("Expected error notice, got {:?}", other),
        }
    }

    #[test]
    fn rejection_names_the_file() {
        match AppError::UnsupportedFileType("scan.gif".into()).notice() {
            Notice::Rejected(message) => {
                assert!(message.contains("scan.gif"));
                assert!(message.contains("JPG, PNG"));
            }
            other => panic!("Expected rejection notice, got {:?}", other),
        }
    }
}
