use crate::error::AppError;
use axum::extract::Multipart;
use preprocess::PrepareError;
use std::path::Path;

/// Form field carrying the image.
pub const FILE_FIELD: &str = "file";
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// True when the file name ends in one of [`ACCEPTED_EXTENSIONS`] (case-insensitive).
pub fn has_accepted_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// Pull the `file` field out of a multipart form.
///
/// The extension is checked as soon as the field header is read, so a
/// rejected upload never has its body buffered.
pub async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::MissingFile);
        }
        if !has_accepted_extension(&file_name) {
            return Err(AppError::UnsupportedFileType(file_name));
        }

        let bytes = field.bytes().await?.to_vec();
        if bytes.len() > max_bytes {
            return Err(PrepareError::TooLarge(bytes.len(), max_bytes).into());
        }
        return Ok(UploadedFile { file_name, bytes });
    }

    Err(AppError::MissingFile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_extensions() {
        for name in ["scan.jpg", "scan.jpeg", "scan.png", "SCAN.JPG", "wrist.Png", "a.b.jpeg"] {
            assert!(has_accepted_extension(name), "{}", name);
        }
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["scan.gif", "scan.bmp", "scan.dcm", "scan", "", ".jpg", "jpg", "scan.jpg.exe"] {
            assert!(!has_accepted_extension(name), "{}", name);
        }
    }
}
