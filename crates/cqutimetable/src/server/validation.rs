//! Checks applied to an uploaded file before it is parsed.

use std::path::Path;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::ServerConfig;

/// Reasons an upload is rejected before parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported file type {extension:?}; allowed: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Unsupported MIME type {mime:?}; allowed: {allowed}")]
    UnsupportedMime { mime: String, allowed: String },

    #[error("Missing form field: {field}")]
    MissingField { field: &'static str },

    #[error("Malformed multipart body: {message}")]
    Multipart { message: String },
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// MIME type implied by a file extension.
pub fn guess_mime(extension: &str) -> Option<&'static str> {
    match extension {
        ".xls" => Some("application/vnd.ms-excel"),
        ".xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        ".ods" => Some("application/vnd.oasis.opendocument.spreadsheet"),
        _ => None,
    }
}

/// Lower-cased extension of `filename` including the dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Validates size, extension and MIME type of an upload.
///
/// The MIME type is guessed from the extension; a declared content type is
/// only used when it is a specific, allowed type.
pub fn validate_upload(
    filename: &str,
    declared_mime: Option<&str>,
    size: usize,
    config: &ServerConfig,
) -> Result<(), UploadError> {
    if size > config.max_file_size {
        return Err(UploadError::TooLarge {
            size,
            limit: config.max_file_size,
        });
    }

    let extension = extension_of(filename);
    if !config.allowed_extensions.iter().any(|e| e == &extension) {
        return Err(UploadError::UnsupportedExtension {
            extension,
            allowed: config.allowed_extensions.join(", "),
        });
    }

    let declared = declared_mime.filter(|m| *m != "application/octet-stream");
    let mime = declared.or_else(|| guess_mime(&extension)).unwrap_or_default();
    if !config.allowed_mime_types.iter().any(|m| m == mime) {
        return Err(UploadError::UnsupportedMime {
            mime: mime.to_string(),
            allowed: config.allowed_mime_types.join(", "),
        });
    }

    Ok(())
}
