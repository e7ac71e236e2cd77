//! Local checks on a file before it is uploaded.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::UploadConfig;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid file type: .{extension}. Allowed types: {allowed}")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("File size exceeds maximum allowed size of {max_mb}MB")]
    TooLarge { max_mb: u64 },

    #[error("Failed to read file metadata: {0}")]
    Io(#[from] std::io::Error),
}

/// What the service needs to know about an accepted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub mime_type: &'static str,
}

pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "flac" => Some("audio/flac"),
        "ogg" => Some("audio/ogg"),
        "opus" => Some("audio/opus"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

/// Validate existence, extension, and size against the upload policy.
pub fn validate_upload(path: &Path, config: &UploadConfig) -> Result<UploadInfo, UploadError> {
    if !path.is_file() {
        return Err(UploadError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let allowed = config
        .allowed_extensions
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension));
    let mime_type = mime_type_for_extension(&extension).filter(|_| allowed);

    let Some(mime_type) = mime_type else {
        return Err(UploadError::UnsupportedFormat {
            extension,
            allowed: config
                .allowed_extensions
                .iter()
                .map(|e| format!(".{}", e.trim_start_matches('.')))
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let size_bytes = std::fs::metadata(path)?.len();
    if size_bytes > config.max_file_size_mb.saturating_mul(1024 * 1024) {
        return Err(UploadError::TooLarge {
            max_mb: config.max_file_size_mb,
        });
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio")
        .to_string();

    Ok(UploadInfo {
        path: path.to_path_buf(),
        file_name,
        size_bytes,
        mime_type,
    })
}
