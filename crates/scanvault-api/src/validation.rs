//! Validation utilities for the upload handler

use scanvault_core::AppError;
use std::path::Path;

/// Reject names that would escape the `uploads/{object_id}/` prefix.
pub fn validate_filename(filename: Option<&str>) -> Result<String, AppError> {
    let name = filename.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Filename is required".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(AppError::InvalidInput(format!(
            "Invalid filename '{}'",
            name
        )));
    }
    Ok(name.to_string())
}

/// `allowed` holds lowercase extensions without the leading dot.
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() {
        return Err(AppError::UnsupportedFileType(format!(
            "'{}' has no extension, allowed: {}",
            filename,
            allowed.join(", ")
        )));
    }

    if !allowed.iter().any(|a| *a == extension) {
        return Err(AppError::UnsupportedFileType(format!(
            ".{} (allowed: {})",
            extension,
            allowed.join(", ")
        )));
    }

    Ok(extension)
}
